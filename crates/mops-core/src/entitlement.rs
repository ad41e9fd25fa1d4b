//! # Entitlement Records
//!
//! A [`ModuleDefinition`] describes a feature module independently of any
//! tenant. A [`ModuleEntitlement`] is one tenant×module row: the definition
//! joined with that tenant's activation state and billing metadata.
//!
//! Billing model, status and change source are closed vocabularies. They
//! are parsed into enums at the boundary so business logic never handles
//! arbitrary strings.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::identity::ModuleKey;

/// Maximum length of entitlement notes, in characters.
pub const MAX_NOTES_LEN: usize = 2000;

/// How a tenant is billed for a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum BillingModel {
    /// Bundled with the base subscription.
    Included,
    /// Fixed recurring fee.
    Flat,
    /// Charged per active user seat.
    PerSeat,
    /// Metered usage.
    Usage,
    /// Free evaluation period.
    Trial,
}

impl BillingModel {
    /// Return the wire representation of this billing model.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Included => "included",
            Self::Flat => "flat",
            Self::PerSeat => "per_seat",
            Self::Usage => "usage",
            Self::Trial => "trial",
        }
    }
}

impl std::fmt::Display for BillingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingModel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "included" => Ok(Self::Included),
            "flat" => Ok(Self::Flat),
            "per_seat" => Ok(Self::PerSeat),
            "usage" => Ok(Self::Usage),
            "trial" => Ok(Self::Trial),
            other => Err(ValidationError::UnknownBillingModel(other.to_string())),
        }
    }
}

/// Commercial status of a tenant's module entitlement.
///
/// Independent of the `enabled` flag: a suspended entitlement may still be
/// enabled while billing is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum EntitlementStatus {
    /// Licensed and in good standing.
    Active,
    /// In an evaluation period.
    Trial,
    /// Not licensed.
    Inactive,
    /// Licensed but on hold.
    Suspended,
}

impl EntitlementStatus {
    /// Return the wire representation of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trial => "trial",
            Self::Inactive => "inactive",
            Self::Suspended => "suspended",
        }
    }
}

impl std::fmt::Display for EntitlementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntitlementStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "trial" => Ok(Self::Trial),
            "inactive" => Ok(Self::Inactive),
            "suspended" => Ok(Self::Suspended),
            other => Err(ValidationError::UnknownStatus(other.to_string())),
        }
    }
}

/// Where an entitlement change originated. Recorded on the row and in the
/// audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
    /// The admin "Module Entitlements" page.
    AdminUi,
    /// A direct API caller.
    Api,
    /// The `mops` command-line tool.
    Cli,
    /// Automated tenant provisioning.
    Provisioning,
}

impl ChangeSource {
    /// Return the wire representation of this source.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AdminUi => "admin_ui",
            Self::Api => "api",
            Self::Cli => "cli",
            Self::Provisioning => "provisioning",
        }
    }
}

impl std::fmt::Display for ChangeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeSource {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin_ui" => Ok(Self::AdminUi),
            "api" => Ok(Self::Api),
            "cli" => Ok(Self::Cli),
            "provisioning" => Ok(Self::Provisioning),
            other => Err(ValidationError::UnknownSource(other.to_string())),
        }
    }
}

/// Free-text notes on an entitlement, bounded to [`MAX_NOTES_LEN`] characters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema), schema(value_type = String))]
#[serde(try_from = "String", into = "String")]
pub struct Notes(String);

impl Notes {
    /// Create validated notes.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NotesTooLong`] past [`MAX_NOTES_LEN`] characters.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        let actual = s.chars().count();
        if actual > MAX_NOTES_LEN {
            return Err(ValidationError::NotesTooLong {
                max: MAX_NOTES_LEN,
                actual,
            });
        }
        Ok(Self(s))
    }

    /// Access the notes as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the notes are empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<String> for Notes {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Notes> for String {
    fn from(notes: Notes) -> Self {
        notes.0
    }
}

/// Tenant-independent description of a feature module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ModuleDefinition {
    /// Stable module identifier.
    pub module_key: ModuleKey,
    /// Display label.
    pub module_name: String,
    /// Longer description shown in the admin console.
    #[serde(default)]
    pub description: String,
    /// Modules that must be enabled before this one, in declaration order.
    #[serde(default)]
    pub dependency_keys: Vec<ModuleKey>,
    /// Whether the module is part of the base product. Informational only.
    #[serde(default)]
    pub is_core: bool,
}

/// One tenant×module entitlement row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ModuleEntitlement {
    /// Stable module identifier, unique within the tenant's set.
    pub module_key: ModuleKey,
    /// Display label.
    pub module_name: String,
    /// Modules that must be enabled before this one, in declaration order.
    #[serde(default)]
    pub dependency_keys: Vec<ModuleKey>,
    /// Informational only; never enforced by the gate.
    #[serde(default)]
    pub is_core: bool,
    /// Current activation state for the tenant.
    pub enabled: bool,
    /// How the tenant is billed for the module.
    pub billing_model: BillingModel,
    /// Commercial status.
    pub status: EntitlementStatus,
    /// Operator notes.
    #[serde(default)]
    pub notes: Notes,
    /// Origin of the last change, if the row has ever been written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ChangeSource>,
    /// Time of the last change, if the row has ever been written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Tenant-specific state of one module entitlement: everything in a
/// [`ModuleEntitlement`] that is not part of the module's definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EntitlementState {
    /// Current activation state.
    pub enabled: bool,
    /// How the tenant is billed for the module.
    pub billing_model: BillingModel,
    /// Commercial status.
    pub status: EntitlementStatus,
    /// Operator notes.
    #[serde(default)]
    pub notes: Notes,
    /// Origin of the last change.
    pub source: ChangeSource,
    /// Time of the last change.
    pub updated_at: DateTime<Utc>,
}

impl ModuleEntitlement {
    /// Join a module definition with a tenant's stored state.
    pub fn from_parts(definition: &ModuleDefinition, state: &EntitlementState) -> Self {
        Self {
            module_key: definition.module_key.clone(),
            module_name: definition.module_name.clone(),
            dependency_keys: definition.dependency_keys.clone(),
            is_core: definition.is_core,
            enabled: state.enabled,
            billing_model: state.billing_model,
            status: state.status,
            notes: state.notes.clone(),
            source: Some(state.source),
            updated_at: Some(state.updated_at),
        }
    }

    /// Materialise the default entitlement for a tenant that has no stored
    /// row for this module: core modules start enabled and active, all
    /// others disabled and inactive, both billed as included.
    pub fn default_for(definition: &ModuleDefinition) -> Self {
        Self {
            module_key: definition.module_key.clone(),
            module_name: definition.module_name.clone(),
            dependency_keys: definition.dependency_keys.clone(),
            is_core: definition.is_core,
            enabled: definition.is_core,
            billing_model: BillingModel::Included,
            status: if definition.is_core {
                EntitlementStatus::Active
            } else {
                EntitlementStatus::Inactive
            },
            notes: Notes::default(),
            source: None,
            updated_at: None,
        }
    }
}
