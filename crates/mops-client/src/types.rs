//! Request and response bodies of the entitlement service that are not
//! shared domain types.

use chrono::{DateTime, Utc};
use mops_core::{
    BillingModel, ChangeSource, EntitlementStatus, ModuleDefinition, ModuleKey, Notes, TenantId,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `PUT /v1/tenants/{tenant_id}/modules/{module_key}`.
///
/// `None` metadata fields are omitted and keep their stored values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEntitlement {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_model: Option<BillingModel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EntitlementStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Notes>,
    pub source: ChangeSource,
}

impl UpdateEntitlement {
    /// A plain toggle to `enabled`, leaving metadata untouched.
    pub fn toggle(enabled: bool, source: ChangeSource) -> Self {
        Self {
            enabled,
            billing_model: None,
            status: None,
            notes: None,
            source,
        }
    }
}

/// Response of `GET /v1/modules`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub modules: Vec<ModuleDefinition>,
    #[serde(default)]
    pub cycles: Vec<Vec<ModuleKey>>,
}

/// One entry of a tenant's change history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Position in the service's audit chain.
    pub sequence: u64,
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub module_key: ModuleKey,
    /// `enable`, `disable` or `update`.
    pub action: String,
    pub enabled: bool,
    pub billing_model: BillingModel,
    pub status: EntitlementStatus,
    pub source: ChangeSource,
    pub previous_hash: String,
    pub event_hash: String,
    pub recorded_at: DateTime<Utc>,
}

/// Response of `GET /v1/tenants/{tenant_id}/audit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTrail {
    pub tenant_id: TenantId,
    pub count: usize,
    pub events: Vec<AuditRecord>,
}
