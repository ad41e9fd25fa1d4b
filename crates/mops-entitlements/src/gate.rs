//! # Toggle Gate
//!
//! Pure approve/reject decision for switching one module on or off, made
//! against a [`DependencyGraph`]. The gate never mutates anything; callers
//! issue the mutation only after an approval and rebuild the graph from a
//! fresh snapshot afterwards.
//!
//! The same gate runs twice per toggle: optimistically in the client before
//! any request is sent, and authoritatively in the service under its write
//! lock. A service-side rejection travels back as a `409` carrying a
//! [`ConflictBody`].

use mops_core::{ModuleEntitlement, ModuleKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::DependencyGraph;

/// Requested direction of a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ToggleAction {
    /// Switch the module on.
    Enable,
    /// Switch the module off.
    Disable,
}

impl ToggleAction {
    /// The action that moves a module into the given enabled state.
    pub fn for_target(enabled: bool) -> Self {
        if enabled {
            Self::Enable
        } else {
            Self::Disable
        }
    }

    /// Return the string representation of this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enable => "enable",
            Self::Disable => "disable",
        }
    }
}

impl std::fmt::Display for ToggleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a toggle was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToggleRejection {
    /// Some of the module's dependencies are not enabled.
    #[error("cannot enable {module}: requires {} to be enabled first", .missing.iter().map(ModuleKey::as_str).collect::<Vec<_>>().join(", "))]
    MissingDependencies {
        /// The module that was to be enabled.
        module: ModuleKey,
        /// Dependency keys that are not enabled, in declaration order.
        missing: Vec<ModuleKey>,
    },

    /// Enabled modules still depend on the module.
    #[error("cannot disable {module}: required by {}", .dependents.join(", "))]
    DependentModules {
        /// The module that was to be disabled.
        module: ModuleKey,
        /// Display names of the enabled dependents, in snapshot order.
        dependents: Vec<String>,
    },
}

impl ToggleRejection {
    /// The module whose toggle was refused.
    pub fn module(&self) -> &ModuleKey {
        match self {
            Self::MissingDependencies { module, .. } | Self::DependentModules { module, .. } => {
                module
            }
        }
    }

    /// The blocking keys (for an enable) or names (for a disable), as shown
    /// to an operator.
    pub fn blockers(&self) -> Vec<String> {
        match self {
            Self::MissingDependencies { missing, .. } => {
                missing.iter().map(|k| k.to_string()).collect()
            }
            Self::DependentModules { dependents, .. } => dependents.clone(),
        }
    }
}

/// Toggle decisions over one dependency graph.
#[derive(Debug, Clone, Copy)]
pub struct ToggleGate<'g, 'a> {
    graph: &'g DependencyGraph<'a>,
}

impl<'g, 'a> ToggleGate<'g, 'a> {
    /// Create a gate over the given graph.
    pub fn new(graph: &'g DependencyGraph<'a>) -> Self {
        Self { graph }
    }

    /// Approve enabling `module` iff every key in its `dependency_keys` is
    /// enabled. Otherwise reject with the missing keys.
    pub fn can_enable(&self, module: &ModuleEntitlement) -> Result<(), ToggleRejection> {
        let missing = self.graph.missing_dependencies(module);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ToggleRejection::MissingDependencies {
                module: module.module_key.clone(),
                missing,
            })
        }
    }

    /// Approve disabling `module` iff no other enabled module lists it as a
    /// dependency. Otherwise reject with the dependents' names.
    ///
    /// `is_core` is not consulted.
    pub fn can_disable(&self, module: &ModuleEntitlement) -> Result<(), ToggleRejection> {
        let dependents = self.graph.dependents_of(module.module_key.as_str());
        if dependents.is_empty() {
            Ok(())
        } else {
            Err(ToggleRejection::DependentModules {
                module: module.module_key.clone(),
                dependents: dependents.iter().map(|m| m.module_name.clone()).collect(),
            })
        }
    }

    /// Dispatch to [`Self::can_enable`] or [`Self::can_disable`].
    pub fn check(
        &self,
        module: &ModuleEntitlement,
        action: ToggleAction,
    ) -> Result<(), ToggleRejection> {
        match action {
            ToggleAction::Enable => self.can_enable(module),
            ToggleAction::Disable => self.can_disable(module),
        }
    }

    /// Evaluate a toggle into a serializable preview.
    pub fn decide(&self, module: &ModuleEntitlement, action: ToggleAction) -> GateDecision {
        GateDecision::new(module.module_key.clone(), action, self.check(module, action))
    }
}

/// Serializable outcome of a gate evaluation, returned by the preview route
/// and printed by the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GateDecision {
    /// The module evaluated.
    pub module_key: ModuleKey,
    /// The requested action.
    pub action: ToggleAction,
    /// Whether the gate approves.
    pub allowed: bool,
    /// Dependency keys that are not enabled (enable only).
    #[serde(default)]
    pub missing_dependencies: Vec<String>,
    /// Names of enabled dependents (disable only).
    #[serde(default)]
    pub dependent_modules: Vec<String>,
}

impl GateDecision {
    fn new(
        module_key: ModuleKey,
        action: ToggleAction,
        outcome: Result<(), ToggleRejection>,
    ) -> Self {
        let mut decision = Self {
            module_key,
            action,
            allowed: outcome.is_ok(),
            missing_dependencies: Vec::new(),
            dependent_modules: Vec::new(),
        };
        match outcome {
            Ok(()) => {}
            Err(ToggleRejection::MissingDependencies { missing, .. }) => {
                decision.missing_dependencies = missing.into_iter().map(String::from).collect();
            }
            Err(ToggleRejection::DependentModules { dependents, .. }) => {
                decision.dependent_modules = dependents;
            }
        }
        decision
    }
}

/// Body of a `409 Conflict` returned when the service-side gate refuses a
/// toggle.
///
/// Exactly one of `missing_dependencies` and `dependent_modules` is present.
/// Lists are plain strings so a client can surface them verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ConflictBody {
    /// Human-readable rejection message.
    pub error: String,
    /// Dependency keys that must be enabled first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_dependencies: Option<Vec<String>>,
    /// Names of enabled modules that depend on the target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependent_modules: Option<Vec<String>>,
}

impl ConflictBody {
    /// The blocking keys or names carried by this body.
    pub fn blockers(&self) -> Vec<String> {
        self.missing_dependencies
            .clone()
            .or_else(|| self.dependent_modules.clone())
            .unwrap_or_default()
    }
}

impl From<&ToggleRejection> for ConflictBody {
    fn from(rejection: &ToggleRejection) -> Self {
        let error = rejection.to_string();
        match rejection {
            ToggleRejection::MissingDependencies { missing, .. } => Self {
                error,
                missing_dependencies: Some(missing.iter().map(|k| k.to_string()).collect()),
                dependent_modules: None,
            },
            ToggleRejection::DependentModules { dependents, .. } => Self {
                error,
                missing_dependencies: None,
                dependent_modules: Some(dependents.clone()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mops_core::{BillingModel, EntitlementStatus, Notes};

    fn module(key: &str, name: &str, enabled: bool, deps: &[&str]) -> ModuleEntitlement {
        ModuleEntitlement {
            module_key: ModuleKey::new(key).unwrap(),
            module_name: name.to_string(),
            dependency_keys: deps.iter().map(|d| ModuleKey::new(*d).unwrap()).collect(),
            is_core: key == "core",
            enabled,
            billing_model: BillingModel::Included,
            status: EntitlementStatus::Active,
            notes: Notes::default(),
            source: None,
            updated_at: None,
        }
    }

    #[test]
    fn scenario_a_enable_with_enabled_dependency() {
        let snapshot = vec![
            module("core", "Core", true, &[]),
            module("addon", "Add-on", false, &["core"]),
        ];
        let graph = DependencyGraph::build(&snapshot);
        assert!(ToggleGate::new(&graph).can_enable(&snapshot[1]).is_ok());
    }

    #[test]
    fn scenario_b_enable_with_disabled_dependency() {
        let snapshot = vec![
            module("core", "Core", false, &[]),
            module("addon", "Add-on", false, &["core"]),
        ];
        let graph = DependencyGraph::build(&snapshot);
        let err = ToggleGate::new(&graph).can_enable(&snapshot[1]).unwrap_err();
        assert_eq!(
            err,
            ToggleRejection::MissingDependencies {
                module: ModuleKey::new("addon").unwrap(),
                missing: vec![ModuleKey::new("core").unwrap()],
            }
        );
    }

    #[test]
    fn scenario_c_disable_with_enabled_dependent() {
        let snapshot = vec![
            module("core", "Core", true, &[]),
            module("addon", "Add-on", true, &["core"]),
        ];
        let graph = DependencyGraph::build(&snapshot);
        let err = ToggleGate::new(&graph).can_disable(&snapshot[0]).unwrap_err();
        assert_eq!(err.blockers(), vec!["Add-on".to_string()]);
        assert_eq!(err.module(), &ModuleKey::new("core").unwrap());
    }

    #[test]
    fn scenario_d_disable_with_disabled_dependent() {
        let snapshot = vec![
            module("core", "Core", true, &[]),
            module("addon", "Add-on", false, &["core"]),
        ];
        let graph = DependencyGraph::build(&snapshot);
        assert!(ToggleGate::new(&graph).can_disable(&snapshot[0]).is_ok());
    }

    #[test]
    fn core_flag_is_not_enforced() {
        let snapshot = vec![module("core", "Core", true, &[])];
        let graph = DependencyGraph::build(&snapshot);
        assert!(snapshot[0].is_core);
        assert!(ToggleGate::new(&graph).can_disable(&snapshot[0]).is_ok());
    }

    #[test]
    fn module_without_dependencies_can_always_be_enabled() {
        let snapshot = vec![module("solo", "Solo", false, &[])];
        let graph = DependencyGraph::build(&snapshot);
        assert!(ToggleGate::new(&graph).can_enable(&snapshot[0]).is_ok());
    }

    #[test]
    fn cycle_members_cannot_be_disabled() {
        let snapshot = vec![
            module("a", "A", true, &["b"]),
            module("b", "B", true, &["a"]),
        ];
        let graph = DependencyGraph::build(&snapshot);
        let gate = ToggleGate::new(&graph);
        assert!(gate.can_disable(&snapshot[0]).is_err());
        assert!(gate.can_disable(&snapshot[1]).is_err());
    }

    #[test]
    fn rejection_messages_name_blockers() {
        let snapshot = vec![
            module("core", "Core", false, &[]),
            module("extra", "Extra", false, &[]),
            module("addon", "Add-on", false, &["core", "extra"]),
        ];
        let graph = DependencyGraph::build(&snapshot);
        let err = ToggleGate::new(&graph).can_enable(&snapshot[2]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot enable addon: requires core, extra to be enabled first"
        );
    }

    #[test]
    fn check_dispatches_on_action() {
        let snapshot = vec![
            module("core", "Core", true, &[]),
            module("addon", "Add-on", true, &["core"]),
        ];
        let graph = DependencyGraph::build(&snapshot);
        let gate = ToggleGate::new(&graph);
        assert!(gate.check(&snapshot[0], ToggleAction::Enable).is_ok());
        assert!(gate.check(&snapshot[0], ToggleAction::Disable).is_err());
        assert_eq!(ToggleAction::for_target(false), ToggleAction::Disable);
    }

    #[test]
    fn decision_serializes_blockers() {
        let snapshot = vec![
            module("core", "Core", true, &[]),
            module("addon", "Add-on", true, &["core"]),
        ];
        let graph = DependencyGraph::build(&snapshot);
        let decision = ToggleGate::new(&graph).decide(&snapshot[0], ToggleAction::Disable);
        assert!(!decision.allowed);
        assert_eq!(decision.dependent_modules, vec!["Add-on"]);
        assert!(decision.missing_dependencies.is_empty());

        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["action"], "disable");
        assert_eq!(json["module_key"], "core");
    }

    #[test]
    fn conflict_body_carries_only_relevant_list() {
        let rejection = ToggleRejection::MissingDependencies {
            module: ModuleKey::new("addon").unwrap(),
            missing: vec![ModuleKey::new("core").unwrap()],
        };
        let body = ConflictBody::from(&rejection);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["missing_dependencies"], serde_json::json!(["core"]));
        assert!(json.get("dependent_modules").is_none());
        assert_eq!(body.blockers(), vec!["core".to_string()]);

        let rejection = ToggleRejection::DependentModules {
            module: ModuleKey::new("core").unwrap(),
            dependents: vec!["Add-on".into()],
        };
        let body = ConflictBody::from(&rejection);
        assert_eq!(body.dependent_modules, Some(vec!["Add-on".to_string()]));
        assert!(body.missing_dependencies.is_none());
    }
}
