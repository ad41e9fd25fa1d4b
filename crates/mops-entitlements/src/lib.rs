//! # mops-entitlements: Module Entitlement Dependency Resolution
//!
//! Decides whether a tenant's feature module may be switched on or off,
//! given the dependency declarations between modules.
//!
//! ## Components
//!
//! - [`DependencyGraph`]: built from one tenant's full entitlement snapshot.
//!   Holds the set of enabled keys and the direct reverse-dependency map.
//! - [`ToggleGate`]: pure decision over a graph: `can_enable` rejects with
//!   the missing dependency keys, `can_disable` rejects with the names of the
//!   enabled modules that still depend on the target.
//! - [`ModuleCatalog`]: tenant-independent module definitions, loaded from
//!   YAML or the built-in manufacturing catalog, joined with stored tenant
//!   state to produce a snapshot.
//!
//! ## Semantics
//!
//! Only direct dependencies and dependents are considered. If C depends on B
//! and B depends on A, disabling A is blocked by B alone; C is never
//! consulted. Cycles are not prevented: every member of a cycle blocks the
//! others from being disabled. [`DependencyGraph::cycles`] reports them
//! without changing any decision.
//!
//! The graph is always rebuilt from the latest snapshot and never patched
//! incrementally.

pub mod catalog;
pub mod gate;
pub mod graph;

pub use catalog::{CatalogError, ModuleCatalog};
pub use gate::{ConflictBody, GateDecision, ToggleAction, ToggleGate, ToggleRejection};
pub use graph::DependencyGraph;
