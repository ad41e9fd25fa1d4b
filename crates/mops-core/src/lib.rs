#![deny(missing_docs)]

//! # mops-core: Foundational Types for the mops Entitlement Service
//!
//! Every other crate in the workspace depends on this one. It has no internal
//! crate dependencies: only `serde`, `thiserror`, `chrono` and `uuid` from
//! the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** A [`TenantId`] cannot be passed
//!    where a [`ModuleKey`] is expected, and a `ModuleKey` is validated once,
//!    at the boundary.
//!
//! 2. **Closed vocabularies are enums.** Billing model, status and change
//!    source are parsed into [`BillingModel`], [`EntitlementStatus`] and
//!    [`ChangeSource`] on ingress rather than carried as strings.
//!
//! 3. **[`ValidationError`]** is the single error type for boundary
//!    validation. No `.unwrap()` outside tests.

pub mod entitlement;
pub mod error;
pub mod identity;

pub use entitlement::{
    BillingModel, ChangeSource, EntitlementState, EntitlementStatus, ModuleDefinition,
    ModuleEntitlement, Notes, MAX_NOTES_LEN,
};
pub use error::ValidationError;
pub use identity::{ModuleKey, TenantId, MAX_MODULE_KEY_LEN};
