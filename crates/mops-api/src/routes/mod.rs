//! # API Route Modules
//!
//! - `modules`: the tenant-independent module catalog.
//! - `entitlements`: per-tenant entitlement list, toggles and metadata
//!   updates, gate previews, and the change history.

pub mod entitlements;
pub mod modules;
