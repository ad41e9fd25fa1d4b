//! # mops-cli: Operator CLI for Module Entitlements
//!
//! Provides the `mops` command-line interface.
//!
//! ## Subcommands
//!
//! - `mops modules list|enable|disable|check`: a tenant's entitlements,
//!   through the entitlement service.
//! - `mops catalog check FILE`: offline validation of a catalog YAML.
//!
//! ## Exit codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | success |
//! | 1 | any other error |
//! | 2 | toggle refused by the dependency gate (local or service-side) |

pub mod catalog;
pub mod modules;

/// Exit code for success.
pub const EXIT_OK: u8 = 0;

/// Exit code when the dependency gate refuses a toggle.
pub const EXIT_GATE_REJECTED: u8 = 2;
