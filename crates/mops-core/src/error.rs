//! # Validation Errors
//!
//! Structured errors for boundary validation, built with `thiserror`.
//! Each variant carries the offending input so operators can diagnose
//! bad payloads and catalog files without guesswork.

use thiserror::Error;

/// Validation errors for identifiers and entitlement fields.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Module key does not match `[a-z][a-z0-9_-]{0,63}`.
    #[error("invalid module key: \"{0}\" (expected 1-64 chars of a-z, 0-9, '_' or '-', starting with a letter)")]
    InvalidModuleKey(String),

    /// Tenant identifier is not a UUID.
    #[error("invalid tenant id: \"{0}\" (expected a UUID)")]
    InvalidTenantId(String),

    /// Notes exceed the maximum length.
    #[error("notes exceed {max} characters (got {actual})")]
    NotesTooLong {
        /// Maximum accepted length in characters.
        max: usize,
        /// Length that was submitted.
        actual: usize,
    },

    /// A string did not name a known billing model.
    #[error("unknown billing model: \"{0}\"")]
    UnknownBillingModel(String),

    /// A string did not name a known entitlement status.
    #[error("unknown entitlement status: \"{0}\"")]
    UnknownStatus(String),

    /// A string did not name a known change source.
    #[error("unknown change source: \"{0}\"")]
    UnknownSource(String),
}
