//! # Custom Extractors & Validation
//!
//! Provides the [`Validate`] trait for request DTOs, helpers that map JSON
//! body rejections into [`AppError`], and parsing of the tenant and module
//! path segments into their validated types.

use axum::extract::rejection::JsonRejection;
use axum::Json;
use mops_core::{ModuleKey, TenantId};

use crate::error::AppError;

/// Trait for request types that can validate their business rules
/// beyond what serde deserialization checks.
pub trait Validate {
    /// Validate business rules. Returns an error message on failure.
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body.
///
/// A body that is valid JSON but does not fit the request type (unknown
/// enum value, bad module key, wrong field type) is a validation error
/// (422). Anything else, such as a syntax error or a missing content type,
/// is a bad request (400).
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result.map(|Json(v)| v).map_err(|err| match err {
        JsonRejection::JsonDataError(_) => AppError::Validation(err.body_text()),
        other => AppError::BadRequest(other.body_text()),
    })
}

/// Extract a JSON body and validate it using the [`Validate`] trait.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

/// Parse the `{tenant_id}` path segment.
pub fn parse_tenant_id(raw: &str) -> Result<TenantId, AppError> {
    raw.parse::<TenantId>().map_err(AppError::from)
}

/// Parse the `{module_key}` path segment.
pub fn parse_module_key(raw: &str) -> Result<ModuleKey, AppError> {
    ModuleKey::new(raw).map_err(AppError::from)
}
