//! Entitlement client error types.

use mops_core::ModuleKey;
use mops_entitlements::{ConflictBody, ToggleRejection};

/// Errors from entitlement service calls and session operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The service returned a non-2xx status other than a gate conflict.
    #[error("entitlement API {endpoint} returned {status}: {body}")]
    ApiError {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The service-side gate refused the toggle (`409`).
    #[error("{}", .body.error)]
    Conflict { endpoint: String, body: ConflictBody },
    /// The local gate refused the toggle; no request was sent.
    #[error(transparent)]
    Rejected(#[from] ToggleRejection),
    /// The module is not part of the loaded snapshot.
    #[error("module {0} is not in the tenant's entitlement list")]
    UnknownModule(ModuleKey),
    /// A key or value failed boundary validation before any request.
    #[error(transparent)]
    Validation(#[from] mops_core::ValidationError),
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}

impl ClientError {
    /// Whether this is a gate rejection, local or remote.
    pub fn is_gate_rejection(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Rejected(_))
    }

    /// Blocking module keys (enable) or names (disable) of a gate
    /// rejection, exactly as the gate reported them.
    pub fn blockers(&self) -> Option<Vec<String>> {
        match self {
            Self::Conflict { body, .. } => Some(body.blockers()),
            Self::Rejected(rejection) => Some(rejection.blockers()),
            _ => None,
        }
    }
}
