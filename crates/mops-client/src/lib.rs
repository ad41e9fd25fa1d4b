//! # mops-client: Typed client for the module entitlement service
//!
//! [`EntitlementClient`] wraps every `mops-api` route. [`EntitlementSession`]
//! owns one tenant's entitlement snapshot and implements the toggle
//! lifecycle: local gate check, write, patch of the toggled row, full
//! re-fetch.
//!
//! The client does not retry. A failed request is returned as-is; the only
//! timeout is the configured per-request one.

pub mod config;
pub mod error;
pub mod session;
pub mod types;

pub use config::ClientConfig;
pub use error::ClientError;
pub use session::EntitlementSession;
pub use types::{AuditRecord, AuditTrail, Catalog, UpdateEntitlement};

use std::time::Duration;

use mops_core::{ModuleEntitlement, ModuleKey, TenantId};
use mops_entitlements::{ConflictBody, GateDecision};
use serde::de::DeserializeOwned;

/// HTTP client for the entitlement service.
#[derive(Debug, Clone)]
pub struct EntitlementClient {
    http: reqwest::Client,
    base_url: url::Url,
}

impl EntitlementClient {
    /// Create a new client from configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(token) = &config.api_token {
            let mut value =
                reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
                    .map_err(|_| ClientError::Config(config::ConfigError::InvalidToken))?;
            value.set_sensitive(true);
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| ClientError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;

        Ok(Self {
            http,
            base_url: config.base_url,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.as_str().trim_end_matches('/'))
    }

    /// Fetch the module catalog.
    ///
    /// Calls `GET {base_url}/v1/modules`.
    pub async fn catalog(&self) -> Result<Catalog, ClientError> {
        self.get_json("GET /v1/modules".into(), self.url("/v1/modules")).await
    }

    /// Fetch a tenant's full entitlement list, in catalog order.
    ///
    /// Calls `GET {base_url}/v1/tenants/{tenant_id}/modules`.
    pub async fn list_entitlements(
        &self,
        tenant_id: TenantId,
    ) -> Result<Vec<ModuleEntitlement>, ClientError> {
        let path = format!("/v1/tenants/{tenant_id}/modules");
        self.get_json(format!("GET {path}"), self.url(&path)).await
    }

    /// Write one entitlement.
    ///
    /// Calls `PUT {base_url}/v1/tenants/{tenant_id}/modules/{module_key}`.
    /// A `409` is decoded into [`ClientError::Conflict`].
    pub async fn update(
        &self,
        tenant_id: TenantId,
        module_key: &ModuleKey,
        update: &UpdateEntitlement,
    ) -> Result<ModuleEntitlement, ClientError> {
        let path = format!("/v1/tenants/{tenant_id}/modules/{module_key}");
        let endpoint = format!("PUT {path}");

        let resp = self
            .http
            .put(self.url(&path))
            .json(update)
            .send()
            .await
            .map_err(|e| ClientError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        if resp.status() == reqwest::StatusCode::CONFLICT {
            let body: ConflictBody = resp.json().await.map_err(|e| ClientError::Deserialization {
                endpoint: endpoint.clone(),
                source: e,
            })?;
            return Err(ClientError::Conflict { endpoint, body });
        }

        read_json(endpoint, resp).await
    }

    /// Ask the service to evaluate a toggle without applying it.
    ///
    /// Calls `GET {base_url}/v1/tenants/{tenant_id}/modules/{module_key}/gate?enabled=..`.
    pub async fn preview(
        &self,
        tenant_id: TenantId,
        module_key: &ModuleKey,
        enabled: bool,
    ) -> Result<GateDecision, ClientError> {
        let path = format!("/v1/tenants/{tenant_id}/modules/{module_key}/gate");
        let url = format!("{}?enabled={enabled}", self.url(&path));
        self.get_json(format!("GET {path}"), url).await
    }

    /// Fetch a tenant's change history, oldest first.
    ///
    /// Calls `GET {base_url}/v1/tenants/{tenant_id}/audit`.
    pub async fn audit(&self, tenant_id: TenantId) -> Result<AuditTrail, ClientError> {
        let path = format!("/v1/tenants/{tenant_id}/audit");
        self.get_json(format!("GET {path}"), self.url(&path)).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: String,
        url: String,
    ) -> Result<T, ClientError> {
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;
        read_json(endpoint, resp).await
    }
}

async fn read_json<T: DeserializeOwned>(
    endpoint: String,
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::ApiError {
            endpoint,
            status,
            body,
        });
    }

    resp.json()
        .await
        .map_err(|e| ClientError::Deserialization {
            endpoint,
            source: e,
        })
}
