//! # mops-api: Module Entitlement Service
//!
//! Owns the per-tenant module entitlement records. Every change to a
//! module's `enabled` flag is re-checked by the toggle gate from
//! [`mops_entitlements`] under the store's write lock, so two admin
//! sessions racing on dependent modules cannot leave a tenant with an
//! enabled module whose dependency is off.
//!
//! ## API Surface
//!
//! | Route                                                 | Module                   |
//! |-------------------------------------------------------|--------------------------|
//! | `GET /v1/modules`                                     | [`routes::modules`]      |
//! | `GET /v1/tenants/{tenant_id}/modules`                 | [`routes::entitlements`] |
//! | `PUT /v1/tenants/{tenant_id}/modules/{module_key}`    | [`routes::entitlements`] |
//! | `GET /v1/tenants/{tenant_id}/modules/{key}/gate`      | [`routes::entitlements`] |
//! | `GET /v1/tenants/{tenant_id}/audit`                   | [`routes::entitlements`] |
//! | `GET /v1/metrics`                                     | [`middleware::metrics`]  |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware → RateLimitMiddleware → Handler
//! ```
//!
//! ## OpenAPI
//!
//! Generated via utoipa derive macros, served at `/openapi.json`.

pub mod audit;
pub mod auth;
pub mod bootstrap;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::middleware::metrics::ApiMetrics;
use crate::middleware::rate_limit::RateLimiter;
use crate::state::AppState;

/// Request bodies larger than this are rejected with 413.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes (`/health/*`) are mounted outside the auth middleware
/// so they remain accessible without credentials.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };
    let metrics = ApiMetrics::new();
    let limiter = RateLimiter::new(state.config.rate_limit.clone());

    let api = Router::new()
        .merge(routes::modules::router())
        .merge(routes::entitlements::router())
        .merge(openapi::router())
        .route("/v1/metrics", get(middleware::metrics::metrics_snapshot))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(from_fn(middleware::rate_limit::rate_limit_middleware))
        .layer(from_fn(auth::auth_middleware))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .layer(axum::Extension(metrics))
        .layer(axum::Extension(limiter))
        .with_state(state);

    let health = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness));

    Router::new().merge(health).merge(api)
}

/// Liveness probe. Always 200 while the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe. The catalog is loaded before the router exists, so a
/// serving process is ready.
async fn readiness() -> &'static str {
    "ready"
}
