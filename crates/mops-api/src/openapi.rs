//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "mops Module Entitlements API",
        description = "Per-tenant feature module entitlements with dependency-gated toggles.",
        license(name = "BUSL-1.1")
    ),
    paths(
        crate::routes::modules::list_modules,
        crate::routes::entitlements::list_entitlements,
        crate::routes::entitlements::update_entitlement,
        crate::routes::entitlements::preview_gate,
        crate::routes::entitlements::audit_trail,
        crate::middleware::metrics::metrics_snapshot,
    ),
    components(schemas(
        // Core records
        mops_core::TenantId,
        mops_core::ModuleKey,
        mops_core::Notes,
        mops_core::BillingModel,
        mops_core::EntitlementStatus,
        mops_core::ChangeSource,
        mops_core::ModuleDefinition,
        mops_core::ModuleEntitlement,
        // Gate
        mops_entitlements::ToggleAction,
        mops_entitlements::GateDecision,
        mops_entitlements::ConflictBody,
        // Audit
        crate::audit::AuditAction,
        crate::audit::AuditEvent,
        // Error types
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        // DTOs
        crate::routes::modules::CatalogResponse,
        crate::routes::entitlements::UpdateEntitlementRequest,
        crate::routes::entitlements::AuditTrailResponse,
        crate::middleware::metrics::MetricsSnapshot,
    )),
    tags(
        (name = "modules", description = "Module catalog"),
        (name = "entitlements", description = "Tenant module entitlements"),
        (name = "operations", description = "Service counters"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json: Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
