//! # Tenant Entitlement API
//!
//! The entitlement record store. Every write to the `enabled` flag is
//! re-checked by the toggle gate under the store's write lock, so a client
//! pre-check that raced with another session ends in a `409` instead of an
//! inconsistent module set. Metadata-only writes skip the gate.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::Utc;
use mops_core::{
    BillingModel, ChangeSource, EntitlementState, EntitlementStatus, ModuleEntitlement, Notes,
    TenantId,
};
use mops_entitlements::{ConflictBody, DependencyGraph, GateDecision, ToggleAction, ToggleGate};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::audit::AuditEvent;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, parse_module_key, parse_tenant_id, Validate};
use crate::state::AppState;

/// Update one module entitlement for a tenant.
///
/// Omitted metadata fields keep their current values.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateEntitlementRequest {
    pub enabled: bool,
    #[serde(default)]
    pub billing_model: Option<BillingModel>,
    #[serde(default)]
    pub status: Option<EntitlementStatus>,
    #[serde(default)]
    pub notes: Option<String>,
    pub source: ChangeSource,
}

impl Validate for UpdateEntitlementRequest {
    fn validate(&self) -> Result<(), String> {
        if let Some(notes) = &self.notes {
            Notes::new(notes.as_str()).map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

/// Query string of the gate preview.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GatePreviewQuery {
    /// Target state to evaluate.
    pub enabled: bool,
}

/// A tenant's entitlement change history.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuditTrailResponse {
    pub tenant_id: TenantId,
    pub count: usize,
    /// Oldest first.
    pub events: Vec<AuditEvent>,
}

/// Build the entitlement router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/tenants/:tenant_id/modules", get(list_entitlements))
        .route(
            "/v1/tenants/:tenant_id/modules/:module_key",
            put(update_entitlement),
        )
        .route(
            "/v1/tenants/:tenant_id/modules/:module_key/gate",
            get(preview_gate),
        )
        .route("/v1/tenants/:tenant_id/audit", get(audit_trail))
}

/// GET /v1/tenants/:tenant_id/modules: Full entitlement list.
#[utoipa::path(
    get,
    path = "/v1/tenants/{tenant_id}/modules",
    params(("tenant_id" = String, Path, description = "Tenant ID (UUID)")),
    responses(
        (status = 200, description = "Entitlements in catalog order", body = [ModuleEntitlement]),
        (status = 422, description = "Invalid tenant ID", body = crate::error::ErrorBody),
    ),
    tag = "entitlements"
)]
async fn list_entitlements(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<Vec<ModuleEntitlement>>, AppError> {
    let tenant_id = parse_tenant_id(&tenant_id)?;
    Ok(Json(state.tenant_entitlements(tenant_id)))
}

/// PUT /v1/tenants/:tenant_id/modules/:module_key: Toggle or update one module.
#[utoipa::path(
    put,
    path = "/v1/tenants/{tenant_id}/modules/{module_key}",
    params(
        ("tenant_id" = String, Path, description = "Tenant ID (UUID)"),
        ("module_key" = String, Path, description = "Module key"),
    ),
    request_body = UpdateEntitlementRequest,
    responses(
        (status = 200, description = "Updated entitlement", body = ModuleEntitlement),
        (status = 404, description = "Module not in catalog", body = crate::error::ErrorBody),
        (status = 409, description = "Dependency gate refused the toggle", body = ConflictBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "entitlements"
)]
async fn update_entitlement(
    State(state): State<AppState>,
    Path((tenant_id, module_key)): Path<(String, String)>,
    body: Result<Json<UpdateEntitlementRequest>, JsonRejection>,
) -> Result<Json<ModuleEntitlement>, AppError> {
    let tenant_id = parse_tenant_id(&tenant_id)?;
    let module_key = parse_module_key(&module_key)?;
    let req = extract_validated_json(body)?;
    let notes = req.notes.map(Notes::new).transpose()?;

    // Held until the write-through below completes.
    let _persist = state.persist_guard().await;

    let catalog = Arc::clone(&state.catalog);
    let definition = catalog
        .get(module_key.as_str())
        .ok_or_else(|| AppError::NotFound(format!("module {module_key} not found")))?;

    let (updated, stored, event) = state.entitlements.try_update_or_default(tenant_id, |rows| {
        let snapshot = catalog.entitlements(rows);
        let current = snapshot
            .iter()
            .find(|m| m.module_key == module_key)
            .ok_or_else(|| AppError::NotFound(format!("module {module_key} not found")))?;

        if current.enabled != req.enabled {
            let graph = DependencyGraph::build(&snapshot);
            ToggleGate::new(&graph).check(current, ToggleAction::for_target(req.enabled))?;
        }

        let stored = EntitlementState {
            enabled: req.enabled,
            billing_model: req.billing_model.unwrap_or(current.billing_model),
            status: req.status.unwrap_or(current.status),
            notes: notes.unwrap_or_else(|| current.notes.clone()),
            source: req.source,
            updated_at: Utc::now(),
        };
        rows.insert(module_key.clone(), stored.clone());
        let event = state
            .audit
            .append(tenant_id, &module_key, current.enabled, &stored);
        let updated = ModuleEntitlement::from_parts(definition, &stored);
        Ok::<_, AppError>((updated, stored, event))
    })?;

    tracing::info!(
        tenant_id = %tenant_id,
        module_key = %module_key,
        action = event.action.as_str(),
        source = %stored.source,
        "entitlement updated"
    );

    // Write-through. The in-memory record is already committed, so a persist
    // failure is surfaced rather than silently lost on restart.
    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::entitlements::upsert(pool, tenant_id, &module_key, &stored).await
        {
            tracing::error!(tenant_id = %tenant_id, module_key = %module_key, error = %e, "failed to persist entitlement");
            return Err(AppError::Internal(
                "entitlement updated in-memory but database persist failed".to_string(),
            ));
        }
        if let Err(e) = crate::db::audit::insert(pool, &event).await {
            tracing::error!(event_id = %event.id, error = %e, "failed to persist audit event");
            return Err(AppError::Internal(
                "entitlement updated but audit persist failed".to_string(),
            ));
        }
    }

    Ok(Json(updated))
}

/// GET /v1/tenants/:tenant_id/modules/:module_key/gate: Evaluate a toggle
/// without applying it.
///
/// The gate is evaluated as if the module were moved to `enabled`, even when
/// it is already in that state.
#[utoipa::path(
    get,
    path = "/v1/tenants/{tenant_id}/modules/{module_key}/gate",
    params(
        ("tenant_id" = String, Path, description = "Tenant ID (UUID)"),
        ("module_key" = String, Path, description = "Module key"),
        GatePreviewQuery,
    ),
    responses(
        (status = 200, description = "Gate decision", body = GateDecision),
        (status = 404, description = "Module not in catalog", body = crate::error::ErrorBody),
    ),
    tag = "entitlements"
)]
async fn preview_gate(
    State(state): State<AppState>,
    Path((tenant_id, module_key)): Path<(String, String)>,
    query: Result<Query<GatePreviewQuery>, QueryRejection>,
) -> Result<Json<GateDecision>, AppError> {
    let tenant_id = parse_tenant_id(&tenant_id)?;
    let module_key = parse_module_key(&module_key)?;
    let Query(query) = query.map_err(|e| AppError::Validation(e.body_text()))?;

    let snapshot = state.tenant_entitlements(tenant_id);
    let module = snapshot
        .iter()
        .find(|m| m.module_key == module_key)
        .ok_or_else(|| AppError::NotFound(format!("module {module_key} not found")))?;
    let graph = DependencyGraph::build(&snapshot);

    Ok(Json(
        ToggleGate::new(&graph).decide(module, ToggleAction::for_target(query.enabled)),
    ))
}

/// GET /v1/tenants/:tenant_id/audit: Entitlement change history.
#[utoipa::path(
    get,
    path = "/v1/tenants/{tenant_id}/audit",
    params(("tenant_id" = String, Path, description = "Tenant ID (UUID)")),
    responses(
        (status = 200, description = "Change history, oldest first", body = AuditTrailResponse),
    ),
    tag = "entitlements"
)]
async fn audit_trail(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<AuditTrailResponse>, AppError> {
    let tenant_id = parse_tenant_id(&tenant_id)?;
    let events = state.audit.for_tenant(tenant_id);
    Ok(Json(AuditTrailResponse {
        tenant_id,
        count: events.len(),
        events,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_validation_bounds_notes() {
        let mut req: UpdateEntitlementRequest =
            serde_json::from_value(serde_json::json!({"enabled": true, "source": "api"})).unwrap();
        assert!(req.validate().is_ok());
        req.notes = Some("x".repeat(mops_core::MAX_NOTES_LEN + 1));
        assert!(req.validate().unwrap_err().contains("notes"));
    }

    #[test]
    fn request_rejects_unknown_billing_model() {
        let result = serde_json::from_value::<UpdateEntitlementRequest>(serde_json::json!({
            "enabled": true,
            "billing_model": "per_user",
            "source": "api"
        }));
        assert!(result.is_err());
    }
}
