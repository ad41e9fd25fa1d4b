//! # Module Catalog API
//!
//! Read-only view of the module definitions the service was started with.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use mops_core::{ModuleDefinition, ModuleKey};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::AppState;

/// The module catalog and its dependency cycles, if any.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CatalogResponse {
    pub modules: Vec<ModuleDefinition>,
    /// Each cycle as a key path starting at its smallest key.
    pub cycles: Vec<Vec<ModuleKey>>,
}

/// Build the catalog router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/modules", get(list_modules))
}

/// GET /v1/modules: List module definitions in catalog order.
#[utoipa::path(
    get,
    path = "/v1/modules",
    responses(
        (status = 200, description = "Module catalog", body = CatalogResponse),
    ),
    tag = "modules"
)]
async fn list_modules(State(state): State<AppState>) -> Json<CatalogResponse> {
    Json(CatalogResponse {
        modules: state.catalog.modules().to_vec(),
        cycles: state.catalog.cycles(),
    })
}
