//! # Service Bootstrap
//!
//! Loads the module catalog at startup and assembles [`AppState`].
//!
//! If `MOPS_CATALOG` is unset the built-in catalog is served. A catalog with
//! dependency cycles is accepted (the gate still terminates on it) but every
//! cycle is logged so operators can fix the catalog.

use std::path::Path;

use mops_entitlements::{CatalogError, ModuleCatalog};
use sqlx::PgPool;

use crate::state::{AppConfig, AppState};

/// Errors during service bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// The catalog file could not be read or failed validation.
    #[error("module catalog: {0}")]
    Catalog(#[from] CatalogError),
}

/// Load the configured catalog and build the application state.
pub fn bootstrap(config: AppConfig, db_pool: Option<PgPool>) -> Result<AppState, BootstrapError> {
    let catalog = load_catalog(config.catalog_path.as_deref())?;

    let cycles = catalog.cycles();
    for cycle in &cycles {
        let path = cycle
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(" -> ");
        tracing::warn!(cycle = %path, "module catalog contains a dependency cycle");
    }

    let core = catalog.modules().iter().filter(|m| m.is_core).count();
    tracing::info!(
        modules = catalog.len(),
        core_modules = core,
        cycles = cycles.len(),
        source = config
            .catalog_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "builtin".to_string()),
        "Module catalog loaded"
    );

    Ok(AppState::new(catalog, config, db_pool))
}

fn load_catalog(path: Option<&Path>) -> Result<ModuleCatalog, CatalogError> {
    match path {
        Some(path) => ModuleCatalog::from_path(path),
        None => ModuleCatalog::builtin(),
    }
}
