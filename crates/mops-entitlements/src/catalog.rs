//! # Module Catalog
//!
//! Tenant-independent module definitions. A tenant's entitlement snapshot is
//! the catalog, in catalog order, joined with whatever state the tenant has
//! stored; modules with no stored state get
//! [`ModuleEntitlement::default_for`].
//!
//! ## Validation
//!
//! Loading rejects duplicate keys, empty names and dependency keys that do
//! not name a catalog module. Dependency cycles are accepted and surfaced
//! through [`ModuleCatalog::cycles`] so the caller can warn about them.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use mops_core::{EntitlementState, ModuleDefinition, ModuleEntitlement, ModuleKey};
use serde::Deserialize;
use thiserror::Error;

use crate::graph::DependencyGraph;

const BUILTIN_CATALOG: &str = include_str!("builtin_catalog.yaml");

/// Errors while loading or validating a module catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Catalog file could not be read.
    #[error("failed to read catalog {path}: {source}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Catalog document is not valid YAML or does not match the schema.
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The same module key appears more than once.
    #[error("duplicate module key in catalog: {0}")]
    DuplicateKey(ModuleKey),

    /// A module has an empty display name.
    #[error("module {0} has an empty module_name")]
    EmptyName(ModuleKey),

    /// A dependency key does not name a module in the catalog.
    #[error("module {module} depends on unknown module {dependency}")]
    UnknownDependency {
        /// The declaring module.
        module: ModuleKey,
        /// The dependency key that did not resolve.
        dependency: ModuleKey,
    },
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    modules: Vec<ModuleDefinition>,
}

/// Validated, ordered set of module definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleCatalog {
    modules: Vec<ModuleDefinition>,
}

impl ModuleCatalog {
    /// Validate and wrap a list of module definitions.
    pub fn new(modules: Vec<ModuleDefinition>) -> Result<Self, CatalogError> {
        let mut keys = HashSet::with_capacity(modules.len());
        for module in &modules {
            if !keys.insert(module.module_key.as_str()) {
                return Err(CatalogError::DuplicateKey(module.module_key.clone()));
            }
            if module.module_name.trim().is_empty() {
                return Err(CatalogError::EmptyName(module.module_key.clone()));
            }
        }
        for module in &modules {
            if let Some(dep) = module
                .dependency_keys
                .iter()
                .find(|dep| !keys.contains(dep.as_str()))
            {
                return Err(CatalogError::UnknownDependency {
                    module: module.module_key.clone(),
                    dependency: dep.clone(),
                });
            }
        }
        Ok(Self { modules })
    }

    /// Parse and validate a catalog from a YAML document with a top-level
    /// `modules` list.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        let doc: CatalogDocument = serde_yaml::from_str(yaml)?;
        Self::new(doc.modules)
    }

    /// Read, parse and validate a catalog file.
    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_yaml_str(&yaml)?;
        tracing::debug!(path = %path.display(), modules = catalog.len(), "loaded module catalog");
        Ok(catalog)
    }

    /// The built-in manufacturing catalog.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_yaml_str(BUILTIN_CATALOG)
    }

    /// Definitions in catalog order.
    pub fn modules(&self) -> &[ModuleDefinition] {
        &self.modules
    }

    /// Look up a definition by key.
    pub fn get(&self, key: &str) -> Option<&ModuleDefinition> {
        self.modules.iter().find(|m| m.module_key.as_str() == key)
    }

    /// Number of modules in the catalog.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether the catalog has no modules.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Build a tenant's full entitlement snapshot from its stored state.
    ///
    /// Stored rows for keys that are no longer in the catalog are ignored.
    pub fn entitlements(
        &self,
        stored: &HashMap<ModuleKey, EntitlementState>,
    ) -> Vec<ModuleEntitlement> {
        self.modules
            .iter()
            .map(|def| match stored.get(&def.module_key) {
                Some(state) => ModuleEntitlement::from_parts(def, state),
                None => ModuleEntitlement::default_for(def),
            })
            .collect()
    }

    /// Dependency cycles among catalog modules. See [`DependencyGraph::cycles`].
    pub fn cycles(&self) -> Vec<Vec<ModuleKey>> {
        let snapshot = self.entitlements(&HashMap::new());
        DependencyGraph::build(&snapshot).cycles()
    }
}
