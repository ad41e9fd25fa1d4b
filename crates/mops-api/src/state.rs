//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! ## Architecture
//!
//! - **Catalog**: tenant-independent module definitions, fixed at startup.
//! - **Entitlements**: per-tenant stored state, keyed by module. A tenant's
//!   list is the catalog joined with these rows; modules without a row use
//!   their defaults.
//! - **Audit trail**: hash-chained log of accepted writes.
//! - **Database pool**: optional write-through persistence. Writes hold
//!   [`AppState::persist_guard`] from the in-memory commit until the rows
//!   are stored, so Postgres sees commits in the same order as memory.

use std::collections::HashMap;
use std::hash::Hash;
use std::path::PathBuf;
use std::sync::Arc;

use mops_core::{EntitlementState, ModuleEntitlement, ModuleKey, TenantId};
use mops_entitlements::ModuleCatalog;
use parking_lot::RwLock;
use sqlx::PgPool;

use crate::audit::AuditTrail;
use crate::middleware::rate_limit::RateLimitConfig;

// -- Generic In-Memory Store --------------------------------------------------

/// Thread-safe, cloneable in-memory key-value store.
///
/// `parking_lot::RwLock` is non-poisonable and never held across `.await`.
#[derive(Debug)]
pub struct Store<K, V> {
    data: Arc<RwLock<HashMap<K, V>>>,
}

impl<K, V> Clone for Store<K, V> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<K: Eq + Hash, V: Clone> Store<K, V> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.data.write().insert(key, value)
    }

    /// Retrieve a record by key.
    pub fn get(&self, key: &K) -> Option<V> {
        self.data.read().get(key).cloned()
    }

    /// Return the number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash, V: Clone + Default> Store<K, V> {
    /// Atomically read-validate-update a record, starting from `V::default()`
    /// when the key is absent.
    ///
    /// The closure runs under a single write lock, so a check and the write
    /// that depends on it cannot interleave with another writer. If the
    /// closure fails on an absent key, no record is created.
    pub fn try_update_or_default<R, E>(
        &self,
        key: K,
        f: impl FnOnce(&mut V) -> Result<R, E>,
    ) -> Result<R, E> {
        let mut guard = self.data.write();
        match guard.get_mut(&key) {
            Some(entry) => f(entry),
            None => {
                let mut fresh = V::default();
                let result = f(&mut fresh)?;
                guard.insert(key, fresh);
                Ok(result)
            }
        }
    }
}

impl<K: Eq + Hash, V: Clone> Default for Store<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// A tenant's stored entitlement rows, keyed by module.
pub type TenantModules = HashMap<ModuleKey, EntitlementState>;

// -- Configuration ------------------------------------------------------------

/// Error reading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable was set to a value that does not parse.
    #[error("invalid value for {name}: {value:?} ({reason})")]
    InvalidVar {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Application configuration.
///
/// Custom `Debug` redacts the `auth_token` and `database_url`.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Static bearer token. If `None`, authentication is disabled.
    pub auth_token: Option<String>,
    /// Postgres URL. If `None`, the service runs in-memory only.
    pub database_url: Option<String>,
    /// Module catalog YAML. If `None`, the built-in catalog is served.
    pub catalog_path: Option<PathBuf>,
    /// Per-tenant request budget.
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    /// Read configuration from `PORT`, `AUTH_TOKEN`, `DATABASE_URL`,
    /// `MOPS_CATALOG`, `RATE_LIMIT_MAX` and `RATE_LIMIT_WINDOW_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            port: parse_var("PORT", non_empty("PORT"), defaults.port)?,
            auth_token: non_empty("AUTH_TOKEN"),
            database_url: non_empty("DATABASE_URL"),
            catalog_path: non_empty("MOPS_CATALOG").map(PathBuf::from),
            rate_limit: RateLimitConfig {
                max_requests: parse_var(
                    "RATE_LIMIT_MAX",
                    non_empty("RATE_LIMIT_MAX"),
                    defaults.rate_limit.max_requests,
                )?,
                window_secs: parse_var(
                    "RATE_LIMIT_WINDOW_SECS",
                    non_empty("RATE_LIMIT_WINDOW_SECS"),
                    defaults.rate_limit.window_secs,
                )?,
            },
        })
    }
}

fn parse_var<T>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidVar {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("catalog_path", &self.catalog_path)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            database_url: None,
            catalog_path: None,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

// -- Application State --------------------------------------------------------

/// Shared application state accessible to all route handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub catalog: Arc<ModuleCatalog>,
    pub entitlements: Store<TenantId, TenantModules>,
    pub audit: AuditTrail,
    /// When `Some`, accepted writes and audit events are persisted to
    /// Postgres in addition to the in-memory stores.
    pub db_pool: Option<PgPool>,
    persist_lock: Arc<tokio::sync::Mutex<()>>,
    pub config: AppConfig,
}

impl AppState {
    /// Create state over a validated catalog.
    pub fn new(catalog: ModuleCatalog, config: AppConfig, db_pool: Option<PgPool>) -> Self {
        Self {
            catalog: Arc::new(catalog),
            entitlements: Store::new(),
            audit: AuditTrail::new(),
            db_pool,
            persist_lock: Arc::new(tokio::sync::Mutex::new(())),
            config,
        }
    }

    /// Serialise write-through persistence. `None` when running in-memory
    /// only, where the store lock alone orders writes.
    pub async fn persist_guard(&self) -> Option<tokio::sync::MutexGuard<'_, ()>> {
        match self.db_pool {
            Some(_) => Some(self.persist_lock.lock().await),
            None => None,
        }
    }

    /// The full entitlement list for a tenant, in catalog order.
    pub fn tenant_entitlements(&self, tenant_id: TenantId) -> Vec<ModuleEntitlement> {
        let rows = self.entitlements.get(&tenant_id).unwrap_or_default();
        self.catalog.entitlements(&rows)
    }

    /// Hydrate in-memory stores from the database.
    ///
    /// Called once on startup when a database pool is available.
    pub async fn hydrate_from_db(&self) -> Result<(), sqlx::Error> {
        let pool = match &self.db_pool {
            Some(pool) => pool,
            None => return Ok(()),
        };

        let rows = crate::db::entitlements::load_all(pool).await?;
        let row_count = rows.len();
        let mut by_tenant: HashMap<TenantId, TenantModules> = HashMap::new();
        for (tenant_id, module_key, state) in rows {
            if self.catalog.get(module_key.as_str()).is_none() {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    module_key = %module_key,
                    "stored entitlement for a module not in the catalog; ignoring"
                );
                continue;
            }
            by_tenant.entry(tenant_id).or_default().insert(module_key, state);
        }
        let tenant_count = by_tenant.len();
        for (tenant_id, modules) in by_tenant {
            self.entitlements.insert(tenant_id, modules);
        }

        let events = crate::db::audit::load_all(pool).await?;
        self.audit.restore(events);
        let integrity = self.audit.verify();
        if !integrity.chain_valid {
            tracing::error!(
                total_events = integrity.total_events,
                broken_links = integrity.broken_links,
                "entitlement audit chain failed verification"
            );
        }

        tracing::info!(
            tenants = tenant_count,
            entitlements = row_count,
            audit_events = integrity.total_events,
            "Hydrated in-memory stores from database"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_insert_and_get() {
        let store: Store<u32, String> = Store::new();
        assert!(store.is_empty());
        assert!(store.insert(1, "a".into()).is_none());
        assert_eq!(store.insert(1, "b".into()), Some("a".into()));
        assert_eq!(store.get(&1), Some("b".into()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn try_update_or_default_creates_on_success() {
        let store: Store<u32, Vec<u8>> = Store::new();
        let len = store
            .try_update_or_default(7, |v| {
                v.push(1);
                Ok::<_, ()>(v.len())
            })
            .unwrap();
        assert_eq!(len, 1);
        assert_eq!(store.get(&7), Some(vec![1]));
    }

    #[test]
    fn try_update_or_default_leaves_no_record_on_failure() {
        let store: Store<u32, Vec<u8>> = Store::new();
        let result: Result<(), &str> = store.try_update_or_default(7, |v| {
            v.push(1);
            Err("rejected")
        });
        assert!(result.is_err());
        assert!(store.get(&7).is_none());
    }

    #[test]
    fn store_clone_shares_underlying_data() {
        let store: Store<u32, u32> = Store::new();
        let other = store.clone();
        store.insert(1, 10);
        assert_eq!(other.get(&1), Some(10));
    }

    #[test]
    fn config_from_lookup_defaults() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.auth_token.is_none());
        assert!(config.catalog_path.is_none());
        assert_eq!(config.rate_limit.max_requests, 1000);
    }

    #[test]
    fn config_from_lookup_reads_values() {
        let config = AppConfig::from_lookup(|name| match name {
            "PORT" => Some("9090".into()),
            "AUTH_TOKEN" => Some("secret".into()),
            "MOPS_CATALOG" => Some("/etc/mops/catalog.yaml".into()),
            "RATE_LIMIT_MAX" => Some("5".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.catalog_path, Some(PathBuf::from("/etc/mops/catalog.yaml")));
        assert_eq!(config.rate_limit.max_requests, 5);
    }

    #[test]
    fn config_rejects_bad_port() {
        let err = AppConfig::from_lookup(|name| (name == "PORT").then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn config_debug_redacts_secrets() {
        let config = AppConfig {
            auth_token: Some("super-secret".into()),
            database_url: Some("postgres://user:pw@db/mops".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("pw@db"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn tenant_entitlements_default_to_catalog() {
        let state = AppState::new(
            ModuleCatalog::builtin().unwrap(),
            AppConfig::default(),
            None,
        );
        let list = state.tenant_entitlements(TenantId::new());
        assert_eq!(list.len(), state.catalog.len());
        assert!(list[0].enabled, "admin is core");
        assert!(!list[2].enabled, "purchasing is an add-on");
    }

    #[tokio::test]
    async fn persist_guard_is_absent_without_database() {
        let state = AppState::new(ModuleCatalog::builtin().unwrap(), AppConfig::default(), None);
        assert!(state.persist_guard().await.is_none());
    }

    #[tokio::test]
    async fn persist_guard_serialises_writers() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://mops@localhost/mops")
            .unwrap();
        let state = AppState::new(
            ModuleCatalog::builtin().unwrap(),
            AppConfig::default(),
            Some(pool),
        );

        let first = state.persist_guard().await;
        assert!(first.is_some());
        let waited = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            state.persist_guard(),
        )
        .await;
        assert!(waited.is_err(), "second writer must wait for the first");

        drop(first);
        assert!(state.persist_guard().await.is_some());
    }
}
