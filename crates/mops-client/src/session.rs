//! # Entitlement Session
//!
//! One operator's view of one tenant's modules. The session owns the last
//! fetched snapshot and is the only place it changes:
//!
//! 1. [`EntitlementSession::load`] replaces the snapshot with a fresh list.
//! 2. [`EntitlementSession::request_toggle`] runs the gate against the
//!    snapshot. A rejection returns before any request is sent, and so does
//!    a toggle to the state the module is already in.
//! 3. On approval the write is sent. A `409` means another session changed
//!    the tenant first; the snapshot is marked stale and the service's
//!    rejection returned.
//! 4. On success the toggled row is patched in place, then the full list is
//!    re-fetched. If the re-fetch fails the patched snapshot is kept and
//!    marked stale.
//!
//! The dependency graph is rebuilt from the snapshot on every decision.

use mops_core::{ChangeSource, ModuleEntitlement, ModuleKey, Notes, TenantId};
use mops_entitlements::{DependencyGraph, GateDecision, ToggleAction, ToggleGate};

use crate::{ClientError, EntitlementClient, UpdateEntitlement};

/// Controller for one tenant's entitlement snapshot.
#[derive(Debug)]
pub struct EntitlementSession {
    client: EntitlementClient,
    tenant_id: TenantId,
    modules: Vec<ModuleEntitlement>,
    stale: bool,
}

impl EntitlementSession {
    /// A session with an empty snapshot. Call [`Self::load`] before toggling.
    pub fn new(client: EntitlementClient, tenant_id: TenantId) -> Self {
        Self {
            client,
            tenant_id,
            modules: Vec::new(),
            stale: true,
        }
    }

    /// Create a session and load its snapshot.
    pub async fn open(client: EntitlementClient, tenant_id: TenantId) -> Result<Self, ClientError> {
        let mut session = Self::new(client, tenant_id);
        session.load().await?;
        Ok(session)
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Fetch the tenant's full entitlement list, replacing the snapshot.
    pub async fn load(&mut self) -> Result<&[ModuleEntitlement], ClientError> {
        self.modules = self.client.list_entitlements(self.tenant_id).await?;
        self.stale = false;
        tracing::debug!(
            tenant_id = %self.tenant_id,
            modules = self.modules.len(),
            "entitlement snapshot loaded"
        );
        Ok(&self.modules)
    }

    /// The current snapshot, in catalog order.
    pub fn snapshot(&self) -> &[ModuleEntitlement] {
        &self.modules
    }

    /// Whether the snapshot may differ from the service's records.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Dependency graph over the current snapshot.
    pub fn graph(&self) -> DependencyGraph<'_> {
        DependencyGraph::build(&self.modules)
    }

    /// Evaluate a toggle against the snapshot without sending anything.
    pub fn preview(&self, module_key: &str, enabled: bool) -> Result<GateDecision, ClientError> {
        let module = self.module(module_key)?;
        let graph = self.graph();
        Ok(ToggleGate::new(&graph).decide(module, ToggleAction::for_target(enabled)))
    }

    /// Move `module_key` to `enabled`, gated on the snapshot.
    ///
    /// Returns the service's updated row. The snapshot reflects the
    /// re-fetched list, or the patched row if the re-fetch failed.
    ///
    /// If the module is already in the requested state and `notes` is
    /// `None`, nothing is sent and the snapshot row is returned. With
    /// `notes`, the same-state write goes out as a metadata update.
    pub async fn request_toggle(
        &mut self,
        module_key: &str,
        enabled: bool,
        source: ChangeSource,
        notes: Option<Notes>,
    ) -> Result<ModuleEntitlement, ClientError> {
        let key = {
            let module = self.module(module_key)?;
            if module.enabled == enabled && notes.is_none() {
                tracing::debug!(
                    tenant_id = %self.tenant_id,
                    module_key = %module.module_key,
                    enabled,
                    "module already in requested state; nothing to send"
                );
                return Ok(module.clone());
            }
            if module.enabled != enabled {
                let graph = self.graph();
                if let Err(rejection) =
                    ToggleGate::new(&graph).check(module, ToggleAction::for_target(enabled))
                {
                    tracing::info!(
                        tenant_id = %self.tenant_id,
                        module_key = %module.module_key,
                        blockers = ?rejection.blockers(),
                        "toggle rejected locally"
                    );
                    return Err(rejection.into());
                }
            }
            module.module_key.clone()
        };

        let update = UpdateEntitlement {
            notes,
            ..UpdateEntitlement::toggle(enabled, source)
        };
        let updated = match self.client.update(self.tenant_id, &key, &update).await {
            Ok(updated) => updated,
            Err(err) => {
                if err.is_gate_rejection() {
                    tracing::info!(
                        tenant_id = %self.tenant_id,
                        module_key = %key,
                        blockers = ?err.blockers(),
                        "toggle rejected by service"
                    );
                    self.stale = true;
                }
                return Err(err);
            }
        };

        self.patch(&updated);

        let refetch = self.load().await.map(|_| ());
        if let Err(err) = refetch {
            tracing::warn!(
                tenant_id = %self.tenant_id,
                module_key = %key,
                error = %err,
                "re-fetch after toggle failed; snapshot is stale"
            );
            self.stale = true;
        }

        Ok(updated)
    }

    fn module(&self, module_key: &str) -> Result<&ModuleEntitlement, ClientError> {
        match self.modules.iter().find(|m| m.module_key == module_key) {
            Some(module) => Ok(module),
            None => Err(ClientError::UnknownModule(ModuleKey::new(module_key)?)),
        }
    }

    fn patch(&mut self, updated: &ModuleEntitlement) {
        if let Some(row) = self
            .modules
            .iter_mut()
            .find(|m| m.module_key == updated.module_key)
        {
            *row = updated.clone();
        }
    }
}
