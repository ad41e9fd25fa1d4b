//! # Entitlement Audit Trail
//!
//! Every accepted entitlement write appends an [`AuditEvent`] whose
//! `event_hash` is SHA-256 over the previous event's hash and the event's
//! own fields. The chain is global across tenants, so removing or editing
//! any event breaks every later link.
//!
//! Each event carries its chain position in `sequence`, assigned under the
//! trail's lock. Storage may receive events in a different order than they
//! were chained; [`AuditTrail::restore`] re-sorts by `sequence`.
//!
//! The in-memory trail is authoritative for reads. When a database is
//! configured the same events are persisted by [`crate::db::audit`] and
//! restored on startup.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use mops_core::{BillingModel, ChangeSource, EntitlementState, EntitlementStatus, ModuleKey, TenantId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;
use uuid::Uuid;

/// Hash that precedes the first event in the chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// What an entitlement write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// The module was switched on.
    Enable,
    /// The module was switched off.
    Disable,
    /// Only billing model, status or notes changed.
    Update,
}

impl AuditAction {
    /// Classify a write by the enabled flag before and after it.
    pub fn classify(was_enabled: bool, now_enabled: bool) -> Self {
        match (was_enabled, now_enabled) {
            (false, true) => Self::Enable,
            (true, false) => Self::Disable,
            _ => Self::Update,
        }
    }

    /// Return the string representation of this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Update => "update",
        }
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enable" => Ok(Self::Enable),
            "disable" => Ok(Self::Disable),
            "update" => Ok(Self::Update),
            other => Err(format!("unknown audit action: {other}")),
        }
    }
}

/// One entry in the entitlement change log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuditEvent {
    /// Position in the chain, starting at 0.
    pub sequence: u64,
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub module_key: ModuleKey,
    pub action: AuditAction,
    /// Enabled flag after the write.
    pub enabled: bool,
    pub billing_model: BillingModel,
    pub status: EntitlementStatus,
    pub source: ChangeSource,
    pub previous_hash: String,
    pub event_hash: String,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEvent {
    /// Hash of this event's content chained onto `previous_hash`.
    pub fn compute_hash(&self) -> String {
        let input = format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.previous_hash,
            self.sequence,
            self.id,
            self.tenant_id,
            self.module_key,
            self.action.as_str(),
            self.enabled,
            self.billing_model,
            self.status,
            self.source,
            self.recorded_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        );
        sha256_hex(&input)
    }
}

/// Result of re-walking the hash chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ChainIntegrity {
    pub total_events: usize,
    pub broken_links: usize,
    pub chain_valid: bool,
}

/// Shared, append-only audit trail.
#[derive(Debug, Clone, Default)]
pub struct AuditTrail {
    events: Arc<RwLock<Vec<AuditEvent>>>,
}

impl AuditTrail {
    /// Create an empty trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event for a write that left `module_key` in `state`.
    pub fn append(
        &self,
        tenant_id: TenantId,
        module_key: &ModuleKey,
        was_enabled: bool,
        state: &EntitlementState,
    ) -> AuditEvent {
        let mut events = self.events.write();
        let (sequence, previous_hash) = match events.last() {
            Some(last) => (last.sequence + 1, last.event_hash.clone()),
            None => (0, GENESIS_HASH.to_string()),
        };

        let mut event = AuditEvent {
            sequence,
            id: Uuid::new_v4(),
            tenant_id,
            module_key: module_key.clone(),
            action: AuditAction::classify(was_enabled, state.enabled),
            enabled: state.enabled,
            billing_model: state.billing_model,
            status: state.status,
            source: state.source,
            previous_hash,
            event_hash: String::new(),
            recorded_at: state.updated_at,
        };
        event.event_hash = event.compute_hash();
        events.push(event.clone());
        event
    }

    /// Replace the trail with events loaded from storage, in any order.
    pub fn restore(&self, mut loaded: Vec<AuditEvent>) {
        loaded.sort_by_key(|e| e.sequence);
        *self.events.write() = loaded;
    }

    /// Events for one tenant, oldest first.
    pub fn for_tenant(&self, tenant_id: TenantId) -> Vec<AuditEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.tenant_id == tenant_id)
            .cloned()
            .collect()
    }

    /// Number of events across all tenants.
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Whether no events have been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Re-walk the chain, checking positions, links and content hashes.
    pub fn verify(&self) -> ChainIntegrity {
        let events = self.events.read();
        let mut broken_links = 0;
        let mut expected_prev = GENESIS_HASH;

        for (position, event) in events.iter().enumerate() {
            if event.sequence != position as u64
                || event.previous_hash != expected_prev
                || event.compute_hash() != event.event_hash
            {
                broken_links += 1;
            }
            expected_prev = &event.event_hash;
        }

        ChainIntegrity {
            total_events: events.len(),
            broken_links,
            chain_valid: broken_links == 0,
        }
    }
}

/// Compute SHA-256 hex digest of input string.
fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mops_core::Notes;

    fn state(enabled: bool) -> EntitlementState {
        EntitlementState {
            enabled,
            billing_model: BillingModel::Included,
            status: EntitlementStatus::Active,
            notes: Notes::default(),
            source: ChangeSource::Api,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn classify_actions() {
        assert_eq!(AuditAction::classify(false, true), AuditAction::Enable);
        assert_eq!(AuditAction::classify(true, false), AuditAction::Disable);
        assert_eq!(AuditAction::classify(true, true), AuditAction::Update);
        assert_eq!("disable".parse::<AuditAction>().unwrap(), AuditAction::Disable);
        assert!("delete".parse::<AuditAction>().is_err());
    }

    #[test]
    fn events_chain_onto_each_other() {
        let trail = AuditTrail::new();
        let tenant = TenantId::new();
        let key = ModuleKey::new("labor").unwrap();

        let first = trail.append(tenant, &key, false, &state(true));
        let second = trail.append(tenant, &key, true, &state(false));

        assert_eq!(first.sequence, 0);
        assert_eq!(second.sequence, 1);
        assert_eq!(first.previous_hash, GENESIS_HASH);
        assert_eq!(second.previous_hash, first.event_hash);
        assert_eq!(first.event_hash.len(), 64);
        assert_eq!(second.action, AuditAction::Disable);
        assert!(trail.verify().chain_valid);
    }

    #[test]
    fn for_tenant_filters_and_keeps_order() {
        let trail = AuditTrail::new();
        let a = TenantId::new();
        let b = TenantId::new();
        let key = ModuleKey::new("labor").unwrap();
        trail.append(a, &key, false, &state(true));
        trail.append(b, &key, false, &state(true));
        trail.append(a, &key, true, &state(false));

        let events = trail.for_tenant(a);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, AuditAction::Enable);
        assert_eq!(events[1].action, AuditAction::Disable);
        assert_eq!(trail.len(), 3);
    }

    #[test]
    fn tampering_breaks_the_chain() {
        let trail = AuditTrail::new();
        let tenant = TenantId::new();
        let key = ModuleKey::new("labor").unwrap();
        trail.append(tenant, &key, false, &state(true));
        trail.append(tenant, &key, true, &state(false));

        let mut events = trail.for_tenant(tenant);
        events[0].enabled = false;
        trail.restore(events);

        let integrity = trail.verify();
        assert_eq!(integrity.total_events, 2);
        assert_eq!(integrity.broken_links, 1);
        assert!(!integrity.chain_valid);
    }

    #[test]
    fn restore_orders_by_chain_position() {
        let trail = AuditTrail::new();
        let tenant = TenantId::new();
        let key = ModuleKey::new("labor").unwrap();
        trail.append(tenant, &key, false, &state(true));
        trail.append(tenant, &key, true, &state(false));
        trail.append(tenant, &key, false, &state(true));

        // Storage handed the events back in a different order than chained.
        let mut stored = trail.for_tenant(tenant);
        stored.reverse();
        let restored = AuditTrail::new();
        restored.restore(stored);

        assert!(restored.verify().chain_valid);
        let next = restored.append(tenant, &key, true, &state(false));
        assert_eq!(next.sequence, 3);
        assert!(restored.verify().chain_valid);
    }

    #[test]
    fn missing_event_breaks_the_chain() {
        let trail = AuditTrail::new();
        let tenant = TenantId::new();
        let key = ModuleKey::new("labor").unwrap();
        trail.append(tenant, &key, false, &state(true));
        trail.append(tenant, &key, true, &state(false));
        trail.append(tenant, &key, false, &state(true));

        let mut events = trail.for_tenant(tenant);
        events.remove(1);
        trail.restore(events);

        assert!(!trail.verify().chain_valid);
    }
}
