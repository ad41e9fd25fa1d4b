//! Audit event persistence. Events are append-only and keyed by their chain
//! position, so concurrent inserts landing out of order still load back in
//! chain order.

use chrono::{DateTime, Utc};
use mops_core::{BillingModel, ChangeSource, EntitlementStatus, ModuleKey, TenantId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditEvent};

/// Append one event.
pub async fn insert(pool: &PgPool, event: &AuditEvent) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO entitlement_audit_events
         (chain_seq, id, tenant_id, module_key, action, enabled, billing_model, status, source,
          previous_hash, event_hash, recorded_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(sequence_to_db(event.sequence))
    .bind(event.id)
    .bind(event.tenant_id.as_uuid())
    .bind(event.module_key.as_str())
    .bind(event.action.as_str())
    .bind(event.enabled)
    .bind(event.billing_model.as_str())
    .bind(event.status.as_str())
    .bind(event.source.as_str())
    .bind(&event.previous_hash)
    .bind(&event.event_hash)
    .bind(event.recorded_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load the whole chain in append order.
pub async fn load_all(pool: &PgPool) -> Result<Vec<AuditEvent>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AuditRow>(
        "SELECT chain_seq, id, tenant_id, module_key, action, enabled, billing_model, status, source,
                previous_hash, event_hash, recorded_at
         FROM entitlement_audit_events ORDER BY chain_seq ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().filter_map(AuditRow::into_event).collect())
}

/// Chain positions are stored as `BIGINT` and saturate at `i64::MAX`.
fn sequence_to_db(sequence: u64) -> i64 {
    i64::try_from(sequence).unwrap_or(i64::MAX)
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    chain_seq: i64,
    id: Uuid,
    tenant_id: Uuid,
    module_key: String,
    action: String,
    enabled: bool,
    billing_model: String,
    status: String,
    source: String,
    previous_hash: String,
    event_hash: String,
    recorded_at: DateTime<Utc>,
}

impl AuditRow {
    fn into_event(self) -> Option<AuditEvent> {
        let fields = (
            u64::try_from(self.chain_seq).map_err(|_| format!("negative chain_seq {}", self.chain_seq)),
            ModuleKey::new(self.module_key.as_str()).map_err(|e| e.to_string()),
            self.action.parse::<AuditAction>(),
            self.billing_model
                .parse::<BillingModel>()
                .map_err(|e| e.to_string()),
            self.status
                .parse::<EntitlementStatus>()
                .map_err(|e| e.to_string()),
            self.source.parse::<ChangeSource>().map_err(|e| e.to_string()),
        );

        match fields {
            (Ok(sequence), Ok(module_key), Ok(action), Ok(billing_model), Ok(status), Ok(source)) => {
                Some(AuditEvent {
                    sequence,
                    id: self.id,
                    tenant_id: TenantId::from_uuid(self.tenant_id),
                    module_key,
                    action,
                    enabled: self.enabled,
                    billing_model,
                    status,
                    source,
                    previous_hash: self.previous_hash,
                    event_hash: self.event_hash,
                    recorded_at: self.recorded_at,
                })
            }
            (sequence, module_key, action, billing_model, status, source) => {
                let reason = [
                    sequence.err(),
                    module_key.err(),
                    action.err(),
                    billing_model.err(),
                    status.err(),
                    source.err(),
                ]
                .into_iter()
                .flatten()
                .collect::<Vec<String>>()
                .join("; ");
                tracing::error!(
                    event_id = %self.id,
                    reason = %reason,
                    "undecodable audit event in database; skipping"
                );
                None
            }
        }
    }
}
