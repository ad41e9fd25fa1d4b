//! Entitlement row persistence.
//!
//! Only tenant-specific state is stored; module names and dependencies come
//! from the catalog at read time.

use chrono::{DateTime, Utc};
use mops_core::{
    BillingModel, ChangeSource, EntitlementState, EntitlementStatus, ModuleKey, Notes, TenantId,
};
use sqlx::PgPool;
use uuid::Uuid;

/// Insert or replace one tenant×module row.
pub async fn upsert(
    pool: &PgPool,
    tenant_id: TenantId,
    module_key: &ModuleKey,
    state: &EntitlementState,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO module_entitlements
         (tenant_id, module_key, enabled, billing_model, status, notes, source, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (tenant_id, module_key) DO UPDATE SET
           enabled = EXCLUDED.enabled,
           billing_model = EXCLUDED.billing_model,
           status = EXCLUDED.status,
           notes = EXCLUDED.notes,
           source = EXCLUDED.source,
           updated_at = EXCLUDED.updated_at",
    )
    .bind(tenant_id.as_uuid())
    .bind(module_key.as_str())
    .bind(state.enabled)
    .bind(state.billing_model.as_str())
    .bind(state.status.as_str())
    .bind(state.notes.as_str())
    .bind(state.source.as_str())
    .bind(state.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load every stored row. Rows that no longer decode are skipped with an
/// error log.
pub async fn load_all(
    pool: &PgPool,
) -> Result<Vec<(TenantId, ModuleKey, EntitlementState)>, sqlx::Error> {
    let rows = sqlx::query_as::<_, EntitlementRow>(
        "SELECT tenant_id, module_key, enabled, billing_model, status, notes, source, updated_at
         FROM module_entitlements ORDER BY tenant_id, module_key",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().filter_map(EntitlementRow::decode).collect())
}

#[derive(sqlx::FromRow)]
struct EntitlementRow {
    tenant_id: Uuid,
    module_key: String,
    enabled: bool,
    billing_model: String,
    status: String,
    notes: String,
    source: String,
    updated_at: DateTime<Utc>,
}

impl EntitlementRow {
    fn decode(self) -> Option<(TenantId, ModuleKey, EntitlementState)> {
        let tenant_id = TenantId::from_uuid(self.tenant_id);
        let decoded = (|| {
            Ok::<_, mops_core::ValidationError>((
                ModuleKey::new(self.module_key.as_str())?,
                EntitlementState {
                    enabled: self.enabled,
                    billing_model: self.billing_model.parse::<BillingModel>()?,
                    status: self.status.parse::<EntitlementStatus>()?,
                    notes: Notes::new(self.notes.as_str())?,
                    source: self.source.parse::<ChangeSource>()?,
                    updated_at: self.updated_at,
                },
            ))
        })();

        match decoded {
            Ok((module_key, state)) => Some((tenant_id, module_key, state)),
            Err(e) => {
                tracing::error!(
                    tenant_id = %tenant_id,
                    module_key = %self.module_key,
                    error = %e,
                    "undecodable entitlement row in database; skipping"
                );
                None
            }
        }
    }
}
