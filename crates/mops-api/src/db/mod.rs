//! # Database Persistence Layer
//!
//! Optional Postgres persistence via SQLx. When `DATABASE_URL` is set,
//! accepted entitlement writes are upserted and audit events appended
//! write-through, and the in-memory stores are hydrated on startup. When
//! absent, the service runs in-memory only.

pub mod audit;
pub mod entitlements;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Connect to Postgres and run the embedded migrations.
///
/// Returns `None` when no URL is configured (in-memory-only mode).
pub async fn init_pool(database_url: Option<&str>) -> Result<Option<PgPool>, sqlx::Error> {
    let Some(url) = database_url else {
        tracing::warn!(
            "DATABASE_URL not set, running in-memory only mode; \
             Entitlements will not survive restarts."
        );
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}
