//! Schema migrations compiled into the binary from `migrations/sqlite/`.
//!
//! Files are applied in name order (`001_initial_schema.sql`, `002_...`).
//! An applied file is checksummed by sqlx, so edits go into a new file.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    debug!(embedded = MIGRATOR.migrations.len(), "Applying schema migrations");
    MIGRATOR.run(pool).await?;
    info!("Schema is up to date");
    Ok(())
}

/// `(embedded, applied)`; `applied` is 0 before the first run.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let applied: Option<i64> =
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await
            .ok();

    Ok((MIGRATOR.migrations.len(), applied.unwrap_or(0) as usize))
}
