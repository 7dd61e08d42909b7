//! Database migration utilities

use crate::{Error, Result};
use sqlx::SqlitePool;
use tracing::info;

/// Apply the embedded migrations to `pool`
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| Error::Migration(e.to_string()))?;

    info!("Database migrations completed successfully");
    Ok(())
}

/// Migration utilities and helpers
pub struct Migrations;

impl Migrations {
    /// Latest applied migration version, if any
    pub async fn current_version(pool: &SqlitePool) -> Result<Option<i64>> {
        let table_exists: Option<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
        )
        .fetch_optional(pool)
        .await?;

        if table_exists.is_none() {
            return Ok(None);
        }

        let version: Option<(i64,)> = sqlx::query_as(
            "SELECT version FROM _sqlx_migrations WHERE success = 1 ORDER BY version DESC LIMIT 1",
        )
        .fetch_optional(pool)
        .await?;

        Ok(version.map(|(v,)| v))
    }

    /// Whether the embedded migrations include versions not applied yet
    pub async fn needs_migration(pool: &SqlitePool) -> Result<bool> {
        let latest = sqlx::migrate!("./migrations")
            .iter()
            .map(|m| m.version)
            .max();
        let current = Self::current_version(pool).await?;
        Ok(match (latest, current) {
            (Some(latest), Some(current)) => latest > current,
            (Some(_), None) => true,
            (None, _) => false,
        })
    }
}
