//! Embedded schema migrations for the `users` and `sessions` tables.

use sqlx::PgPool;
use sqlx::migrate::Migrator;
use tracing::info;

use tokenward_core::error::{AppError, ErrorKind};
use tokenward_core::result::AppResult;

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// An embedded migration, as shown to operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationInfo {
    /// Version number taken from the file name.
    pub version: i64,
    /// Human-readable description.
    pub description: String,
}

/// Apply all pending migrations.
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    info!(
        embedded = MIGRATOR.iter().count(),
        "Running database migrations"
    );

    MIGRATOR.run(pool).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Database,
            format!("Failed to run migrations: {e}"),
            e,
        )
    })?;

    info!("Database migrations completed successfully");
    Ok(())
}

/// List the migrations compiled into this binary.
pub fn embedded_migrations() -> Vec<MigrationInfo> {
    MIGRATOR
        .iter()
        .map(|m| MigrationInfo {
            version: m.version,
            description: m.description.to_string(),
        })
        .collect()
}

/// Versions recorded as successfully applied in the target database.
///
/// A database that has never been migrated reports no versions.
pub async fn applied_versions(pool: &PgPool) -> AppResult<Vec<i64>> {
    let table_exists: bool =
        sqlx::query_scalar("SELECT to_regclass('_sqlx_migrations') IS NOT NULL")
            .fetch_one(pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to inspect migrations", e)
            })?;
    if !table_exists {
        return Ok(Vec::new());
    }

    sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success ORDER BY version")
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list migrations", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_users_created_before_sessions() {
        let migrations = embedded_migrations();
        assert_eq!(migrations.len(), 2);
        assert!(migrations[0].version < migrations[1].version);
        assert!(migrations[0].description.contains("users"));
        assert!(migrations[1].description.contains("sessions"));
    }
}
