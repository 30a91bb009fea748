//! Schema migrations for the store database.
//!
//! The SQL under `migrations/sqlite/` is compiled into the binary, so a till
//! upgraded to a new release migrates its own file on the next start. A file
//! already migrated by a newer release is refused rather than opened with a
//! schema this build does not know.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies every migration the store file has not seen yet.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    let known = latest_known_version();
    if let Some(applied) = applied_version(pool).await? {
        if applied > known {
            return Err(DbError::MigrationFailed(format!(
                "store database is at schema {applied}, this build only knows up to {known}"
            )));
        }
    }

    MIGRATOR.run(pool).await?;
    info!(schema = known, "Store schema up to date");
    Ok(())
}

/// Number of embedded migrations not yet applied to this store.
pub async fn pending_migrations(pool: &SqlitePool) -> DbResult<usize> {
    let applied: Vec<i64> = match sqlx::query_scalar(
        "SELECT version FROM _sqlx_migrations WHERE success = 1",
    )
    .fetch_all(pool)
    .await
    {
        Ok(versions) => versions,
        // no bookkeeping table yet: nothing has run
        Err(_) => Vec::new(),
    };

    Ok(MIGRATOR
        .iter()
        .filter(|m| !applied.contains(&m.version))
        .count())
}

fn latest_known_version() -> i64 {
    MIGRATOR.iter().map(|m| m.version).max().unwrap_or(0)
}

async fn applied_version(pool: &SqlitePool) -> DbResult<Option<i64>> {
    let table: Option<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_optional(pool)
    .await?;

    if table.is_none() {
        return Ok(None);
    }

    let version: Option<i64> =
        sqlx::query_scalar("SELECT MAX(version) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        run_migrations(db.pool()).await.unwrap();
        assert_eq!(pending_migrations(db.pool()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_from_newer_release_is_refused() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        sqlx::query(
            "INSERT INTO _sqlx_migrations (version, description, installed_on, success, checksum, execution_time)
             VALUES (9999, 'future', CURRENT_TIMESTAMP, 1, X'00', 0)",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let err = run_migrations(db.pool()).await.unwrap_err();
        assert!(matches!(err, DbError::MigrationFailed(_)));
    }
}
