//! # Store Database Handle
//!
//! One SQLite file per store. Every back-office command borrows the same
//! [`Database`] and asks it for the repository it needs; checkout and
//! purchase registration open their own transactions from the shared pool.
//!
//! Connections run in WAL mode with foreign keys on, and wait on a busy
//! lock instead of failing when two cashiers check out at the same time.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::category::CategoryRepository;
use crate::repository::fiscal::FiscalRepository;
use crate::repository::party::{CustomerRepository, SupplierRepository};
use crate::repository::product::ProductRepository;
use crate::repository::purchase::PurchaseRepository;
use crate::repository::sale::SaleRepository;

/// How long a writer waits for another checkout's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the store's data lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbConfig {
    /// The store file, created on first start.
    File(PathBuf),
    /// A private database that disappears with the pool. Used by tests.
    Memory,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig::File(path.into())
    }

    pub fn in_memory() -> Self {
        DbConfig::Memory
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        let options = match self {
            DbConfig::File(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal),
            // WAL is not available for in-memory databases
            DbConfig::Memory => SqliteConnectOptions::new().in_memory(true),
        };

        options
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT)
    }

    /// A single store rarely has more than a handful of tills open.
    /// An in-memory database exists per connection, so it gets exactly one.
    fn max_connections(&self) -> u32 {
        match self {
            DbConfig::File(_) => 5,
            DbConfig::Memory => 1,
        }
    }
}

/// Shared handle to the store database.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the store database and brings its schema up to date.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        match &config {
            DbConfig::File(path) => info!(path = %path.display(), "Opening store database"),
            DbConfig::Memory => info!("Opening in-memory store database"),
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections())
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            // an idle in-memory connection must never be reaped with its data
            .idle_timeout(match config {
                DbConfig::File(_) => Some(Duration::from_secs(600)),
                DbConfig::Memory => None,
            })
            .connect_with(config.connect_options())
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        let db = Database { pool };
        migrations::run_migrations(&db.pool).await?;
        Ok(db)
    }

    /// Raw pool access for queries that span repositories.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    pub fn categories(&self) -> CategoryRepository {
        CategoryRepository::new(self.pool.clone())
    }

    pub fn suppliers(&self) -> SupplierRepository {
        SupplierRepository::new(self.pool.clone())
    }

    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.pool.clone())
    }

    /// Checkout, cancellation and voucher lookups.
    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone())
    }

    /// Supplier vouchers, payments and credit-note netting.
    pub fn purchases(&self) -> PurchaseRepository {
        PurchaseRepository::new(self.pool.clone())
    }

    /// Issuer configuration, locations and points of sale.
    pub fn fiscal(&self) -> FiscalRepository {
        FiscalRepository::new(self.pool.clone())
    }

    pub async fn close(&self) {
        info!("Closing store database");
        self.pool.close().await;
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_store_is_migrated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        assert!(db.health_check().await);
        assert_eq!(migrations::pending_migrations(db.pool()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_file_is_created_and_reopened() {
        let dir = std::env::temp_dir().join(format!("mostrador-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("store.db");

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        db.close().await;
        assert!(path.exists());

        // second open finds the schema already applied
        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        assert_eq!(migrations::pending_migrations(db.pool()).await.unwrap(), 0);
        db.close().await;

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_memory_store_uses_one_connection() {
        assert_eq!(DbConfig::in_memory().max_connections(), 1);
        assert_eq!(DbConfig::new("/tmp/store.db").max_connections(), 5);
    }
}
