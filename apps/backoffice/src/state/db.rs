//! # Database State
//!
//! Wraps the `Database` handle shared by every command.
//!
//! ## Thread Safety
//! The `Database` struct from `mostrador-db` contains a `SqlitePool` which
//! is inherently thread-safe. Multiple commands can execute queries
//! concurrently without explicit locking. Multi-statement writes (checkout,
//! purchases, supplier payments) run in their own transaction inside the
//! repositories.
//!
//! ## Usage in Commands
//! ```rust,ignore
//! pub async fn search_products(
//!     db: &DbState,
//!     config: &ConfigState,
//!     query: &str,
//!     limit: Option<u32>,
//! ) -> Result<Vec<ProductDto>, ApiError> {
//!     let products = db.inner().products().search(&config.organization_id, query, 20).await?;
//!     Ok(products.into_iter().map(ProductDto::from).collect())
//! }
//! ```

use mostrador_db::Database;

/// Wrapper around `Database` so commands declare the state they need.
#[derive(Debug, Clone)]
pub struct DbState {
    db: Database,
}

impl DbState {
    /// Creates a new DbState wrapping the database connection.
    pub fn new(db: Database) -> Self {
        DbState { db }
    }

    /// Returns a reference to the inner Database.
    pub fn inner(&self) -> &Database {
        &self.db
    }
}
