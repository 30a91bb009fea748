//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Search by SKU, name or barcode
//! - CRUD operations
//! - Stock deltas
//! - Delete that falls back to archiving
//!
//! ## Delete or Archive
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  delete_or_archive(id)                                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DELETE FROM products WHERE id = ?                                      │
//! │       │                                                                 │
//! │       ├── ok ──────────────────────────► DeleteOutcome::Deleted         │
//! │       │                                                                 │
//! │       └── FOREIGN KEY constraint failed                                 │
//! │           (sale_items / purchase_items reference it)                    │
//! │                │                                                        │
//! │                ▼                                                        │
//! │           UPDATE products SET is_active = 0 ──► DeleteOutcome::Archived │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::like_pattern;
use crate::repository::sale::apply_stock_movement;
use mostrador_core::checkout::StockMovement;
use mostrador_core::Product;

const PRODUCT_COLUMNS: &str = r#"
    id, organization_id, category_id, supplier_id, sku, barcode, name, description,
    price_cents, cost_cents, tax_rate_bps, track_inventory, allow_negative_stock,
    current_stock, is_active, created_at, updated_at
"#;

/// What `delete_or_archive` ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    /// Referenced by sales or purchases, so it was deactivated instead.
    Archived,
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
///
/// let results = repo.search(org, "yerba", 20).await?;
/// let product = repo.get_by_id("uuid-here").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Searches active products by SKU, name or barcode.
    ///
    /// An exact barcode or SKU match sorts first, then names alphabetically.
    /// An empty query lists active products.
    pub async fn search(&self, organization_id: &str, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = query.trim();

        debug!(query = %query, limit = %limit, "Searching products");

        if query.is_empty() {
            return self.list_active(organization_id, limit).await;
        }

        let pattern = like_pattern(query);
        let sql = format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE organization_id = ?1
              AND is_active = 1
              AND (sku LIKE ?2 ESCAPE '\' OR name LIKE ?2 ESCAPE '\' OR barcode LIKE ?2 ESCAPE '\')
            ORDER BY (barcode = ?3 OR sku = ?3) DESC, name
            LIMIT ?4
            "#
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(organization_id)
            .bind(&pattern)
            .bind(query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self, organization_id: &str, limit: u32) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE organization_id = ?1 AND is_active = 1 ORDER BY name LIMIT ?2"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(organization_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Loads several products at once (checkout stock checks).
    pub async fn get_many(&self, ids: &[String]) -> DbResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id IN ("));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let products = builder.build_query_as::<Product>().fetch_all(&self.pool).await?;
        Ok(products)
    }

    /// Gets a product by its SKU within an organization.
    pub async fn get_by_sku(&self, organization_id: &str, sku: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE organization_id = ?1 AND sku = ?2");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(organization_id)
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, organization_id, category_id, supplier_id, sku, barcode, name, description,
                price_cents, cost_cents, tax_rate_bps, track_inventory, allow_negative_stock,
                current_stock, is_active, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8,
                ?9, ?10, ?11, ?12, ?13,
                ?14, ?15, ?16, ?17
            )
            "#,
        )
        .bind(&product.id)
        .bind(&product.organization_id)
        .bind(&product.category_id)
        .bind(&product.supplier_id)
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.tax_rate_bps)
        .bind(product.track_inventory)
        .bind(product.allow_negative_stock)
        .bind(product.current_stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: product.sku.clone(),
            },
            other => other,
        })?;

        Ok(product.clone())
    }

    /// Updates an existing product. Stock is changed through [`Self::update_stock`].
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                category_id = ?2,
                supplier_id = ?3,
                sku = ?4,
                barcode = ?5,
                name = ?6,
                description = ?7,
                price_cents = ?8,
                cost_cents = ?9,
                tax_rate_bps = ?10,
                track_inventory = ?11,
                allow_negative_stock = ?12,
                is_active = ?13,
                updated_at = ?14
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.category_id)
        .bind(&product.supplier_id)
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.tax_rate_bps)
        .bind(product.track_inventory)
        .bind(product.allow_negative_stock)
        .bind(product.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        Ok(())
    }

    /// Applies a stock delta (negative for sales, positive for restocking).
    ///
    /// Deltas instead of absolute values, so two terminals selling at once
    /// both land. The same guarded update as checkout: a decrease that would
    /// leave a product below zero without `allow_negative_stock` is refused
    /// with `Conflict`, whatever was read before.
    pub async fn update_stock(&self, id: &str, delta: i64) -> DbResult<()> {
        debug!(id = %id, delta = %delta, "Updating stock");

        let mut conn = self.pool.acquire().await?;
        let movement = StockMovement {
            product_id: id.to_string(),
            delta,
        };
        match apply_stock_movement(&mut conn, &movement, Utc::now()).await {
            Err(DbError::Conflict(_)) if self.get_by_id(id).await?.is_none() => {
                Err(DbError::not_found("Product", id))
            }
            other => other,
        }
    }

    /// Soft-deletes a product by setting is_active = false.
    pub async fn archive(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Archiving product");

        let result = sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Deletes a product, or archives it when history still references it.
    pub async fn delete_or_archive(&self, id: &str) -> DbResult<DeleteOutcome> {
        let deleted = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError::from);

        match deleted {
            Ok(result) if result.rows_affected() == 0 => Err(DbError::not_found("Product", id)),
            Ok(_) => {
                info!(id = %id, "Product deleted");
                Ok(DeleteOutcome::Deleted)
            }
            Err(err) if err.is_foreign_key_violation() => {
                self.archive(id).await?;
                info!(id = %id, "Product is referenced, archived instead of deleted");
                Ok(DeleteOutcome::Archived)
            }
            Err(err) => Err(err),
        }
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self, organization_id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE organization_id = ?1 AND is_active = 1")
                .bind(organization_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{product, test_db};
    use mostrador_core::DEFAULT_ORGANIZATION_ID;

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = test_db().await;
        let p = product("YERBA-1KG", 450_000, Some(10));
        db.products().insert(&p).await.unwrap();

        let found = db.products().get_by_id(&p.id).await.unwrap().unwrap();
        assert_eq!(found.sku, "YERBA-1KG");
        assert_eq!(found.tax_rate_bps, 2100);
        assert_eq!(found.current_stock, Some(10));

        let by_sku = db
            .products()
            .get_by_sku(DEFAULT_ORGANIZATION_ID, "YERBA-1KG")
            .await
            .unwrap();
        assert!(by_sku.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = test_db().await;
        db.products().insert(&product("DUP", 100, None)).await.unwrap();

        let err = db.products().insert(&product("DUP", 200, None)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref value, .. } if value == "DUP"));
    }

    #[tokio::test]
    async fn test_search_matches_sku_name_and_barcode() {
        let db = test_db().await;
        let mut yerba = product("YERBA-1KG", 450_000, None);
        yerba.name = "Yerba mate Playadito 1kg".to_string();
        yerba.barcode = Some("7790387000011".to_string());
        db.products().insert(&yerba).await.unwrap();

        let mut cafe = product("CAFE-250", 300_000, None);
        cafe.name = "Café molido 250g".to_string();
        db.products().insert(&cafe).await.unwrap();

        let repo = db.products();
        assert_eq!(repo.search(DEFAULT_ORGANIZATION_ID, "playadito", 20).await.unwrap().len(), 1);
        assert_eq!(repo.search(DEFAULT_ORGANIZATION_ID, "7790387", 20).await.unwrap().len(), 1);
        assert_eq!(repo.search(DEFAULT_ORGANIZATION_ID, "CAFE", 20).await.unwrap().len(), 1);
        assert_eq!(repo.search(DEFAULT_ORGANIZATION_ID, "", 20).await.unwrap().len(), 2);
        assert!(repo.search(DEFAULT_ORGANIZATION_ID, "%", 20).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_stock_delta() {
        let db = test_db().await;
        let p = product("STOCK", 100, Some(5));
        db.products().insert(&p).await.unwrap();

        db.products().update_stock(&p.id, -2).await.unwrap();
        db.products().update_stock(&p.id, 10).await.unwrap();

        let found = db.products().get_by_id(&p.id).await.unwrap().unwrap();
        assert_eq!(found.current_stock, Some(13));
        assert!(matches!(
            db.products().update_stock("missing", 1).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_stock_refuses_to_go_negative() {
        let db = test_db().await;
        let p = product("ULTIMO", 100, Some(2));
        db.products().insert(&p).await.unwrap();

        let err = db.products().update_stock(&p.id, -3).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));

        let found = db.products().get_by_id(&p.id).await.unwrap().unwrap();
        assert_eq!(found.current_stock, Some(2));
    }

    #[tokio::test]
    async fn test_get_many() {
        let db = test_db().await;
        let a = product("A", 100, None);
        let b = product("B", 100, None);
        db.products().insert(&a).await.unwrap();
        db.products().insert(&b).await.unwrap();

        let found = db.products().get_many(&[a.id.clone(), b.id.clone()]).await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(db.products().get_many(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_unreferenced_product() {
        let db = test_db().await;
        let p = product("FREE", 100, None);
        db.products().insert(&p).await.unwrap();

        let outcome = db.products().delete_or_archive(&p.id).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Deleted);
        assert!(db.products().get_by_id(&p.id).await.unwrap().is_none());
        assert!(db.products().delete_or_archive(&p.id).await.is_err());
    }
}
