//! # Sale Repository
//!
//! Persists checkouts and cancellations.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. CHECKOUT (one transaction)                                          │
//! │     └── record_checkout(plan)                                           │
//! │         ├── voucher_sequences: last_number + 1  → voucher number        │
//! │         ├── INSERT sales, sale_items, payments                          │
//! │         └── products.current_stock += delta (guarded)                   │
//! │                                                                         │
//! │  2. (OPTIONAL) CANCEL (one transaction)                                 │
//! │     └── cancel(plan)                                                    │
//! │         ├── status completed → cancelled                                │
//! │         ├── credit note number for fiscal vouchers                      │
//! │         └── stock returned                                              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any failure rolls the whole transaction back, so a sale never exists
//! without its items, payments and stock movements.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use mostrador_core::checkout::{CancellationPlan, CheckoutPlan, StockMovement};
use mostrador_core::fiscal::{VoucherType, MAX_VOUCHER_NUMBER};
use mostrador_core::{Payment, Sale, SaleItem, SaleStatus};

const SALE_COLUMNS: &str = r#"
    id, organization_id, point_of_sale_id, customer_id, voucher_type,
    point_of_sale_number, voucher_number, status, subtotal_cents,
    item_discount_cents, global_discount_cents, tax_cents, total_cents,
    user_id, device_id, notes, created_at, cancelled_at, credit_note_number
"#;

const ITEM_COLUMNS: &str = r#"
    id, sale_id, product_id, sku_snapshot, name_snapshot, unit_price_cents,
    quantity, subtotal_cents, discount_cents, global_discount_cents,
    tax_rate_bps, tax_cents, total_cents, created_at
"#;

// =============================================================================
// Shared transaction steps
// =============================================================================

fn numbering_exhausted(voucher_type: VoucherType) -> DbError {
    DbError::Conflict(format!(
        "{} numbering reached {} at this point of sale",
        voucher_type.label(),
        MAX_VOUCHER_NUMBER
    ))
}

/// Reserves the next number for a terminal and voucher type.
///
/// Runs on the caller's transaction so the number is released if the
/// transaction rolls back. Past `MAX_VOUCHER_NUMBER` the upsert matches no
/// row and the reservation fails with `DbError::Conflict`.
pub(crate) async fn reserve_voucher_number(
    conn: &mut SqliteConnection,
    point_of_sale_id: &str,
    voucher_type: VoucherType,
) -> DbResult<i64> {
    let number: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO voucher_sequences (point_of_sale_id, voucher_type, last_number)
        VALUES (?1, ?2, 1)
        ON CONFLICT (point_of_sale_id, voucher_type)
        DO UPDATE SET last_number = last_number + 1
        WHERE last_number < ?3
        RETURNING last_number
        "#,
    )
    .bind(point_of_sale_id)
    .bind(voucher_type)
    .bind(MAX_VOUCHER_NUMBER)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| numbering_exhausted(voucher_type))?;

    debug!(point_of_sale_id = %point_of_sale_id, voucher_type = %voucher_type, number, "Reserved voucher number");
    Ok(number)
}

/// Applies a stock delta inside a transaction.
///
/// A decrement that would leave stock below zero on a product that does
/// not allow negative stock matches no row and becomes `DbError::Conflict`.
pub(crate) async fn apply_stock_movement(
    conn: &mut SqliteConnection,
    movement: &StockMovement,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET current_stock = COALESCE(current_stock, 0) + ?2,
            updated_at = ?3
        WHERE id = ?1
          AND (?2 >= 0 OR allow_negative_stock = 1 OR COALESCE(current_stock, 0) + ?2 >= 0)
        "#,
    )
    .bind(&movement.product_id)
    .bind(movement.delta)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::Conflict(format!(
            "stock for product {} cannot change by {}",
            movement.product_id, movement.delta
        )));
    }
    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Records a checkout atomically and returns the plan with its voucher
    /// number assigned.
    pub async fn record_checkout(&self, mut plan: CheckoutPlan) -> DbResult<CheckoutPlan> {
        let mut tx = self.pool.begin().await?;

        let number = reserve_voucher_number(&mut tx, &plan.sale.point_of_sale_id, plan.sale.voucher_type).await?;
        plan.assign_voucher_number(number);

        let sale = &plan.sale;
        sqlx::query(
            r#"
            INSERT INTO sales (
                id, organization_id, point_of_sale_id, customer_id, voucher_type,
                point_of_sale_number, voucher_number, status, subtotal_cents,
                item_discount_cents, global_discount_cents, tax_cents, total_cents,
                user_id, device_id, notes, created_at, cancelled_at, credit_note_number
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.organization_id)
        .bind(&sale.point_of_sale_id)
        .bind(&sale.customer_id)
        .bind(sale.voucher_type)
        .bind(sale.point_of_sale_number)
        .bind(sale.voucher_number)
        .bind(sale.status)
        .bind(sale.subtotal_cents)
        .bind(sale.item_discount_cents)
        .bind(sale.global_discount_cents)
        .bind(sale.tax_cents)
        .bind(sale.total_cents)
        .bind(&sale.user_id)
        .bind(&sale.device_id)
        .bind(&sale.notes)
        .bind(sale.created_at)
        .bind(sale.cancelled_at)
        .bind(sale.credit_note_number)
        .execute(&mut *tx)
        .await?;

        for item in &plan.items {
            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    id, sale_id, product_id, sku_snapshot, name_snapshot, unit_price_cents,
                    quantity, subtotal_cents, discount_cents, global_discount_cents,
                    tax_rate_bps, tax_cents, total_cents, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                "#,
            )
            .bind(&item.id)
            .bind(&item.sale_id)
            .bind(&item.product_id)
            .bind(&item.sku_snapshot)
            .bind(&item.name_snapshot)
            .bind(item.unit_price_cents)
            .bind(item.quantity)
            .bind(item.subtotal_cents)
            .bind(item.discount_cents)
            .bind(item.global_discount_cents)
            .bind(item.tax_rate_bps)
            .bind(item.tax_cents)
            .bind(item.total_cents)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
        }

        for payment in &plan.payments {
            sqlx::query(
                r#"
                INSERT INTO payments (
                    id, sale_id, method, amount_cents, tendered_cents, change_cents, reference, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&payment.id)
            .bind(&payment.sale_id)
            .bind(payment.method)
            .bind(payment.amount_cents)
            .bind(payment.tendered_cents)
            .bind(payment.change_cents)
            .bind(&payment.reference)
            .bind(payment.created_at)
            .execute(&mut *tx)
            .await?;
        }

        for movement in &plan.stock_movements {
            apply_stock_movement(&mut tx, movement, plan.sale.created_at).await?;
        }

        tx.commit().await?;

        info!(
            sale_id = %plan.sale.id,
            voucher = %plan.sale.voucher(),
            voucher_type = %plan.sale.voucher_type,
            total_cents = plan.sale.total_cents,
            "Sale recorded"
        );

        Ok(plan)
    }

    /// Cancels a completed sale atomically.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - No such sale
    /// * `Err(DbError::Conflict)` - The sale is no longer completed
    pub async fn cancel(&self, plan: &CancellationPlan) -> DbResult<Sale> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let point_of_sale_id: Option<String> =
            sqlx::query_scalar("SELECT point_of_sale_id FROM sales WHERE id = ?1")
                .bind(&plan.sale_id)
                .fetch_optional(&mut *tx)
                .await?;
        let point_of_sale_id = point_of_sale_id.ok_or_else(|| DbError::not_found("Sale", &plan.sale_id))?;

        let updated = sqlx::query(
            "UPDATE sales SET status = ?2, cancelled_at = ?3 WHERE id = ?1 AND status = ?4",
        )
        .bind(&plan.sale_id)
        .bind(SaleStatus::Cancelled)
        .bind(now)
        .bind(SaleStatus::Completed)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(DbError::Conflict(format!("sale {} is already cancelled", plan.sale_id)));
        }

        if let Some(credit_note) = plan.credit_note {
            let number = reserve_voucher_number(&mut tx, &point_of_sale_id, credit_note).await?;
            sqlx::query("UPDATE sales SET credit_note_number = ?2 WHERE id = ?1")
                .bind(&plan.sale_id)
                .bind(number)
                .execute(&mut *tx)
                .await?;
        }

        for movement in &plan.stock_movements {
            apply_stock_movement(&mut tx, movement, now).await?;
        }

        tx.commit().await?;

        info!(sale_id = %plan.sale_id, credit_note = ?plan.credit_note, "Sale cancelled");

        self.get_by_id(&plan.sale_id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", &plan.sale_id))
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1");
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(sale)
    }

    /// Finds a sale by its printed voucher.
    pub async fn find_by_voucher(
        &self,
        point_of_sale_id: &str,
        voucher_type: VoucherType,
        voucher_number: i64,
    ) -> DbResult<Option<Sale>> {
        let sql = format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE point_of_sale_id = ?1 AND voucher_type = ?2 AND voucher_number = ?3"
        );
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(point_of_sale_id)
            .bind(voucher_type)
            .bind(voucher_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(sale)
    }

    /// Most recent sales first.
    pub async fn list_recent(&self, organization_id: &str, limit: u32) -> DbResult<Vec<Sale>> {
        let sql = format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE organization_id = ?1 ORDER BY created_at DESC LIMIT ?2"
        );
        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(organization_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(sales)
    }

    /// Gets all items of a sale, in insertion order.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM sale_items WHERE sale_id = ?1 ORDER BY rowid");
        let items = sqlx::query_as::<_, SaleItem>(&sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }

    /// Gets all payments of a sale, in the order they were entered.
    pub async fn get_payments(&self, sale_id: &str) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, sale_id, method, amount_cents, tendered_cents, change_cents, reference, created_at
            FROM payments
            WHERE sale_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Number the next voucher of this type would get (shown before checkout).
    pub async fn peek_next_number(&self, point_of_sale_id: &str, voucher_type: VoucherType) -> DbResult<i64> {
        let last: Option<i64> = sqlx::query_scalar(
            "SELECT last_number FROM voucher_sequences WHERE point_of_sale_id = ?1 AND voucher_type = ?2",
        )
        .bind(point_of_sale_id)
        .bind(voucher_type)
        .fetch_optional(&self.pool)
        .await?;

        match last.unwrap_or(0) {
            n if n >= MAX_VOUCHER_NUMBER => Err(numbering_exhausted(voucher_type)),
            n => Ok(n + 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{fiscal_setup, product, test_db};
    use crate::Database;
    use mostrador_core::cart::Cart;
    use mostrador_core::checkout::{build_checkout, plan_cancellation, CheckoutContext};
    use mostrador_core::fiscal::FiscalConfig;
    use mostrador_core::split::PaymentInput;
    use mostrador_core::{Money, PaymentMethod, PointOfSale, Product, DEFAULT_ORGANIZATION_ID};

    fn cash(cents: i64) -> PaymentInput {
        PaymentInput {
            method: PaymentMethod::Cash,
            amount: Money::from_cents(cents),
            reference: None,
        }
    }

    async fn checkout(
        db: &Database,
        config: &FiscalConfig,
        pos: &PointOfSale,
        product: &Product,
        quantity: i64,
    ) -> DbResult<CheckoutPlan> {
        let mut cart = Cart::new();
        cart.add_item(product, quantity).unwrap();
        let total = cart.totals(&config.pricing_policy()).total.cents();

        let ctx = CheckoutContext {
            fiscal: config,
            point_of_sale: pos,
            customer: None,
            user_id: "cajero",
            device_id: "caja-1",
            now: Utc::now(),
        };
        let current = db.products().get_many(&[product.id.clone()]).await.unwrap();
        let plan = build_checkout(&cart, &[cash(total)], &ctx, &current).unwrap();
        db.sales().record_checkout(plan).await
    }

    #[tokio::test]
    async fn test_checkout_numbers_sequentially_and_moves_stock() {
        let db = test_db().await;
        let (config, pos) = fiscal_setup(&db).await;
        let yerba = product("YERBA-1KG", 450_000, Some(10));
        db.products().insert(&yerba).await.unwrap();

        assert_eq!(db.sales().peek_next_number(&pos.id, VoucherType::FacturaB).await.unwrap(), 1);

        let first = checkout(&db, &config, &pos, &yerba, 2).await.unwrap();
        let second = checkout(&db, &config, &pos, &yerba, 1).await.unwrap();

        assert_eq!(first.sale.voucher_number, 1);
        assert_eq!(second.sale.voucher_number, 2);
        assert_eq!(second.sale.voucher().to_string(), "00003-00000002");
        assert_eq!(db.sales().peek_next_number(&pos.id, VoucherType::FacturaB).await.unwrap(), 3);

        let stock = db.products().get_by_id(&yerba.id).await.unwrap().unwrap().current_stock;
        assert_eq!(stock, Some(7));

        let stored = db.sales().get_by_id(&first.sale.id).await.unwrap().unwrap();
        assert_eq!(stored.total_cents, 900_000);
        assert_eq!(db.sales().get_items(&stored.id).await.unwrap().len(), 1);
        assert_eq!(db.sales().get_payments(&stored.id).await.unwrap().len(), 1);

        let found = db
            .sales()
            .find_by_voucher(&pos.id, VoucherType::FacturaB, 2)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, second.sale.id);
        assert_eq!(db.sales().list_recent(DEFAULT_ORGANIZATION_ID, 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_checkout_rolls_back_when_stock_moved() {
        let db = test_db().await;
        let (config, pos) = fiscal_setup(&db).await;
        let p = product("LAST-ONE", 1_000, Some(1));
        db.products().insert(&p).await.unwrap();

        // Build against a snapshot, then sell the unit elsewhere before recording.
        let mut cart = Cart::new();
        cart.add_item(&p, 1).unwrap();
        let ctx = CheckoutContext {
            fiscal: &config,
            point_of_sale: &pos,
            customer: None,
            user_id: "cajero",
            device_id: "caja-1",
            now: Utc::now(),
        };
        let plan = build_checkout(&cart, &[cash(1_000)], &ctx, &[p.clone()]).unwrap();
        db.products().update_stock(&p.id, -1).await.unwrap();

        let err = db.sales().record_checkout(plan).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));

        // Nothing landed: no sale, no consumed number.
        assert!(db.sales().list_recent(DEFAULT_ORGANIZATION_ID, 10).await.unwrap().is_empty());
        assert_eq!(db.sales().peek_next_number(&pos.id, VoucherType::FacturaB).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cancel_returns_stock_and_issues_credit_note() {
        let db = test_db().await;
        let (config, pos) = fiscal_setup(&db).await;
        let p = product("CAFE-250", 300_000, Some(5));
        db.products().insert(&p).await.unwrap();

        let plan = checkout(&db, &config, &pos, &p, 2).await.unwrap();
        let items = db.sales().get_items(&plan.sale.id).await.unwrap();
        let cancellation = plan_cancellation(&plan.sale, &items, &[p.id.clone()]).unwrap();

        let cancelled = db.sales().cancel(&cancellation).await.unwrap();
        assert_eq!(cancelled.status, SaleStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());
        assert_eq!(cancelled.credit_note_number, Some(1));

        let stock = db.products().get_by_id(&p.id).await.unwrap().unwrap().current_stock;
        assert_eq!(stock, Some(5));

        let again = db.sales().cancel(&cancellation).await.unwrap_err();
        assert!(matches!(again, DbError::Conflict(_)));
        assert!(matches!(
            db.sales().cancel(&CancellationPlan { sale_id: "missing".to_string(), ..cancellation }).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_sold_product_is_archived_not_deleted() {
        let db = test_db().await;
        let (config, pos) = fiscal_setup(&db).await;
        let p = product("SOLD", 1_000, None);
        db.products().insert(&p).await.unwrap();
        checkout(&db, &config, &pos, &p, 1).await.unwrap();

        let outcome = db.products().delete_or_archive(&p.id).await.unwrap();
        assert_eq!(outcome, crate::DeleteOutcome::Archived);
        let archived = db.products().get_by_id(&p.id).await.unwrap().unwrap();
        assert!(!archived.is_active);
    }

    #[tokio::test]
    async fn test_numbering_stops_at_last_voucher_number() {
        let db = test_db().await;
        let (config, pos) = fiscal_setup(&db).await;
        let p = product("ALFAJOR", 80_000, Some(10));
        db.products().insert(&p).await.unwrap();

        sqlx::query("INSERT INTO voucher_sequences (point_of_sale_id, voucher_type, last_number) VALUES (?1, ?2, ?3)")
            .bind(&pos.id)
            .bind(VoucherType::FacturaB)
            .bind(MAX_VOUCHER_NUMBER - 1)
            .execute(db.pool())
            .await
            .unwrap();

        let last = checkout(&db, &config, &pos, &p, 1).await.unwrap();
        assert_eq!(last.sale.voucher().to_string(), "00003-99999999");

        assert!(matches!(
            db.sales().peek_next_number(&pos.id, VoucherType::FacturaB).await,
            Err(DbError::Conflict(_))
        ));
        let err = checkout(&db, &config, &pos, &p, 1).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));

        // The failed sale left nothing behind
        assert_eq!(db.sales().list_recent(DEFAULT_ORGANIZATION_ID, 10).await.unwrap().len(), 1);
        let stock = db.products().get_by_id(&p.id).await.unwrap().unwrap().current_stock;
        assert_eq!(stock, Some(9));
    }
}
