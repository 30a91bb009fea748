//! # Purchase Repository
//!
//! Supplier vouchers, purchase orders and supplier payments.
//!
//! ## Registration
//! ```text
//! register_purchase command
//!       │
//!       ├── find_duplicate(key) ──► Some ──► rejected
//!       │
//!       ▼
//! record_purchase(plan)            (one transaction)
//!       ├── INSERT purchases, purchase_items
//!       ├── products.current_stock += delta
//!       ├── products.cost_cents = last unit cost
//!       ├── purchase_orders.status = 'invoiced'
//!       └── credit notes netted against open invoices (credit_applications)
//! ```
//!
//! The UNIQUE index on `(organization, supplier, type, point of sale,
//! number)` catches the duplicate that slips between the check and the
//! insert.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::sale::apply_stock_movement;
use mostrador_core::fiscal::VoucherNumber;
use mostrador_core::purchase::{
    net_credit_notes, DuplicateKey, PurchasePaymentUpdate, PurchasePlan, SupplierPaymentPlan,
};
use mostrador_core::{
    CreditApplication, PaymentAllocation, Purchase, PurchaseItem, PurchaseOrder, PurchaseOrderStatus, PurchaseStatus,
    SupplierPayment,
};

const PURCHASE_COLUMNS: &str = r#"
    id, organization_id, supplier_id, purchase_order_id, voucher_type,
    point_of_sale_number, voucher_number, issue_date, net_cents, tax_cents,
    perceptions_cents, total_cents, paid_cents, status, notes, created_at
"#;

/// Writes a new paid amount and status; cancelled purchases are refused.
async fn apply_purchase_update(conn: &mut SqliteConnection, update: &PurchasePaymentUpdate) -> DbResult<()> {
    let result = sqlx::query("UPDATE purchases SET paid_cents = ?2, status = ?3 WHERE id = ?1 AND status != ?4")
        .bind(&update.purchase_id)
        .bind(update.paid_cents)
        .bind(update.status)
        .bind(PurchaseStatus::Cancelled)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::Conflict(format!(
            "purchase {} cannot take payments",
            update.purchase_id
        )));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PurchaseRepository {
    pool: SqlitePool,
}

impl PurchaseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseRepository { pool }
    }

    /// Looks up a purchase with the same supplier voucher.
    pub async fn find_duplicate(&self, organization_id: &str, key: &DuplicateKey) -> DbResult<Option<Purchase>> {
        let sql = format!(
            r#"
            SELECT {PURCHASE_COLUMNS}
            FROM purchases
            WHERE organization_id = ?1
              AND supplier_id = ?2
              AND voucher_type = ?3
              AND point_of_sale_number = ?4
              AND voucher_number = ?5
            "#
        );
        let purchase = sqlx::query_as::<_, Purchase>(&sql)
            .bind(organization_id)
            .bind(&key.supplier_id)
            .bind(key.voucher_type)
            .bind(key.point_of_sale_number)
            .bind(key.voucher_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(purchase)
    }

    /// Registers a supplier voucher atomically.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - The voucher was already registered
    /// * `Err(DbError::Conflict)` - A credit note would take stock below zero
    pub async fn record_purchase(&self, plan: &PurchasePlan) -> DbResult<Purchase> {
        let purchase = &plan.purchase;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO purchases (
                id, organization_id, supplier_id, purchase_order_id, voucher_type,
                point_of_sale_number, voucher_number, issue_date, net_cents, tax_cents,
                perceptions_cents, total_cents, paid_cents, status, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
        )
        .bind(&purchase.id)
        .bind(&purchase.organization_id)
        .bind(&purchase.supplier_id)
        .bind(&purchase.purchase_order_id)
        .bind(purchase.voucher_type)
        .bind(purchase.point_of_sale_number)
        .bind(purchase.voucher_number)
        .bind(purchase.issue_date)
        .bind(purchase.net_cents)
        .bind(purchase.tax_cents)
        .bind(purchase.perceptions_cents)
        .bind(purchase.total_cents)
        .bind(purchase.paid_cents)
        .bind(purchase.status)
        .bind(&purchase.notes)
        .bind(purchase.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: format!(
                    "{} {}",
                    purchase.voucher_type,
                    VoucherNumber::new(purchase.point_of_sale_number, purchase.voucher_number)
                ),
            },
            other => other,
        })?;

        for item in &plan.items {
            sqlx::query(
                r#"
                INSERT INTO purchase_items (
                    id, purchase_id, product_id, quantity, unit_cost_cents,
                    tax_rate_bps, net_cents, tax_cents, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(&item.id)
            .bind(&item.purchase_id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(item.unit_cost_cents)
            .bind(item.tax_rate_bps)
            .bind(item.net_cents)
            .bind(item.tax_cents)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
        }

        for movement in &plan.stock_movements {
            apply_stock_movement(&mut tx, movement, purchase.created_at).await?;
        }

        for update in &plan.cost_updates {
            sqlx::query("UPDATE products SET cost_cents = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(&update.product_id)
                .bind(update.cost_cents)
                .bind(purchase.created_at)
                .execute(&mut *tx)
                .await?;
        }

        if let Some(order_id) = &purchase.purchase_order_id {
            let result = sqlx::query("UPDATE purchase_orders SET status = ?2 WHERE id = ?1 AND status = ?3")
                .bind(order_id)
                .bind(PurchaseOrderStatus::Invoiced)
                .bind(PurchaseOrderStatus::Open)
                .execute(&mut *tx)
                .await?;

            if result.rows_affected() == 0 {
                return Err(DbError::Conflict(format!("purchase order {} is not open", order_id)));
            }
        }

        let open_sql = format!(
            r#"
            SELECT {PURCHASE_COLUMNS}
            FROM purchases
            WHERE organization_id = ?1
              AND supplier_id = ?2
              AND status IN ('pending', 'partially_paid')
              AND paid_cents < total_cents
            "#
        );
        let open = sqlx::query_as::<_, Purchase>(&open_sql)
            .bind(&purchase.organization_id)
            .bind(&purchase.supplier_id)
            .fetch_all(&mut *tx)
            .await?;

        let netting = net_credit_notes(&open, purchase.created_at);
        for application in &netting.applications {
            sqlx::query(
                r#"
                INSERT INTO credit_applications (id, credit_note_id, purchase_id, amount_cents, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(&application.id)
            .bind(&application.credit_note_id)
            .bind(&application.purchase_id)
            .bind(application.amount_cents)
            .bind(application.created_at)
            .execute(&mut *tx)
            .await?;
        }
        for update in &netting.purchase_updates {
            apply_purchase_update(&mut tx, update).await?;
        }

        tx.commit().await?;

        let mut stored = purchase.clone();
        if let Some(update) = netting.purchase_updates.iter().find(|u| u.purchase_id == stored.id) {
            stored.paid_cents = update.paid_cents;
            stored.status = update.status;
        }

        info!(
            purchase_id = %stored.id,
            supplier_id = %stored.supplier_id,
            voucher_type = %stored.voucher_type,
            total_cents = stored.total_cents,
            credit_applied = netting.applications.len(),
            "Purchase registered"
        );

        Ok(stored)
    }

    /// Where a credit note was applied.
    pub async fn get_credit_applications(&self, credit_note_id: &str) -> DbResult<Vec<CreditApplication>> {
        let applications = sqlx::query_as::<_, CreditApplication>(
            r#"
            SELECT id, credit_note_id, purchase_id, amount_cents, created_at
            FROM credit_applications
            WHERE credit_note_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(credit_note_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(applications)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Purchase>> {
        let sql = format!("SELECT {PURCHASE_COLUMNS} FROM purchases WHERE id = ?1");
        let purchase = sqlx::query_as::<_, Purchase>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(purchase)
    }

    pub async fn get_items(&self, purchase_id: &str) -> DbResult<Vec<PurchaseItem>> {
        let items = sqlx::query_as::<_, PurchaseItem>(
            r#"
            SELECT id, purchase_id, product_id, quantity, unit_cost_cents,
                   tax_rate_bps, net_cents, tax_cents, created_at
            FROM purchase_items
            WHERE purchase_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(purchase_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Purchases of a supplier, newest voucher first.
    pub async fn list_by_supplier(&self, organization_id: &str, supplier_id: &str) -> DbResult<Vec<Purchase>> {
        let sql = format!(
            r#"
            SELECT {PURCHASE_COLUMNS}
            FROM purchases
            WHERE organization_id = ?1 AND supplier_id = ?2
            ORDER BY issue_date DESC, created_at DESC
            "#
        );
        let purchases = sqlx::query_as::<_, Purchase>(&sql)
            .bind(organization_id)
            .bind(supplier_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(purchases)
    }

    /// Unpaid invoices and debit notes of a supplier, oldest first.
    pub async fn list_outstanding(&self, organization_id: &str, supplier_id: &str) -> DbResult<Vec<Purchase>> {
        let sql = format!(
            r#"
            SELECT {PURCHASE_COLUMNS}
            FROM purchases
            WHERE organization_id = ?1
              AND supplier_id = ?2
              AND status IN ('pending', 'partially_paid')
              AND voucher_type NOT IN ('nota_credito_a', 'nota_credito_b', 'nota_credito_c')
              AND paid_cents < total_cents
            ORDER BY issue_date, created_at
            "#
        );
        let purchases = sqlx::query_as::<_, Purchase>(&sql)
            .bind(organization_id)
            .bind(supplier_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(purchases)
    }

    // =========================================================================
    // Purchase Orders
    // =========================================================================

    pub async fn create_purchase_order(&self, order: &PurchaseOrder) -> DbResult<PurchaseOrder> {
        debug!(supplier_id = %order.supplier_id, "Creating purchase order");

        sqlx::query(
            r#"
            INSERT INTO purchase_orders (id, organization_id, supplier_id, status, notes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&order.id)
        .bind(&order.organization_id)
        .bind(&order.supplier_id)
        .bind(order.status)
        .bind(&order.notes)
        .bind(order.created_at)
        .execute(&self.pool)
        .await?;

        Ok(order.clone())
    }

    pub async fn get_purchase_order(&self, id: &str) -> DbResult<Option<PurchaseOrder>> {
        let order = sqlx::query_as::<_, PurchaseOrder>(
            "SELECT id, organization_id, supplier_id, status, notes, created_at FROM purchase_orders WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    pub async fn list_open_orders(&self, organization_id: &str) -> DbResult<Vec<PurchaseOrder>> {
        let orders = sqlx::query_as::<_, PurchaseOrder>(
            r#"
            SELECT id, organization_id, supplier_id, status, notes, created_at
            FROM purchase_orders
            WHERE organization_id = ?1 AND status = 'open'
            ORDER BY created_at
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    pub async fn cancel_purchase_order(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE purchase_orders SET status = ?2 WHERE id = ?1 AND status = ?3")
            .bind(id)
            .bind(PurchaseOrderStatus::Cancelled)
            .bind(PurchaseOrderStatus::Open)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return match self.get_purchase_order(id).await? {
                Some(_) => Err(DbError::Conflict(format!("purchase order {} is not open", id))),
                None => Err(DbError::not_found("PurchaseOrder", id)),
            };
        }
        Ok(())
    }

    // =========================================================================
    // Supplier Payments
    // =========================================================================

    /// Records a supplier payment with its allocations atomically.
    pub async fn record_supplier_payment(&self, plan: &SupplierPaymentPlan) -> DbResult<SupplierPayment> {
        let payment = &plan.payment;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO supplier_payments (
                id, organization_id, supplier_id, method, amount_cents, unallocated_cents, reference, paid_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.organization_id)
        .bind(&payment.supplier_id)
        .bind(payment.method)
        .bind(payment.amount_cents)
        .bind(payment.unallocated_cents)
        .bind(&payment.reference)
        .bind(payment.paid_at)
        .execute(&mut *tx)
        .await?;

        for allocation in &plan.allocations {
            sqlx::query(
                r#"
                INSERT INTO payment_allocations (id, supplier_payment_id, purchase_id, amount_cents, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(&allocation.id)
            .bind(&allocation.supplier_payment_id)
            .bind(&allocation.purchase_id)
            .bind(allocation.amount_cents)
            .bind(allocation.created_at)
            .execute(&mut *tx)
            .await?;
        }

        for update in &plan.purchase_updates {
            apply_purchase_update(&mut tx, update).await?;
        }

        tx.commit().await?;

        info!(
            payment_id = %payment.id,
            supplier_id = %payment.supplier_id,
            amount_cents = payment.amount_cents,
            unallocated_cents = payment.unallocated_cents,
            "Supplier payment recorded"
        );

        Ok(payment.clone())
    }

    pub async fn get_allocations(&self, supplier_payment_id: &str) -> DbResult<Vec<PaymentAllocation>> {
        let allocations = sqlx::query_as::<_, PaymentAllocation>(
            r#"
            SELECT id, supplier_payment_id, purchase_id, amount_cents, created_at
            FROM payment_allocations
            WHERE supplier_payment_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(supplier_payment_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(allocations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{product, supplier, test_db};
    use crate::Database;
    use chrono::{NaiveDate, Utc};
    use mostrador_core::fiscal::VoucherType;
    use mostrador_core::purchase::{
        build_purchase, plan_supplier_payment, PurchaseDraft, PurchaseLineInput, SupplierPaymentInput,
    };
    use mostrador_core::{Money, PaymentMethod, Product, TaxRate, DEFAULT_ORGANIZATION_ID};
    use uuid::Uuid;

    struct Fixture {
        db: Database,
        supplier_id: String,
        product: Product,
    }

    async fn fixture() -> Fixture {
        let db = test_db().await;
        let s = db.suppliers().insert(&supplier("Molinos del Sur SA")).await.unwrap();
        let p = product("HARINA-1KG", 120_000, Some(4));
        db.products().insert(&p).await.unwrap();
        Fixture {
            db,
            supplier_id: s.id,
            product: p,
        }
    }

    fn draft(f: &Fixture, voucher_type: VoucherType, number: i64, day: u32, qty: i64) -> PurchaseDraft {
        PurchaseDraft {
            supplier_id: f.supplier_id.clone(),
            purchase_order_id: None,
            voucher_type,
            point_of_sale_number: 2,
            voucher_number: number,
            issue_date: NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
            items: vec![PurchaseLineInput {
                product_id: f.product.id.clone(),
                quantity: qty,
                unit_cost: Money::from_cents(50_000),
                tax_rate: TaxRate::IVA_GENERAL,
            }],
            perceptions: Money::zero(),
            notes: None,
        }
    }

    async fn register(f: &Fixture, draft: &PurchaseDraft) -> DbResult<Purchase> {
        let plan = build_purchase(draft, DEFAULT_ORGANIZATION_ID, Utc::now()).unwrap();
        f.db.purchases().record_purchase(&plan).await
    }

    #[tokio::test]
    async fn test_register_adds_stock_and_updates_cost() {
        let f = fixture().await;
        let d = draft(&f, VoucherType::FacturaA, 42, 1, 10);
        let purchase = register(&f, &d).await.unwrap();

        // 10 × 500.00 net + 21% IVA
        assert_eq!(purchase.net_cents, 500_000);
        assert_eq!(purchase.tax_cents, 105_000);
        assert_eq!(f.db.purchases().get_items(&purchase.id).await.unwrap().len(), 1);

        let p = f.db.products().get_by_id(&f.product.id).await.unwrap().unwrap();
        assert_eq!(p.current_stock, Some(14));
        assert_eq!(p.cost_cents, Some(50_000));
    }

    #[tokio::test]
    async fn test_duplicate_voucher_detected() {
        let f = fixture().await;
        let d = draft(&f, VoucherType::FacturaA, 42, 1, 1);
        register(&f, &d).await.unwrap();

        let found = f
            .db
            .purchases()
            .find_duplicate(DEFAULT_ORGANIZATION_ID, &d.duplicate_key())
            .await
            .unwrap();
        assert!(found.is_some());

        // Same number, different letter is a different voucher
        let other = draft(&f, VoucherType::FacturaB, 42, 1, 1);
        assert!(f
            .db
            .purchases()
            .find_duplicate(DEFAULT_ORGANIZATION_ID, &other.duplicate_key())
            .await
            .unwrap()
            .is_none());

        let err = register(&f, &d).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
        let stock = f.db.products().get_by_id(&f.product.id).await.unwrap().unwrap().current_stock;
        assert_eq!(stock, Some(5));
    }

    #[tokio::test]
    async fn test_credit_note_cannot_take_more_stock_than_exists() {
        let f = fixture().await;
        let err = register(&f, &draft(&f, VoucherType::NotaCreditoA, 7, 1, 5)).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
        assert!(f
            .db
            .purchases()
            .list_by_supplier(DEFAULT_ORGANIZATION_ID, &f.supplier_id)
            .await
            .unwrap()
            .is_empty());

        register(&f, &draft(&f, VoucherType::NotaCreditoA, 8, 1, 3)).await.unwrap();
        let stock = f.db.products().get_by_id(&f.product.id).await.unwrap().unwrap().current_stock;
        assert_eq!(stock, Some(1));
    }

    #[tokio::test]
    async fn test_purchase_order_marked_invoiced() {
        let f = fixture().await;
        let order = PurchaseOrder {
            id: Uuid::new_v4().to_string(),
            organization_id: DEFAULT_ORGANIZATION_ID.to_string(),
            supplier_id: f.supplier_id.clone(),
            status: PurchaseOrderStatus::Open,
            notes: None,
            created_at: Utc::now(),
        };
        f.db.purchases().create_purchase_order(&order).await.unwrap();
        assert_eq!(f.db.purchases().list_open_orders(DEFAULT_ORGANIZATION_ID).await.unwrap().len(), 1);

        let mut d = draft(&f, VoucherType::FacturaA, 1, 1, 1);
        d.purchase_order_id = Some(order.id.clone());
        register(&f, &d).await.unwrap();

        let stored = f.db.purchases().get_purchase_order(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PurchaseOrderStatus::Invoiced);
        assert!(matches!(
            f.db.purchases().cancel_purchase_order(&order.id).await,
            Err(DbError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_supplier_payment_allocates_oldest_first() {
        let f = fixture().await;
        // FacturaC: no IVA column, total = 500.00 each
        let older = register(&f, &draft(&f, VoucherType::FacturaC, 1, 1, 1)).await.unwrap();
        let newer = register(&f, &draft(&f, VoucherType::FacturaC, 2, 5, 1)).await.unwrap();

        let outstanding = f
            .db
            .purchases()
            .list_outstanding(DEFAULT_ORGANIZATION_ID, &f.supplier_id)
            .await
            .unwrap();
        assert_eq!(outstanding.len(), 2);

        let input = SupplierPaymentInput {
            supplier_id: f.supplier_id.clone(),
            method: PaymentMethod::BankTransfer,
            amount: Money::from_cents(70_000),
            reference: Some("TRF-001".to_string()),
        };
        let plan = plan_supplier_payment(&input, DEFAULT_ORGANIZATION_ID, &outstanding, Utc::now()).unwrap();
        let payment = f.db.purchases().record_supplier_payment(&plan).await.unwrap();
        assert_eq!(payment.unallocated_cents, 0);
        assert_eq!(f.db.purchases().get_allocations(&payment.id).await.unwrap().len(), 2);

        let older = f.db.purchases().get_by_id(&older.id).await.unwrap().unwrap();
        let newer = f.db.purchases().get_by_id(&newer.id).await.unwrap().unwrap();
        assert_eq!(older.status, PurchaseStatus::Paid);
        assert_eq!(newer.status, PurchaseStatus::PartiallyPaid);
        assert_eq!(newer.paid_cents, 20_000);

        // Overpaying leaves supplier credit
        let outstanding = f
            .db
            .purchases()
            .list_outstanding(DEFAULT_ORGANIZATION_ID, &f.supplier_id)
            .await
            .unwrap();
        let input = SupplierPaymentInput {
            amount: Money::from_cents(40_000),
            ..input
        };
        let plan = plan_supplier_payment(&input, DEFAULT_ORGANIZATION_ID, &outstanding, Utc::now()).unwrap();
        f.db.purchases().record_supplier_payment(&plan).await.unwrap();
        assert_eq!(f.db.suppliers().credit_balance(&f.supplier_id).await.unwrap(), 10_000);
    }

    async fn owed(f: &Fixture) -> i64 {
        f.db.purchases()
            .list_outstanding(DEFAULT_ORGANIZATION_ID, &f.supplier_id)
            .await
            .unwrap()
            .iter()
            .map(|p| p.balance().cents())
            .sum()
    }

    #[tokio::test]
    async fn test_credit_note_reduces_supplier_debt() {
        let f = fixture().await;
        // 2 × 500.00 + 21% IVA = 1,210.00
        let invoice = register(&f, &draft(&f, VoucherType::FacturaA, 10, 1, 2)).await.unwrap();
        // 1 × 500.00 + 21% IVA = 605.00
        let note = register(&f, &draft(&f, VoucherType::NotaCreditoA, 3, 4, 1)).await.unwrap();

        assert_eq!(note.status, PurchaseStatus::Paid);
        assert_eq!(note.paid_cents, 60_500);
        let applications = f.db.purchases().get_credit_applications(&note.id).await.unwrap();
        assert_eq!(applications.len(), 1);
        assert_eq!(applications[0].purchase_id, invoice.id);

        assert_eq!(owed(&f).await, 60_500);
        assert_eq!(f.db.suppliers().credit_balance(&f.supplier_id).await.unwrap(), 0);

        // Paying the net amount settles the invoice
        let outstanding = f
            .db
            .purchases()
            .list_outstanding(DEFAULT_ORGANIZATION_ID, &f.supplier_id)
            .await
            .unwrap();
        let input = SupplierPaymentInput {
            supplier_id: f.supplier_id.clone(),
            method: PaymentMethod::BankTransfer,
            amount: Money::from_cents(60_500),
            reference: None,
        };
        let plan = plan_supplier_payment(&input, DEFAULT_ORGANIZATION_ID, &outstanding, Utc::now()).unwrap();
        f.db.purchases().record_supplier_payment(&plan).await.unwrap();

        let invoice = f.db.purchases().get_by_id(&invoice.id).await.unwrap().unwrap();
        assert_eq!(invoice.status, PurchaseStatus::Paid);
        assert_eq!(owed(&f).await, 0);
    }

    #[tokio::test]
    async fn test_unapplied_credit_note_settles_next_invoice() {
        let f = fixture().await;
        let note = register(&f, &draft(&f, VoucherType::NotaCreditoA, 3, 1, 1)).await.unwrap();
        assert_eq!(note.status, PurchaseStatus::Pending);
        assert_eq!(f.db.suppliers().credit_balance(&f.supplier_id).await.unwrap(), 60_500);

        let invoice = register(&f, &draft(&f, VoucherType::FacturaA, 11, 2, 2)).await.unwrap();
        assert_eq!(invoice.paid_cents, 60_500);
        assert_eq!(invoice.status, PurchaseStatus::PartiallyPaid);

        let note = f.db.purchases().get_by_id(&note.id).await.unwrap().unwrap();
        assert_eq!(note.status, PurchaseStatus::Paid);
        assert_eq!(f.db.suppliers().credit_balance(&f.supplier_id).await.unwrap(), 0);
        assert_eq!(owed(&f).await, 60_500);
    }
}
