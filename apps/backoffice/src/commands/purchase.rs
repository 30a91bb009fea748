//! # Purchase Commands
//!
//! Supplier vouchers, purchase orders and supplier payments.
//!
//! ## Registering a Supplier Voucher
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PurchaseDraft (typed from the paper voucher)                           │
//! │       │                                                                 │
//! │       ├── supplier exists and is active                                 │
//! │       ├── purchase order (optional) is open and from that supplier      │
//! │       ├── every product exists                                          │
//! │       ├── (supplier, type, point of sale, number) not registered yet    │
//! │       ▼                                                                 │
//! │  build_purchase()   totals, IVA by rate, stock movements, new costs     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  record_purchase()  one transaction: rows + stock + cost + order        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! The duplicate check runs before the insert for a readable message; the
//! UNIQUE index catches the race between two terminals.

use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ApiError, ErrorCode};
use crate::state::{ConfigState, DbState};
use mostrador_core::purchase::{
    build_purchase, plan_supplier_payment, PurchaseDraft, PurchaseTotals, SupplierPaymentInput,
};
use mostrador_core::{
    Money, PaymentAllocation, Purchase, PurchaseItem, PurchaseOrder, PurchaseOrderStatus, Supplier,
    SupplierPayment,
};
use mostrador_db::Database;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResponse {
    pub purchase: Purchase,
    pub totals: PurchaseTotals,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseDetail {
    pub purchase: Purchase,
    pub items: Vec<PurchaseItem>,
}

/// What the business owes a supplier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierAccount {
    pub supplier_id: String,
    /// Pending and partially paid vouchers, oldest first.
    pub outstanding: Vec<Purchase>,
    pub balance_cents: i64,
    /// Payments not yet applied to any voucher.
    pub credit_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierPaymentResponse {
    pub payment: SupplierPayment,
    pub allocations: Vec<PaymentAllocation>,
}

async fn active_supplier(db: &Database, config: &ConfigState, supplier_id: &str) -> Result<Supplier, ApiError> {
    let supplier = db
        .suppliers()
        .get_by_id(supplier_id)
        .await?
        .filter(|s| s.organization_id == config.organization_id)
        .ok_or_else(|| ApiError::not_found("Supplier", supplier_id))?;

    if !supplier.is_active {
        return Err(ApiError::validation(format!(
            "Supplier {} is archived",
            supplier.business_name
        )));
    }
    Ok(supplier)
}

// =============================================================================
// Purchases
// =============================================================================

/// Registers a supplier voucher: adds stock, updates costs and closes the
/// linked purchase order.
///
/// ## Errors
/// - `DUPLICATE` - the voucher was already registered for this supplier
/// - `CONFLICT` - the purchase order is not open, or a credit note would
///   take stock below zero
pub async fn register_purchase(
    db: &DbState,
    config: &ConfigState,
    draft: PurchaseDraft,
) -> Result<PurchaseResponse, ApiError> {
    debug!(
        supplier_id = %draft.supplier_id,
        voucher_type = %draft.voucher_type,
        items = draft.items.len(),
        "register_purchase command"
    );

    draft.validate()?;

    let db_inner = db.inner();
    let supplier = active_supplier(db_inner, config, &draft.supplier_id).await?;

    if let Some(order_id) = &draft.purchase_order_id {
        let order = db_inner
            .purchases()
            .get_purchase_order(order_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Purchase order", order_id))?;
        if order.supplier_id != supplier.id {
            return Err(ApiError::validation("Purchase order belongs to another supplier"));
        }
        if order.status != PurchaseOrderStatus::Open {
            return Err(ApiError::new(
                ErrorCode::Conflict,
                format!("Purchase order is {:?}", order.status),
            ));
        }
    }

    let wanted: HashSet<String> = draft.items.iter().map(|i| i.product_id.clone()).collect();
    let wanted: Vec<String> = wanted.into_iter().collect();
    let found = db_inner.products().get_many(&wanted).await?;
    if let Some(missing) = wanted.iter().find(|id| !found.iter().any(|p| &p.id == *id)) {
        return Err(ApiError::not_found("Product", missing));
    }

    let key = draft.duplicate_key();
    if db_inner
        .purchases()
        .find_duplicate(&config.organization_id, &key)
        .await?
        .is_some()
    {
        return Err(key.into_error().into());
    }

    let plan = build_purchase(&draft, &config.organization_id, Utc::now())?;
    let purchase = db_inner.purchases().record_purchase(&plan).await?;

    info!(
        purchase_id = %purchase.id,
        supplier = %supplier.business_name,
        total = %Money::from_cents(purchase.total_cents),
        "register_purchase complete"
    );

    Ok(PurchaseResponse {
        purchase,
        totals: plan.totals,
    })
}

pub async fn get_purchase(db: &DbState, config: &ConfigState, id: &str) -> Result<PurchaseDetail, ApiError> {
    debug!(id = %id, "get_purchase command");
    let purchase = db
        .inner()
        .purchases()
        .get_by_id(id)
        .await?
        .filter(|p| p.organization_id == config.organization_id)
        .ok_or_else(|| ApiError::not_found("Purchase", id))?;
    let items = db.inner().purchases().get_items(id).await?;
    Ok(PurchaseDetail { purchase, items })
}

pub async fn list_supplier_purchases(
    db: &DbState,
    config: &ConfigState,
    supplier_id: &str,
) -> Result<Vec<Purchase>, ApiError> {
    Ok(db
        .inner()
        .purchases()
        .list_by_supplier(&config.organization_id, supplier_id)
        .await?)
}

pub async fn get_supplier_account(
    db: &DbState,
    config: &ConfigState,
    supplier_id: &str,
) -> Result<SupplierAccount, ApiError> {
    debug!(supplier_id = %supplier_id, "get_supplier_account command");

    let db_inner = db.inner();
    let outstanding = db_inner
        .purchases()
        .list_outstanding(&config.organization_id, supplier_id)
        .await?;
    let balance: Money = outstanding.iter().map(Purchase::balance).sum();
    let credit_cents = db_inner.suppliers().credit_balance(supplier_id).await?;

    Ok(SupplierAccount {
        supplier_id: supplier_id.to_string(),
        outstanding,
        balance_cents: balance.cents(),
        credit_cents,
    })
}

// =============================================================================
// Supplier payments
// =============================================================================

/// Pays a supplier. The amount settles outstanding vouchers oldest first;
/// anything left over stays as credit.
pub async fn pay_supplier(
    db: &DbState,
    config: &ConfigState,
    input: SupplierPaymentInput,
) -> Result<SupplierPaymentResponse, ApiError> {
    debug!(supplier_id = %input.supplier_id, amount = %input.amount, "pay_supplier command");

    let db_inner = db.inner();
    active_supplier(db_inner, config, &input.supplier_id).await?;

    let outstanding = db_inner
        .purchases()
        .list_outstanding(&config.organization_id, &input.supplier_id)
        .await?;
    let plan = plan_supplier_payment(&input, &config.organization_id, &outstanding, Utc::now())?;
    let payment = db_inner.purchases().record_supplier_payment(&plan).await?;

    info!(
        payment_id = %payment.id,
        amount = %input.amount,
        vouchers = plan.allocations.len(),
        unallocated = %Money::from_cents(payment.unallocated_cents),
        "Supplier paid"
    );

    Ok(SupplierPaymentResponse {
        payment,
        allocations: plan.allocations,
    })
}

// =============================================================================
// Purchase orders
// =============================================================================

pub async fn create_purchase_order(
    db: &DbState,
    config: &ConfigState,
    supplier_id: &str,
    notes: Option<String>,
) -> Result<PurchaseOrder, ApiError> {
    debug!(supplier_id = %supplier_id, "create_purchase_order command");

    let db_inner = db.inner();
    active_supplier(db_inner, config, supplier_id).await?;

    let order = db_inner
        .purchases()
        .create_purchase_order(&PurchaseOrder {
            id: Uuid::new_v4().to_string(),
            organization_id: config.organization_id.clone(),
            supplier_id: supplier_id.to_string(),
            status: PurchaseOrderStatus::Open,
            notes,
            created_at: Utc::now(),
        })
        .await?;

    info!(order_id = %order.id, "Purchase order created");
    Ok(order)
}

pub async fn list_open_purchase_orders(db: &DbState, config: &ConfigState) -> Result<Vec<PurchaseOrder>, ApiError> {
    Ok(db.inner().purchases().list_open_orders(&config.organization_id).await?)
}

pub async fn cancel_purchase_order(db: &DbState, id: &str) -> Result<(), ApiError> {
    debug!(id = %id, "cancel_purchase_order command");
    db.inner().purchases().cancel_purchase_order(id).await?;
    info!(order_id = %id, "Purchase order cancelled");
    Ok(())
}
