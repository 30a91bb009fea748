//! # Sale Commands
//!
//! Payment reconciliation, checkout, receipts and cancellation.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Checkout                                             │
//! │                                                                         │
//! │  Cashier enters payments ──► reconcile_payments() (preview, no writes)  │
//! │       │                        remaining / change / complete            │
//! │       ▼                                                                 │
//! │  Cobrar ──► checkout(payments)                                          │
//! │       │                                                                 │
//! │       ├── fiscal config + billing point of sale                         │
//! │       ├── customer (if identified) + current product rows               │
//! │       ├── build_checkout()  (pricing, split, voucher, stock)            │
//! │       ├── record_checkout() (one transaction: number, rows, stock)      │
//! │       └── remove the sold lines from the cart                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ReceiptResponse { voucherNumber: "00003-00000042", ... }               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::commands::fiscal::{billing_point_of_sale, pricing_policy, require_fiscal_config};
use crate::error::ApiError;
use crate::state::{CartState, ConfigState, DbState};
use mostrador_core::checkout::{build_checkout, plan_cancellation, CheckoutContext};
use mostrador_core::fiscal::{FiscalConfig, VoucherNumber, VoucherType};
use mostrador_core::split::{PaymentInput, PaymentSplit, SplitEntry};
use mostrador_core::{CoreError, Customer, Money, Payment, Sale, SaleItem, SaleStatus};
use mostrador_db::Database;

// =============================================================================
// DTOs
// =============================================================================

/// Live state of the payments being entered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatus {
    pub total_cents: i64,
    pub paid_cents: i64,
    pub remaining_cents: i64,
    pub change_cents: i64,
    /// Paid within one cent of the total.
    pub complete: bool,
    pub entries: Vec<SplitEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptResponse {
    pub sale_id: String,
    pub voucher_type: VoucherType,
    pub voucher_label: String,
    pub voucher_letter: char,
    /// `PPPPP-NNNNNNNN`
    pub voucher_number: String,
    pub status: SaleStatus,
    pub store_name: String,
    pub issuer_legal_name: Option<String>,
    pub issuer_cuit: Option<String>,
    pub issuer_tax_condition: Option<String>,
    pub customer_name: Option<String>,
    pub customer_cuit: Option<String>,
    pub timestamp: String,
    pub items: Vec<ReceiptItem>,
    pub subtotal_cents: i64,
    pub item_discount_cents: i64,
    pub global_discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    /// Factura A shows the IVA breakdown; B and C only the total.
    pub itemizes_iva: bool,
    pub tax_breakdown: Vec<ReceiptTax>,
    pub payments: Vec<ReceiptPayment>,
    pub change_cents: i64,
    /// e.g. `Nota de Crédito B 00003-00000007` once the sale is annulled.
    pub credit_note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptItem {
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub discount_cents: i64,
    pub tax_rate_bps: u32,
    pub line_total_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptTax {
    pub rate_bps: u32,
    pub taxable_cents: i64,
    pub tax_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptPayment {
    pub method: String,
    pub amount_cents: i64,
    pub tendered_cents: Option<i64>,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleSummary {
    pub id: String,
    pub voucher_label: String,
    pub voucher_number: String,
    pub status: SaleStatus,
    pub total_cents: i64,
    pub created_at: String,
}

impl From<&Sale> for SaleSummary {
    fn from(sale: &Sale) -> Self {
        SaleSummary {
            id: sale.id.clone(),
            voucher_label: sale.voucher_type.label().to_string(),
            voucher_number: sale.voucher().to_string(),
            status: sale.status,
            total_cents: sale.total_cents,
            created_at: sale.created_at.to_rfc3339(),
        }
    }
}

/// Everything a printed receipt needs.
struct ReceiptSource<'a> {
    config: &'a ConfigState,
    fiscal: Option<&'a FiscalConfig>,
    customer: Option<&'a Customer>,
    sale: &'a Sale,
    items: &'a [SaleItem],
    payments: &'a [Payment],
}

impl ReceiptSource<'_> {
    fn build(&self) -> ReceiptResponse {
        let sale = self.sale;

        // IVA actually charged, grouped by rate, ascending. A Factura C
        // keeps the catalog rate on its lines but charges none.
        let mut by_rate: BTreeMap<u32, (i64, i64)> = BTreeMap::new();
        for item in self.items.iter().filter(|i| i.tax_cents > 0) {
            let entry = by_rate.entry(item.tax_rate_bps).or_default();
            entry.0 += item.total_cents - item.tax_cents;
            entry.1 += item.tax_cents;
        }

        let credit_note = match (sale.voucher_type.credit_note(), sale.credit_note_number) {
            (Some(kind), Some(number)) => Some(format!(
                "{} {}",
                kind.label(),
                VoucherNumber::new(sale.point_of_sale_number, number)
            )),
            _ => None,
        };

        ReceiptResponse {
            sale_id: sale.id.clone(),
            voucher_type: sale.voucher_type,
            voucher_label: sale.voucher_type.label().to_string(),
            voucher_letter: sale.voucher_type.letter(),
            voucher_number: sale.voucher().to_string(),
            status: sale.status,
            store_name: self.config.store_name.clone(),
            issuer_legal_name: self.fiscal.map(|f| f.legal_name.clone()),
            issuer_cuit: self.fiscal.map(|f| f.cuit.clone()),
            issuer_tax_condition: self.fiscal.map(|f| f.tax_condition.label().to_string()),
            customer_name: self.customer.map(|c| c.name.clone()),
            customer_cuit: self.customer.and_then(|c| c.cuit.clone()),
            timestamp: sale.created_at.to_rfc3339(),
            items: self
                .items
                .iter()
                .map(|item| ReceiptItem {
                    sku: item.sku_snapshot.clone(),
                    name: item.name_snapshot.clone(),
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price_cents,
                    discount_cents: item.discount_cents,
                    tax_rate_bps: item.tax_rate_bps,
                    line_total_cents: item.total_cents,
                })
                .collect(),
            subtotal_cents: sale.subtotal_cents,
            item_discount_cents: sale.item_discount_cents,
            global_discount_cents: sale.global_discount_cents,
            tax_cents: sale.tax_cents,
            total_cents: sale.total_cents,
            itemizes_iva: sale.voucher_type.discriminates_iva(),
            tax_breakdown: by_rate
                .into_iter()
                .map(|(rate_bps, (taxable_cents, tax_cents))| ReceiptTax {
                    rate_bps,
                    taxable_cents,
                    tax_cents,
                })
                .collect(),
            payments: self
                .payments
                .iter()
                .map(|p| ReceiptPayment {
                    method: p.method.label().to_string(),
                    amount_cents: p.amount_cents,
                    tendered_cents: p.tendered_cents,
                    reference: p.reference.clone(),
                })
                .collect(),
            change_cents: self.payments.iter().filter_map(|p| p.change_cents).sum(),
            credit_note,
        }
    }
}

async fn load_customer(db: &Database, customer_id: Option<&str>) -> Result<Option<Customer>, ApiError> {
    match customer_id {
        Some(id) => {
            let customer = db
                .customers()
                .get_by_id(id)
                .await?
                .ok_or_else(|| ApiError::not_found("Customer", id))?;
            Ok(Some(customer))
        }
        None => Ok(None),
    }
}

async fn load_sale(db: &Database, config: &ConfigState, sale_id: &str) -> Result<Sale, ApiError> {
    db.sales()
        .get_by_id(sale_id)
        .await?
        .filter(|s| s.organization_id == config.organization_id)
        .ok_or_else(|| ApiError::not_found("Sale", sale_id))
}

// =============================================================================
// Commands
// =============================================================================

/// Reconciles entered payments against the cart total without saving.
///
/// Card, transfer and QR payments cannot exceed what is still owed; cash
/// can, and the excess becomes change.
pub async fn reconcile_payments(
    db: &DbState,
    cart: &CartState,
    config: &ConfigState,
    payments: &[PaymentInput],
) -> Result<PaymentStatus, ApiError> {
    debug!(payments = payments.len(), "reconcile_payments command");

    let policy = pricing_policy(db.inner(), &config.organization_id).await?;
    let total = cart.with_cart(|c| c.totals(&policy).total);
    let split = PaymentSplit::from_inputs(total, payments)?;

    Ok(PaymentStatus {
        total_cents: split.total().cents(),
        paid_cents: split.paid().cents(),
        remaining_cents: split.remaining().cents(),
        change_cents: split.change_due().cents(),
        complete: split.is_complete(),
        entries: split.entries().to_vec(),
    })
}

/// Completes the sale in the cart.
///
/// ## Errors
/// - `CART_ERROR` - empty cart
/// - `PAYMENT_ERROR` - payments do not reconcile with the total
/// - `FISCAL_ERROR` - no fiscal setup, or Factura A without customer CUIT
/// - `INSUFFICIENT_STOCK` / `CONFLICT` - stock ran out (checked before and
///   inside the transaction)
///
/// On any error nothing is written and the cart is kept.
pub async fn checkout(
    db: &DbState,
    cart: &CartState,
    config: &ConfigState,
    payments: &[PaymentInput],
    user_id: &str,
) -> Result<ReceiptResponse, ApiError> {
    debug!(payments = payments.len(), user_id = %user_id, "checkout command");

    let snapshot = cart.snapshot();
    if snapshot.is_empty() {
        return Err(CoreError::EmptyCart.into());
    }

    let db_inner = db.inner();
    let fiscal = require_fiscal_config(db_inner, &config.organization_id).await?;
    let point_of_sale = billing_point_of_sale(db_inner, &fiscal).await?;
    let customer = load_customer(db_inner, snapshot.customer_id.as_deref()).await?;

    let product_ids: Vec<String> = snapshot.items.iter().map(|i| i.product_id.clone()).collect();
    let products = db_inner.products().get_many(&product_ids).await?;

    let ctx = CheckoutContext {
        fiscal: &fiscal,
        point_of_sale: &point_of_sale,
        customer: customer.as_ref(),
        user_id,
        device_id: &config.device_id,
        now: Utc::now(),
    };
    let plan = build_checkout(&snapshot, payments, &ctx, &products)?;
    if plan.global_discount_capped {
        warn!(
            requested = ?snapshot.global_discount,
            applied = plan.sale.global_discount_cents,
            "Global discount capped at checkout"
        );
    }

    let plan = db_inner.sales().record_checkout(plan).await?;

    cart.with_cart_mut(|c| c.remove_sold(&snapshot));

    info!(
        sale_id = %plan.sale.id,
        voucher = %format!("{} {}", plan.sale.voucher_type, plan.sale.voucher()),
        total = %Money::from_cents(plan.sale.total_cents),
        items = plan.items.len(),
        payments = plan.payments.len(),
        "Sale completed"
    );

    Ok(ReceiptSource {
        config,
        fiscal: Some(&fiscal),
        customer: customer.as_ref(),
        sale: &plan.sale,
        items: &plan.items,
        payments: &plan.payments,
    }
    .build())
}

/// Rebuilds the receipt of a recorded sale (reprint).
pub async fn get_receipt(db: &DbState, config: &ConfigState, sale_id: &str) -> Result<ReceiptResponse, ApiError> {
    debug!(sale_id = %sale_id, "get_receipt command");

    let db_inner = db.inner();
    let sale = load_sale(db_inner, config, sale_id).await?;
    let items = db_inner.sales().get_items(sale_id).await?;
    let payments = db_inner.sales().get_payments(sale_id).await?;
    let fiscal = db_inner.fiscal().get_config(&config.organization_id).await?;
    let customer = load_customer(db_inner, sale.customer_id.as_deref()).await?;

    Ok(ReceiptSource {
        config,
        fiscal: fiscal.as_ref(),
        customer: customer.as_ref(),
        sale: &sale,
        items: &items,
        payments: &payments,
    }
    .build())
}

/// Annuls a completed sale.
///
/// Stock of tracked products is returned. Fiscal sales get a credit note
/// of the same letter, numbered from its own sequence.
pub async fn cancel_sale(db: &DbState, config: &ConfigState, sale_id: &str) -> Result<ReceiptResponse, ApiError> {
    debug!(sale_id = %sale_id, "cancel_sale command");

    let db_inner = db.inner();
    let sale = load_sale(db_inner, config, sale_id).await?;
    let items = db_inner.sales().get_items(sale_id).await?;

    let product_ids: Vec<String> = items.iter().map(|i| i.product_id.clone()).collect();
    let tracked: Vec<String> = db_inner
        .products()
        .get_many(&product_ids)
        .await?
        .into_iter()
        .filter(|p| p.track_inventory)
        .map(|p| p.id)
        .collect();

    let plan = plan_cancellation(&sale, &items, &tracked)?;
    let cancelled = db_inner.sales().cancel(&plan).await?;

    info!(
        sale_id = %sale_id,
        voucher = %cancelled.voucher(),
        credit_note = ?cancelled.credit_note_number,
        "Sale cancelled"
    );

    get_receipt(db, config, sale_id).await
}

pub async fn list_recent_sales(
    db: &DbState,
    config: &ConfigState,
    limit: Option<u32>,
) -> Result<Vec<SaleSummary>, ApiError> {
    let limit = limit.unwrap_or(50).min(500);
    debug!(limit, "list_recent_sales command");

    let sales = db.inner().sales().list_recent(&config.organization_id, limit).await?;
    Ok(sales.iter().map(SaleSummary::from).collect())
}
