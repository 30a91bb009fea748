//! # Domain Types
//!
//! Records shared by every layer of Mostrador.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Catalog             Sales                  Purchases                   │
//! │  ───────             ─────                  ─────────                   │
//! │  Product             Sale ──► SaleItem      Purchase ──► PurchaseItem   │
//! │  Category              └────► Payment       PurchaseOrder               │
//! │  Supplier                                   SupplierPayment             │
//! │  Customer                                     └──► PaymentAllocation    │
//! │                                                                         │
//! │  Premises: Location ──► PointOfSale (fiscal numbering terminal)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every entity has an `id` (UUID v4) plus a business identifier (SKU,
//! voucher number, CUIT) that humans read.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::fiscal::{TaxCondition, VoucherNumber, VoucherType};
use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 2100 bps = 21% (IVA general), 1050 = 10.5% (reduced), 2700 = 27%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// IVA general rate.
    pub const IVA_GENERAL: TaxRate = TaxRate(2100);
    /// IVA reduced rate (basic foods, some services).
    pub const IVA_REDUCED: TaxRate = TaxRate(1050);
    /// IVA increased rate (utilities billed to companies).
    pub const IVA_INCREASED: TaxRate = TaxRate(2700);

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage (for convenience).
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round() as u32)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::IVA_GENERAL
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// A product available for sale or purchase.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub organization_id: String,
    pub category_id: Option<String>,
    /// Usual supplier, used to prefill purchase forms.
    pub supplier_id: Option<String>,
    /// Stock Keeping Unit, unique per organization.
    pub sku: String,
    pub barcode: Option<String>,
    pub name: String,
    pub description: Option<String>,
    /// Sale price in cents. Includes IVA when the store prices tax-inclusive.
    pub price_cents: i64,
    /// Last purchase cost in cents, net of IVA.
    pub cost_cents: Option<i64>,
    pub tax_rate_bps: u32,
    pub track_inventory: bool,
    pub allow_negative_stock: bool,
    pub current_stock: Option<i64>,
    /// Soft delete flag.
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }

    /// Checks if product can be sold (in stock or doesn't track inventory).
    pub fn can_sell(&self, quantity: i64) -> bool {
        if !self.track_inventory {
            return true;
        }

        let stock = self.current_stock.unwrap_or(0);
        if stock >= quantity {
            return true;
        }

        self.allow_negative_stock
    }
}

/// Product grouping shown in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A supplier the business buys from.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Supplier {
    pub id: String,
    pub organization_id: String,
    pub business_name: String,
    pub cuit: Option<String>,
    pub tax_condition: TaxCondition,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A customer identified on a sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub cuit: Option<String>,
    pub tax_condition: TaxCondition,
    pub email: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Premises
// =============================================================================

/// A physical store or warehouse.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Location {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub address: Option<String>,
    pub is_active: bool,
}

/// A billing terminal registered with ARCA under a point-of-sale number.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PointOfSale {
    pub id: String,
    pub organization_id: String,
    pub location_id: String,
    /// ARCA point-of-sale number (1..=99999).
    pub number: i64,
    pub description: Option<String>,
    /// Non-fiscal terminals only issue internal receipts.
    pub is_fiscal: bool,
    pub is_active: bool,
}

// =============================================================================
// Sales
// =============================================================================

/// The status of a recorded sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Paid and numbered.
    #[default]
    Completed,
    /// Annulled after the fact (stock returned).
    Cancelled,
}

/// How a customer paid (or how the business paid a supplier).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    DebitCard,
    CreditCard,
    BankTransfer,
    QrCode,
    /// Charged to the customer's current account.
    CurrentAccount,
}

impl PaymentMethod {
    /// Only cash can be tendered above the amount due (change is returned).
    #[inline]
    pub fn allows_change(&self) -> bool {
        matches!(self, PaymentMethod::Cash)
    }

    /// Label printed on receipts.
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Efectivo",
            PaymentMethod::DebitCard => "Tarjeta de débito",
            PaymentMethod::CreditCard => "Tarjeta de crédito",
            PaymentMethod::BankTransfer => "Transferencia",
            PaymentMethod::QrCode => "QR",
            PaymentMethod::CurrentAccount => "Cuenta corriente",
        }
    }
}

/// A completed sale with its fiscal voucher.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub organization_id: String,
    pub point_of_sale_id: String,
    pub customer_id: Option<String>,
    pub voucher_type: VoucherType,
    pub point_of_sale_number: i64,
    pub voucher_number: i64,
    pub status: SaleStatus,
    /// Σ unit price × quantity.
    pub subtotal_cents: i64,
    pub item_discount_cents: i64,
    pub global_discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub user_id: String,
    pub device_id: String,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Number of the credit note that annulled a fiscal sale.
    pub credit_note_number: Option<i64>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Printed voucher number, e.g. `00003-00000042`.
    pub fn voucher(&self) -> VoucherNumber {
        VoucherNumber::new(self.point_of_sale_number, self.voucher_number)
    }
}

/// A line of a sale. Product data is frozen at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub sku_snapshot: String,
    pub name_snapshot: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    /// unit_price × quantity.
    pub subtotal_cents: i64,
    /// Discount set on this line.
    pub discount_cents: i64,
    /// This line's share of the global discount.
    pub global_discount_cents: i64,
    pub tax_rate_bps: u32,
    pub tax_cents: i64,
    /// What the customer pays for this line.
    pub total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A payment towards a sale. Split tender produces several rows.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub sale_id: String,
    pub method: PaymentMethod,
    /// Amount applied to the sale.
    pub amount_cents: i64,
    /// For cash: amount the customer handed over.
    pub tendered_cents: Option<i64>,
    /// For cash: change returned.
    pub change_cents: Option<i64>,
    /// Card authorization, transfer id, ...
    pub reference: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Purchases
// =============================================================================

/// Payment state of a supplier purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    #[default]
    Pending,
    PartiallyPaid,
    Paid,
    Cancelled,
}

impl PurchaseStatus {
    /// Status implied by how much of `total` has been paid.
    pub fn from_paid(paid: Money, total: Money) -> Self {
        if paid.is_zero() || paid.is_negative() {
            PurchaseStatus::Pending
        } else if paid >= total {
            PurchaseStatus::Paid
        } else {
            PurchaseStatus::PartiallyPaid
        }
    }
}

/// A voucher received from a supplier.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Purchase {
    pub id: String,
    pub organization_id: String,
    pub supplier_id: String,
    pub purchase_order_id: Option<String>,
    pub voucher_type: VoucherType,
    pub point_of_sale_number: i64,
    pub voucher_number: i64,
    #[ts(as = "String")]
    pub issue_date: NaiveDate,
    pub net_cents: i64,
    pub tax_cents: i64,
    pub perceptions_cents: i64,
    pub total_cents: i64,
    pub paid_cents: i64,
    pub status: PurchaseStatus,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Purchase {
    /// Amount still owed to the supplier (for a credit note: not yet applied).
    pub fn balance(&self) -> Money {
        Money::from_cents(self.total_cents - self.paid_cents).non_negative()
    }
}

/// A line of a supplier purchase.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseItem {
    pub id: String,
    pub purchase_id: String,
    pub product_id: String,
    pub quantity: i64,
    /// Unit cost net of IVA.
    pub unit_cost_cents: i64,
    pub tax_rate_bps: u32,
    pub net_cents: i64,
    pub tax_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Status of an order placed with a supplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    #[default]
    Open,
    /// A purchase voucher was registered against it.
    Invoiced,
    Cancelled,
}

/// An order placed with a supplier, later matched to a purchase voucher.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseOrder {
    pub id: String,
    pub organization_id: String,
    pub supplier_id: String,
    pub status: PurchaseOrderStatus,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Money paid to a supplier, possibly covering several purchases.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SupplierPayment {
    pub id: String,
    pub organization_id: String,
    pub supplier_id: String,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    /// Part of the payment not matched to any purchase (supplier credit).
    pub unallocated_cents: i64,
    pub reference: Option<String>,
    #[ts(as = "String")]
    pub paid_at: DateTime<Utc>,
}

/// The part of a supplier payment applied to one purchase.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PaymentAllocation {
    pub id: String,
    pub supplier_payment_id: String,
    pub purchase_id: String,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// The part of a supplier credit note applied to an invoice or debit note.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CreditApplication {
    pub id: String,
    pub credit_note_id: String,
    pub purchase_id: String,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
