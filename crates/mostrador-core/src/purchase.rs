//! # Purchases
//!
//! Supplier vouchers: totals with IVA by rate, duplicate detection, the
//! stock and cost they bring in, and how supplier payments are applied.
//!
//! ## Registering a Purchase
//! ```text
//! PurchaseDraft ──► validate ──► totals (net, IVA by rate, perceptions)
//!                                   │
//!                                   ▼
//!                           PurchasePlan
//!                           ├── Purchase row
//!                           ├── PurchaseItem rows
//!                           ├── stock movements (+qty)
//!                           ├── cost updates (unit cost net of IVA)
//!                           └── purchase order to mark invoiced
//! ```
//!
//! ## Paying a Supplier
//! ```text
//! payment $1,500.00 over outstanding (oldest first):
//!   FA 0001-00000010  balance $1,000.00  ◄── $1,000.00
//!   FA 0001-00000014  balance $  800.00  ◄── $  500.00
//!   unallocated (supplier credit)            $    0.00
//! ```
//!
//! ## Credit Notes
//! A supplier credit note settles open invoices the same way, oldest
//! first. For a credit note `paid_cents` is the amount already applied;
//! an unapplied balance is supplier credit until the next invoice arrives.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::checkout::StockMovement;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::fiscal::{VoucherNumber, VoucherType};
use crate::money::Money;
use crate::pricing::TaxBreakdown;
use crate::types::{
    CreditApplication, PaymentAllocation, PaymentMethod, Purchase, PurchaseItem, PurchaseStatus, SupplierPayment,
    TaxRate,
};
use crate::validation::{validate_point_of_sale_number, validate_voucher_number};

// =============================================================================
// Draft
// =============================================================================

/// One line of a supplier voucher as typed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseLineInput {
    pub product_id: String,
    pub quantity: i64,
    /// Unit cost net of IVA.
    pub unit_cost: Money,
    pub tax_rate: TaxRate,
}

/// A supplier voucher before it is registered.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseDraft {
    pub supplier_id: String,
    pub purchase_order_id: Option<String>,
    pub voucher_type: VoucherType,
    pub point_of_sale_number: i64,
    pub voucher_number: i64,
    #[ts(as = "String")]
    pub issue_date: NaiveDate,
    pub items: Vec<PurchaseLineInput>,
    /// IVA / gross income perceptions listed on the voucher.
    pub perceptions: Money,
    pub notes: Option<String>,
}

/// Identifies a supplier voucher. Registering the same key twice is an error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DuplicateKey {
    pub supplier_id: String,
    pub voucher_type: VoucherType,
    pub point_of_sale_number: i64,
    pub voucher_number: i64,
}

impl fmt::Display for DuplicateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            self.voucher_type,
            VoucherNumber::new(self.point_of_sale_number, self.voucher_number)
        )
    }
}

impl DuplicateKey {
    /// The error reported when this key already exists.
    pub fn into_error(self) -> CoreError {
        CoreError::DuplicateVoucher {
            voucher: self.to_string(),
        }
    }
}

/// Computed amounts of a supplier voucher.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseTotals {
    pub net: Money,
    pub tax: Money,
    pub perceptions: Money,
    pub total: Money,
    /// IVA grouped by rate, ascending.
    pub tax_breakdown: Vec<TaxBreakdown>,
}

impl PurchaseDraft {
    pub fn duplicate_key(&self) -> DuplicateKey {
        DuplicateKey {
            supplier_id: self.supplier_id.clone(),
            voucher_type: self.voucher_type,
            point_of_sale_number: self.point_of_sale_number,
            voucher_number: self.voucher_number,
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.supplier_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "supplier_id".to_string(),
            }
            .into());
        }
        if matches!(
            self.voucher_type,
            VoucherType::Presupuesto | VoucherType::Recibo | VoucherType::Remito
        ) {
            return Err(ValidationError::NotAllowed {
                field: "voucher_type".to_string(),
                allowed: VoucherType::ALL
                    .iter()
                    .filter(|v| v.is_invoice_like())
                    .map(|v| v.as_str().to_string())
                    .collect(),
            }
            .into());
        }
        validate_point_of_sale_number(self.point_of_sale_number)?;
        validate_voucher_number(self.voucher_number)?;

        if self.items.is_empty() {
            return Err(CoreError::EmptyPurchase);
        }
        for item in &self.items {
            if item.quantity <= 0 {
                return Err(ValidationError::MustBePositive {
                    field: "quantity".to_string(),
                }
                .into());
            }
            if item.unit_cost.is_negative() {
                return Err(ValidationError::MustBePositive {
                    field: "unit_cost".to_string(),
                }
                .into());
            }
        }
        if self.perceptions.is_negative() {
            return Err(ValidationError::MustBePositive {
                field: "perceptions".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Net, IVA and total.
    ///
    /// Only type A vouchers itemize IVA; on B/C/X vouchers the cost typed
    /// in is the whole amount and the IVA column is zero.
    ///
    /// ## Example
    /// ```rust,ignore
    /// // 10 × $100.00 at 21% + 2 × $50.00 at 10.5% + $30.00 perceptions
    /// let totals = draft.totals();
    /// assert_eq!(totals.net.cents(), 110_000);
    /// assert_eq!(totals.tax.cents(), 21_000 + 1_050);
    /// assert_eq!(totals.total.cents(), 110_000 + 22_050 + 3_000);
    /// ```
    pub fn totals(&self) -> PurchaseTotals {
        let itemizes = self.voucher_type.discriminates_iva();
        let mut by_rate: BTreeMap<TaxRate, (Money, Money)> = BTreeMap::new();

        for item in &self.items {
            let net = item.unit_cost.multiply_quantity(item.quantity);
            let entry = by_rate.entry(item.tax_rate).or_default();
            entry.0 += net;
        }

        // IVA per rate group, the way the voucher prints it
        let tax_breakdown: Vec<TaxBreakdown> = by_rate
            .into_iter()
            .map(|(rate, (taxable, _))| TaxBreakdown {
                rate,
                taxable,
                tax: if itemizes { taxable.tax_on_top(rate) } else { Money::zero() },
            })
            .collect();

        let net: Money = tax_breakdown.iter().map(|b| b.taxable).sum();
        let tax: Money = tax_breakdown.iter().map(|b| b.tax).sum();

        PurchaseTotals {
            net,
            tax,
            perceptions: self.perceptions,
            total: net + tax + self.perceptions,
            tax_breakdown: if itemizes { tax_breakdown } else { Vec::new() },
        }
    }
}

// =============================================================================
// Plan
// =============================================================================

/// New cost for a product after a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CostUpdate {
    pub product_id: String,
    pub cost_cents: i64,
}

/// Insert-ready rows for one supplier voucher.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchasePlan {
    pub purchase: Purchase,
    pub items: Vec<PurchaseItem>,
    pub stock_movements: Vec<StockMovement>,
    pub cost_updates: Vec<CostUpdate>,
    pub totals: PurchaseTotals,
}

/// Validates a draft and builds the rows to insert.
///
/// Credit notes take stock back out; everything else adds it.
pub fn build_purchase(draft: &PurchaseDraft, organization_id: &str, now: DateTime<Utc>) -> CoreResult<PurchasePlan> {
    draft.validate()?;

    let totals = draft.totals();
    let itemizes = draft.voucher_type.discriminates_iva();
    let purchase_id = Uuid::new_v4().to_string();
    let is_credit_note = draft.voucher_type.is_credit_note();

    let purchase = Purchase {
        id: purchase_id.clone(),
        organization_id: organization_id.to_string(),
        supplier_id: draft.supplier_id.clone(),
        purchase_order_id: draft.purchase_order_id.clone(),
        voucher_type: draft.voucher_type,
        point_of_sale_number: draft.point_of_sale_number,
        voucher_number: draft.voucher_number,
        issue_date: draft.issue_date,
        net_cents: totals.net.cents(),
        tax_cents: totals.tax.cents(),
        perceptions_cents: totals.perceptions.cents(),
        total_cents: totals.total.cents(),
        paid_cents: 0,
        status: PurchaseStatus::Pending,
        notes: draft.notes.clone(),
        created_at: now,
    };

    let items = draft
        .items
        .iter()
        .map(|line| {
            let net = line.unit_cost.multiply_quantity(line.quantity);
            PurchaseItem {
                id: Uuid::new_v4().to_string(),
                purchase_id: purchase_id.clone(),
                product_id: line.product_id.clone(),
                quantity: line.quantity,
                unit_cost_cents: line.unit_cost.cents(),
                tax_rate_bps: line.tax_rate.bps(),
                net_cents: net.cents(),
                tax_cents: if itemizes { net.tax_on_top(line.tax_rate).cents() } else { 0 },
                created_at: now,
            }
        })
        .collect();

    let stock_movements = draft
        .items
        .iter()
        .map(|line| StockMovement {
            product_id: line.product_id.clone(),
            delta: if is_credit_note { -line.quantity } else { line.quantity },
        })
        .collect();

    // Last line wins when a product appears twice
    let mut costs: BTreeMap<&str, i64> = BTreeMap::new();
    if !is_credit_note {
        for line in &draft.items {
            costs.insert(line.product_id.as_str(), line.unit_cost.cents());
        }
    }
    let cost_updates = costs
        .into_iter()
        .map(|(product_id, cost_cents)| CostUpdate {
            product_id: product_id.to_string(),
            cost_cents,
        })
        .collect();

    Ok(PurchasePlan {
        purchase,
        items,
        stock_movements,
        cost_updates,
        totals,
    })
}

// =============================================================================
// Supplier Payments
// =============================================================================

/// How a supplier payment was spread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AllocationResult {
    /// `(purchase_id, amount)` in application order.
    pub applied: Vec<(String, Money)>,
    /// Left over as supplier credit.
    pub unallocated: Money,
}

/// Applies `amount` to outstanding purchases, oldest first.
///
/// Cancelled or fully paid purchases and credit notes are skipped. Order is issue date,
/// then registration time.
pub fn allocate_payment(amount: Money, purchases: &[Purchase]) -> AllocationResult {
    let mut outstanding: Vec<&Purchase> = purchases
        .iter()
        .filter(|p| {
            p.status != PurchaseStatus::Cancelled && !p.voucher_type.is_credit_note() && p.balance().is_positive()
        })
        .collect();
    outstanding.sort_by(|a, b| a.issue_date.cmp(&b.issue_date).then(a.created_at.cmp(&b.created_at)));

    let mut left = amount.non_negative();
    let mut applied = Vec::new();

    for purchase in outstanding {
        if left.is_zero() {
            break;
        }
        let share = left.min(purchase.balance());
        applied.push((purchase.id.clone(), share));
        left -= share;
    }

    AllocationResult {
        applied,
        unallocated: left,
    }
}

/// New paid amount and status of a purchase touched by a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchasePaymentUpdate {
    pub purchase_id: String,
    pub paid_cents: i64,
    pub status: PurchaseStatus,
}

/// Insert-ready rows for a supplier payment.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SupplierPaymentPlan {
    pub payment: SupplierPayment,
    pub allocations: Vec<PaymentAllocation>,
    pub purchase_updates: Vec<PurchasePaymentUpdate>,
}

/// Input for [`plan_supplier_payment`].
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SupplierPaymentInput {
    pub supplier_id: String,
    pub method: PaymentMethod,
    pub amount: Money,
    pub reference: Option<String>,
}

/// Builds the payment, its allocations and the purchase balance updates.
pub fn plan_supplier_payment(
    input: &SupplierPaymentInput,
    organization_id: &str,
    purchases: &[Purchase],
    now: DateTime<Utc>,
) -> CoreResult<SupplierPaymentPlan> {
    if !input.amount.is_positive() {
        return Err(CoreError::InvalidPaymentAmount {
            reason: "amount must be positive".to_string(),
        });
    }

    let own: Vec<Purchase> = purchases
        .iter()
        .filter(|p| p.supplier_id == input.supplier_id)
        .cloned()
        .collect();
    let result = allocate_payment(input.amount, &own);
    let payment_id = Uuid::new_v4().to_string();

    let mut allocations = Vec::with_capacity(result.applied.len());
    let mut purchase_updates = Vec::with_capacity(result.applied.len());

    for (purchase_id, amount) in &result.applied {
        allocations.push(PaymentAllocation {
            id: Uuid::new_v4().to_string(),
            supplier_payment_id: payment_id.clone(),
            purchase_id: purchase_id.clone(),
            amount_cents: amount.cents(),
            created_at: now,
        });

        if let Some(purchase) = own.iter().find(|p| &p.id == purchase_id) {
            let paid = Money::from_cents(purchase.paid_cents) + *amount;
            purchase_updates.push(PurchasePaymentUpdate {
                purchase_id: purchase_id.clone(),
                paid_cents: paid.cents(),
                status: PurchaseStatus::from_paid(paid, Money::from_cents(purchase.total_cents)),
            });
        }
    }

    Ok(SupplierPaymentPlan {
        payment: SupplierPayment {
            id: payment_id,
            organization_id: organization_id.to_string(),
            supplier_id: input.supplier_id.clone(),
            method: input.method,
            amount_cents: input.amount.cents(),
            unallocated_cents: result.unallocated.cents(),
            reference: input.reference.clone(),
            paid_at: now,
        },
        allocations,
        purchase_updates,
    })
}

// =============================================================================
// Credit Notes
// =============================================================================

/// Rows written when credit notes are netted against open vouchers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreditNettingPlan {
    pub applications: Vec<CreditApplication>,
    /// New applied/paid amounts for both sides of every application.
    pub purchase_updates: Vec<PurchasePaymentUpdate>,
}

impl CreditNettingPlan {
    pub fn is_empty(&self) -> bool {
        self.applications.is_empty()
    }
}

fn oldest_first(a: &&Purchase, b: &&Purchase) -> std::cmp::Ordering {
    a.issue_date.cmp(&b.issue_date).then(a.created_at.cmp(&b.created_at))
}

/// Applies the unapplied balance of a supplier's credit notes to its open
/// invoices and debit notes, both oldest first.
///
/// `vouchers` are the supplier's open vouchers of every type; cancelled
/// or settled ones are ignored.
///
/// ## Example
/// ```text
/// FA 00002-00000001  $1,210.00 open
/// NC 00002-00000003  $  605.00 open
///   ──► FA paid $605.00 (partially paid), NC applied $605.00 (paid)
/// ```
pub fn net_credit_notes(vouchers: &[Purchase], now: DateTime<Utc>) -> CreditNettingPlan {
    let open: Vec<&Purchase> = vouchers
        .iter()
        .filter(|p| p.status != PurchaseStatus::Cancelled && p.balance().is_positive())
        .collect();

    let mut credits: Vec<&Purchase> = open.iter().copied().filter(|p| p.voucher_type.is_credit_note()).collect();
    let mut debts: Vec<&Purchase> = open.iter().copied().filter(|p| !p.voucher_type.is_credit_note()).collect();
    credits.sort_by(oldest_first);
    debts.sort_by(oldest_first);

    let mut credit_applied = vec![Money::zero(); credits.len()];
    let mut debt_applied = vec![Money::zero(); debts.len()];
    let mut applications = Vec::new();
    let mut d = 0;

    for (c, credit) in credits.iter().enumerate() {
        while d < debts.len() {
            let credit_left = credit.balance() - credit_applied[c];
            if !credit_left.is_positive() {
                break;
            }
            let debt_left = debts[d].balance() - debt_applied[d];
            let share = credit_left.min(debt_left);

            applications.push(CreditApplication {
                id: Uuid::new_v4().to_string(),
                credit_note_id: credit.id.clone(),
                purchase_id: debts[d].id.clone(),
                amount_cents: share.cents(),
                created_at: now,
            });
            credit_applied[c] += share;
            debt_applied[d] += share;

            if debt_applied[d] >= debts[d].balance() {
                d += 1;
            }
        }
    }

    let purchase_updates = credits
        .iter()
        .zip(&credit_applied)
        .chain(debts.iter().zip(&debt_applied))
        .filter(|(_, applied)| applied.is_positive())
        .map(|(purchase, applied)| {
            let paid = Money::from_cents(purchase.paid_cents) + *applied;
            PurchasePaymentUpdate {
                purchase_id: purchase.id.clone(),
                paid_cents: paid.cents(),
                status: PurchaseStatus::from_paid(paid, Money::from_cents(purchase.total_cents)),
            }
        })
        .collect();

    CreditNettingPlan {
        applications,
        purchase_updates,
    }
}
