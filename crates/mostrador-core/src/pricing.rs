//! # Pricing
//!
//! Cart arithmetic: item discounts, the global discount, IVA and totals.
//!
//! ## Order of Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  for each line:                                                         │
//! │    subtotal      = unit_price × quantity                                │
//! │    item_discount = discount on subtotal, clamped to [0, subtotal]       │
//! │    after_item    = subtotal - item_discount                             │
//! │                                                                         │
//! │  global_discount = discount on Σ after_item                             │
//! │                    capped at policy.max_global_discount_bps             │
//! │                    split over lines by largest remainder                │
//! │                                                                         │
//! │  for each line:                                                         │
//! │    net   = after_item - global share                                    │
//! │    tax   = Inclusive: net × r / (1 + r)    total = net                  │
//! │            Exclusive: net × r              total = net + tax            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything is integer cents. Rounding is half away from zero, once per
//! line, so the cart total is always the sum of the line totals.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::TaxRate;
use crate::FULL_BPS;

// =============================================================================
// Policy
// =============================================================================

/// Whether catalog prices already contain IVA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TaxMode {
    /// Shelf price includes IVA (retail default).
    #[default]
    Inclusive,
    /// IVA is added on top of the price.
    Exclusive,
}

/// Store-level pricing rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricingPolicy {
    pub tax_mode: TaxMode,
    /// Upper bound for the global discount, in basis points.
    pub max_global_discount_bps: u32,
    /// False for Monotributo/Exento issuers, who never itemize IVA.
    pub charges_iva: bool,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        PricingPolicy {
            tax_mode: TaxMode::Inclusive,
            max_global_discount_bps: FULL_BPS,
            charges_iva: true,
        }
    }
}

// =============================================================================
// Discount
// =============================================================================

/// A discount on a line or on the whole cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Discount {
    /// Basis points (1000 = 10%).
    Percentage(u32),
    /// Fixed amount off.
    Fixed(Money),
}

impl Discount {
    /// Rejects discounts that cannot be entered at the counter.
    pub fn validate(&self) -> CoreResult<()> {
        match self {
            Discount::Percentage(bps) if *bps > FULL_BPS => Err(CoreError::InvalidDiscount {
                reason: "percentage cannot exceed 100%".to_string(),
            }),
            Discount::Fixed(amount) if amount.is_negative() => Err(CoreError::InvalidDiscount {
                reason: "amount cannot be negative".to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Amount this discount takes off `base`, clamped to `[0, base]`.
    ///
    /// ## Example
    /// ```rust
    /// use mostrador_core::money::Money;
    /// use mostrador_core::pricing::Discount;
    ///
    /// let base = Money::from_cents(5_000);
    /// assert_eq!(Discount::Percentage(1000).amount_on(base).cents(), 500);
    /// assert_eq!(Discount::Fixed(Money::from_cents(9_999)).amount_on(base), base);
    /// ```
    pub fn amount_on(&self, base: Money) -> Money {
        if !base.is_positive() {
            return Money::zero();
        }
        let raw = match self {
            Discount::Percentage(bps) => base.percentage((*bps).min(FULL_BPS)),
            Discount::Fixed(amount) => *amount,
        };
        raw.non_negative().min(base)
    }
}

// =============================================================================
// Input / Output
// =============================================================================

/// One line as far as pricing is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingLine {
    pub unit_price: Money,
    pub quantity: i64,
    pub tax_rate: TaxRate,
    pub discount: Option<Discount>,
}

/// Computed amounts for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineTotals {
    pub subtotal: Money,
    pub item_discount: Money,
    /// This line's share of the global discount.
    pub global_discount: Money,
    /// After both discounts.
    pub net: Money,
    pub tax: Money,
    pub total: Money,
}

/// IVA grouped by rate, for vouchers that itemize it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxBreakdown {
    pub rate: TaxRate,
    /// Taxable base (excluding IVA).
    pub taxable: Money,
    pub tax: Money,
}

/// Computed amounts for a whole cart.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartTotals {
    pub item_count: usize,
    pub total_quantity: i64,
    pub subtotal: Money,
    pub item_discount: Money,
    pub global_discount: Money,
    /// The requested global discount was reduced to the policy maximum.
    pub global_discount_capped: bool,
    pub net: Money,
    pub tax: Money,
    pub total: Money,
    pub lines: Vec<LineTotals>,
    pub tax_breakdown: Vec<TaxBreakdown>,
}

// =============================================================================
// Computation
// =============================================================================

/// Prices a cart.
///
/// ## Arguments
/// * `lines` - Cart lines in display order
/// * `global` - Optional discount on the whole cart
/// * `policy` - Tax mode and discount cap
///
/// ## Example
/// ```rust
/// use mostrador_core::money::Money;
/// use mostrador_core::pricing::{price_lines, PricingLine, PricingPolicy};
/// use mostrador_core::types::TaxRate;
///
/// let lines = vec![PricingLine {
///     unit_price: Money::from_cents(12_100),
///     quantity: 1,
///     tax_rate: TaxRate::IVA_GENERAL,
///     discount: None,
/// }];
/// let totals = price_lines(&lines, None, &PricingPolicy::default());
/// assert_eq!(totals.total.cents(), 12_100);
/// assert_eq!(totals.tax.cents(), 2_100);
/// ```
pub fn price_lines(lines: &[PricingLine], global: Option<Discount>, policy: &PricingPolicy) -> CartTotals {
    let mut computed: Vec<LineTotals> = lines
        .iter()
        .map(|line| {
            let subtotal = line.unit_price.multiply_quantity(line.quantity).non_negative();
            let item_discount = line
                .discount
                .map(|d| d.amount_on(subtotal))
                .unwrap_or_default();
            LineTotals {
                subtotal,
                item_discount,
                net: subtotal - item_discount,
                ..LineTotals::default()
            }
        })
        .collect();

    let after_items: Money = computed.iter().map(|l| l.net).sum();
    let (global_discount, global_discount_capped) = global_discount_amount(after_items, global, policy);

    let weights: Vec<Money> = computed.iter().map(|l| l.net).collect();
    let shares = global_discount.allocate_proportionally(&weights);

    for ((totals, share), line) in computed.iter_mut().zip(shares).zip(lines) {
        totals.global_discount = share;
        totals.net = totals.net - share;
        totals.tax = line_tax(totals.net, line.tax_rate, policy);
        totals.total = match policy.tax_mode {
            TaxMode::Inclusive => totals.net,
            TaxMode::Exclusive => totals.net + totals.tax,
        };
    }

    let tax_breakdown = breakdown(&computed, lines, policy);

    CartTotals {
        item_count: lines.len(),
        total_quantity: lines.iter().map(|l| l.quantity).sum(),
        subtotal: computed.iter().map(|l| l.subtotal).sum(),
        item_discount: computed.iter().map(|l| l.item_discount).sum(),
        global_discount,
        global_discount_capped,
        net: computed.iter().map(|l| l.net).sum(),
        tax: computed.iter().map(|l| l.tax).sum(),
        total: computed.iter().map(|l| l.total).sum(),
        lines: computed,
        tax_breakdown,
    }
}

/// Global discount amount on `base`, and whether the cap kicked in.
fn global_discount_amount(base: Money, global: Option<Discount>, policy: &PricingPolicy) -> (Money, bool) {
    let Some(discount) = global else {
        return (Money::zero(), false);
    };

    let max_bps = policy.max_global_discount_bps.min(FULL_BPS);
    let requested = discount.amount_on(base);
    let ceiling = base.percentage(max_bps);

    if requested > ceiling {
        (ceiling, true)
    } else {
        (requested, false)
    }
}

fn line_tax(net: Money, rate: TaxRate, policy: &PricingPolicy) -> Money {
    if !policy.charges_iva {
        return Money::zero();
    }
    match policy.tax_mode {
        TaxMode::Inclusive => net.tax_included(rate),
        TaxMode::Exclusive => net.tax_on_top(rate),
    }
}

fn breakdown(computed: &[LineTotals], lines: &[PricingLine], policy: &PricingPolicy) -> Vec<TaxBreakdown> {
    if !policy.charges_iva {
        return Vec::new();
    }

    let mut by_rate: BTreeMap<TaxRate, (Money, Money)> = BTreeMap::new();
    for (totals, line) in computed.iter().zip(lines) {
        let taxable = match policy.tax_mode {
            TaxMode::Inclusive => totals.net - totals.tax,
            TaxMode::Exclusive => totals.net,
        };
        let entry = by_rate.entry(line.tax_rate).or_default();
        entry.0 += taxable;
        entry.1 += totals.tax;
    }

    by_rate
        .into_iter()
        .map(|(rate, (taxable, tax))| TaxBreakdown { rate, taxable, tax })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: i64, qty: i64, discount: Option<Discount>) -> PricingLine {
        PricingLine {
            unit_price: Money::from_cents(price),
            quantity: qty,
            tax_rate: TaxRate::zero(),
            discount,
        }
    }

    fn no_cap() -> PricingPolicy {
        PricingPolicy::default()
    }

    #[test]
    fn test_no_discounts_total_is_price_times_quantity() {
        let lines = vec![line(1_050, 3, None), line(299, 7, None), line(10_000, 1, None)];
        let totals = price_lines(&lines, None, &no_cap());

        assert_eq!(totals.total.cents(), 1_050 * 3 + 299 * 7 + 10_000);
        assert_eq!(totals.subtotal, totals.total);
        assert_eq!(totals.item_count, 3);
        assert_eq!(totals.total_quantity, 11);
    }

    #[test]
    fn test_reference_example_162() {
        let lines = vec![line(10_000, 2, Some(Discount::Percentage(1000)))];

        let item_only = price_lines(&lines, None, &no_cap());
        assert_eq!(item_only.total.cents(), 18_000);

        let both = price_lines(&lines, Some(Discount::Percentage(1000)), &no_cap());
        assert_eq!(both.item_discount.cents(), 2_000);
        assert_eq!(both.global_discount.cents(), 1_800);
        assert_eq!(both.total.cents(), 16_200);
    }

    #[test]
    fn test_percentage_item_discount_is_exact() {
        for bps in [0, 250, 1000, 3333, 5000, 10_000] {
            let lines = vec![line(7_777, 3, Some(Discount::Percentage(bps)))];
            let totals = price_lines(&lines, None, &no_cap());
            let subtotal = Money::from_cents(7_777 * 3);
            assert_eq!(totals.item_discount, subtotal.percentage(bps));
            assert!(!totals.total.is_negative());
        }
    }

    #[test]
    fn test_percentage_over_100_clamps_to_zero_total() {
        let lines = vec![line(1_000, 1, Some(Discount::Percentage(15_000)))];
        let totals = price_lines(&lines, None, &no_cap());
        assert_eq!(totals.total, Money::zero());
    }

    #[test]
    fn test_fixed_item_discount_never_below_zero() {
        let lines = vec![
            line(500, 2, Some(Discount::Fixed(Money::from_cents(5_000)))),
            line(1_000, 1, None),
        ];
        let totals = price_lines(&lines, None, &no_cap());

        assert_eq!(totals.lines[0].item_discount.cents(), 1_000);
        assert_eq!(totals.lines[0].total, Money::zero());
        assert_eq!(totals.total.cents(), 1_000);
    }

    #[test]
    fn test_global_discount_uses_post_item_subtotal() {
        let lines = vec![line(10_000, 1, Some(Discount::Fixed(Money::from_cents(4_000))))];
        let totals = price_lines(&lines, Some(Discount::Percentage(5000)), &no_cap());

        // 50% of 60.00, not of 100.00
        assert_eq!(totals.global_discount.cents(), 3_000);
        assert_eq!(totals.total.cents(), 3_000);
    }

    #[test]
    fn test_global_discount_capped_by_policy() {
        let policy = PricingPolicy {
            max_global_discount_bps: 1500,
            ..PricingPolicy::default()
        };
        let lines = vec![line(10_000, 1, None)];

        let pct = price_lines(&lines, Some(Discount::Percentage(3000)), &policy);
        assert!(pct.global_discount_capped);
        assert_eq!(pct.global_discount.cents(), 1_500);

        let fixed = price_lines(&lines, Some(Discount::Fixed(Money::from_cents(2_000))), &policy);
        assert!(fixed.global_discount_capped);
        assert_eq!(fixed.global_discount.cents(), 1_500);

        let within = price_lines(&lines, Some(Discount::Percentage(1000)), &policy);
        assert!(!within.global_discount_capped);
        assert_eq!(within.global_discount.cents(), 1_000);
    }

    #[test]
    fn test_fixed_global_discount_clamped_to_cart() {
        let lines = vec![line(1_000, 1, None)];
        let totals = price_lines(&lines, Some(Discount::Fixed(Money::from_cents(50_000))), &no_cap());
        assert_eq!(totals.global_discount.cents(), 1_000);
        assert_eq!(totals.total, Money::zero());
    }

    #[test]
    fn test_global_shares_sum_exactly() {
        let lines = vec![line(333, 1, None), line(333, 1, None), line(334, 1, None)];
        let totals = price_lines(&lines, Some(Discount::Fixed(Money::from_cents(100))), &no_cap());

        let shares: Money = totals.lines.iter().map(|l| l.global_discount).sum();
        assert_eq!(shares.cents(), 100);
        assert_eq!(totals.total.cents(), 900);
    }

    #[test]
    fn test_inclusive_tax_is_contained_in_total() {
        let lines = vec![PricingLine {
            unit_price: Money::from_cents(12_100),
            quantity: 2,
            tax_rate: TaxRate::IVA_GENERAL,
            discount: None,
        }];
        let totals = price_lines(&lines, None, &no_cap());

        assert_eq!(totals.total.cents(), 24_200);
        assert_eq!(totals.tax.cents(), 4_200);
        assert_eq!(totals.tax_breakdown.len(), 1);
        assert_eq!(totals.tax_breakdown[0].taxable.cents(), 20_000);
    }

    #[test]
    fn test_exclusive_tax_added_on_top() {
        let policy = PricingPolicy {
            tax_mode: TaxMode::Exclusive,
            ..PricingPolicy::default()
        };
        let lines = vec![
            PricingLine {
                unit_price: Money::from_cents(10_000),
                quantity: 1,
                tax_rate: TaxRate::IVA_GENERAL,
                discount: None,
            },
            PricingLine {
                unit_price: Money::from_cents(10_000),
                quantity: 1,
                tax_rate: TaxRate::IVA_REDUCED,
                discount: None,
            },
        ];
        let totals = price_lines(&lines, None, &policy);

        assert_eq!(totals.tax.cents(), 2_100 + 1_050);
        assert_eq!(totals.total.cents(), 23_150);
        // Sorted by rate
        assert_eq!(totals.tax_breakdown[0].rate, TaxRate::IVA_REDUCED);
        assert_eq!(totals.tax_breakdown[1].rate, TaxRate::IVA_GENERAL);
    }

    #[test]
    fn test_monotributo_charges_no_iva() {
        let policy = PricingPolicy {
            charges_iva: false,
            tax_mode: TaxMode::Exclusive,
            ..PricingPolicy::default()
        };
        let lines = vec![PricingLine {
            unit_price: Money::from_cents(10_000),
            quantity: 1,
            tax_rate: TaxRate::IVA_GENERAL,
            discount: None,
        }];
        let totals = price_lines(&lines, None, &policy);

        assert_eq!(totals.tax, Money::zero());
        assert_eq!(totals.total.cents(), 10_000);
        assert!(totals.tax_breakdown.is_empty());
    }

    #[test]
    fn test_empty_cart() {
        let totals = price_lines(&[], Some(Discount::Percentage(1000)), &no_cap());
        assert_eq!(totals.total, Money::zero());
        assert_eq!(totals.global_discount, Money::zero());
        assert!(!totals.global_discount_capped);
    }

    #[test]
    fn test_discount_validation() {
        assert!(Discount::Percentage(10_000).validate().is_ok());
        assert!(Discount::Percentage(10_001).validate().is_err());
        assert!(Discount::Fixed(Money::from_cents(-1)).validate().is_err());
    }
}
