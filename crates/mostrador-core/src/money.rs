//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌                                  │
//! │                                                                         │
//! │  A split payment of $100.00 in three parts compared with `==` fails    │
//! │  on the last centavo, so the old UI compared with an epsilon of 0.01.  │
//! │                                                                         │
//! │  OUR SOLUTION: Integer centavos                                         │
//! │    10000 / 3 = 3333 (×3 = 9999) → we KNOW one centavo is missing and   │
//! │    allocate it explicitly (see `allocate_proportionally`).             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use mostrador_core::money::Money;
//!
//! let price = Money::from_cents(1099); // $10.99
//! let doubled = price * 2;             // $21.98
//! let total = price + Money::from_cents(500);
//! assert_eq!(total.cents(), 1599);
//! assert_eq!(doubled.cents(), 2198);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::types::TaxRate;
use crate::FULL_BPS;

/// Represents a monetary value in centavos (the smallest currency unit).
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for credit notes and deltas
/// - **Single field tuple struct**: Zero-cost abstraction over i64
///
/// ## Where Money is Used
/// ```text
/// Product.price_cents ──► CartItem.unit_price ──► line subtotal
///                                                      │
///                        item discount ◄───────────────┤
///                        global discount share ◄───────┤
///                        IVA ◄─────────────────────────┘
///                                                      │
///                        Cart total ──► split payments ─┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use mostrador_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from pesos and centavos.
    ///
    /// ## Example
    /// ```rust
    /// use mostrador_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
    /// assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    /// ```
    ///
    /// ## Note
    /// For negative amounts only the major unit carries the sign.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole pesos portion.
    #[inline]
    pub const fn units(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the centavos portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Clamps negative values to zero.
    ///
    /// ## Example
    /// ```rust
    /// use mostrador_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(-30).non_negative(), Money::zero());
    /// assert_eq!(Money::from_cents(30).non_negative().cents(), 30);
    /// ```
    #[inline]
    pub fn non_negative(self) -> Self {
        self.max(Money::zero())
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use mostrador_core::money::Money;
    ///
    /// let line_total = Money::from_cents(299).multiply_quantity(3);
    /// assert_eq!(line_total.cents(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Returns `bps` basis points of this amount, rounded half away from zero.
    ///
    /// ## Example
    /// ```rust
    /// use mostrador_core::money::Money;
    ///
    /// let subtotal = Money::from_cents(20_000);
    /// assert_eq!(subtotal.percentage(1000).cents(), 2_000); // 10%
    /// assert_eq!(Money::from_cents(5).percentage(5000).cents(), 3); // 2.5 → 3
    /// ```
    pub fn percentage(&self, bps: u32) -> Money {
        Money(round_div(self.0 as i128 * bps as i128, FULL_BPS as i128) as i64)
    }

    /// Applies a percentage discount and returns the discounted amount.
    ///
    /// ## Example
    /// ```rust
    /// use mostrador_core::money::Money;
    ///
    /// let discounted = Money::from_cents(10_000).apply_percentage_discount(1000);
    /// assert_eq!(discounted.cents(), 9_000);
    /// ```
    pub fn apply_percentage_discount(&self, discount_bps: u32) -> Money {
        *self - self.percentage(discount_bps)
    }

    /// IVA to add on top of a net amount (price excludes tax).
    ///
    /// ## Example
    /// ```rust
    /// use mostrador_core::money::Money;
    /// use mostrador_core::types::TaxRate;
    ///
    /// let tax = Money::from_cents(10_000).tax_on_top(TaxRate::from_bps(2100));
    /// assert_eq!(tax.cents(), 2_100);
    /// ```
    pub fn tax_on_top(&self, rate: TaxRate) -> Money {
        self.percentage(rate.bps())
    }

    /// IVA already contained in a gross amount (price includes tax).
    ///
    /// `tax = gross × r / (1 + r)`
    ///
    /// ## Example
    /// ```rust
    /// use mostrador_core::money::Money;
    /// use mostrador_core::types::TaxRate;
    ///
    /// // $121.00 with 21% IVA included contains $21.00 of tax
    /// let tax = Money::from_cents(12_100).tax_included(TaxRate::from_bps(2100));
    /// assert_eq!(tax.cents(), 2_100);
    /// ```
    pub fn tax_included(&self, rate: TaxRate) -> Money {
        if rate.is_zero() {
            return Money::zero();
        }
        let numerator = self.0 as i128 * rate.bps() as i128;
        let denominator = FULL_BPS as i128 + rate.bps() as i128;
        Money(round_div(numerator, denominator) as i64)
    }

    /// Splits `self` over `weights` proportionally, largest remainder first.
    ///
    /// The returned shares always sum to `self`. Zero or negative weights
    /// receive nothing; if every weight is zero every share is zero.
    ///
    /// ## Example
    /// ```rust
    /// use mostrador_core::money::Money;
    ///
    /// let shares = Money::from_cents(100).allocate_proportionally(&[
    ///     Money::from_cents(1),
    ///     Money::from_cents(1),
    ///     Money::from_cents(1),
    /// ]);
    /// let cents: Vec<i64> = shares.iter().map(|m| m.cents()).collect();
    /// assert_eq!(cents, vec![34, 33, 33]);
    /// ```
    pub fn allocate_proportionally(&self, weights: &[Money]) -> Vec<Money> {
        let total_weight: i128 = weights.iter().map(|w| w.0.max(0) as i128).sum();
        if total_weight == 0 {
            return vec![Money::zero(); weights.len()];
        }

        let amount = self.0 as i128;
        let mut shares: Vec<i128> = Vec::with_capacity(weights.len());
        let mut remainders: Vec<(usize, i128)> = Vec::with_capacity(weights.len());

        for (index, weight) in weights.iter().enumerate() {
            let weight = weight.0.max(0) as i128;
            let product = amount * weight;
            shares.push(product / total_weight);
            remainders.push((index, (product % total_weight).abs()));
        }

        let allocated: i128 = shares.iter().sum();
        let mut leftover = amount - allocated;
        let step: i128 = if leftover >= 0 { 1 } else { -1 };

        // Stable sort keeps earlier lines first on equal remainders
        remainders.sort_by(|a, b| b.1.cmp(&a.1));
        for (index, _) in remainders.iter().filter(|(i, _)| weights[*i].0 > 0) {
            if leftover == 0 {
                break;
            }
            shares[*index] += step;
            leftover -= step;
        }

        shares.into_iter().map(|s| Money(s as i64)).collect()
    }
}

/// Integer division rounding half away from zero.
fn round_div(numerator: i128, denominator: i128) -> i128 {
    let half = denominator / 2;
    if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        (numerator - half) / denominator
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-friendly display. Localised formatting belongs to the UI.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, self.units().abs(), self.cents_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i32> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i32) -> Self {
        Money(self.0 * qty as i64)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
