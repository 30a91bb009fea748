//! # Split Payments
//!
//! Reconciles several partial payments against a sale total.
//!
//! ## Example Flow
//! ```text
//! total $1,000.00
//!   + debit card  $600.00   remaining $400.00
//!   + cash        $500.00   applied $400.00, change $100.00
//!                           remaining $0.00  ──► complete
//! ```
//!
//! A payment larger than the remaining balance is rejected, except cash,
//! which is applied up to the balance and returns change. The split is
//! complete when the remaining balance is within [`PAYMENT_TOLERANCE`].

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::PaymentMethod;
use crate::PAYMENT_TOLERANCE;

/// One payment in a split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SplitEntry {
    pub method: PaymentMethod,
    /// Amount applied to the sale.
    pub amount: Money,
    /// Cash handed over, when above `amount`.
    pub tendered: Option<Money>,
    pub reference: Option<String>,
}

impl SplitEntry {
    /// Change returned to the customer.
    pub fn change(&self) -> Money {
        self.tendered
            .map(|t| (t - self.amount).non_negative())
            .unwrap_or_default()
    }
}

/// A payment as entered by the cashier, before reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentInput {
    pub method: PaymentMethod,
    pub amount: Money,
    pub reference: Option<String>,
}

/// Running reconciliation of payments against a total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentSplit {
    total: Money,
    entries: Vec<SplitEntry>,
}

impl PaymentSplit {
    pub fn new(total: Money) -> Self {
        PaymentSplit {
            total,
            entries: Vec::new(),
        }
    }

    /// Replays entered payments in order; the first invalid one fails.
    pub fn from_inputs(total: Money, inputs: &[PaymentInput]) -> CoreResult<Self> {
        let mut split = PaymentSplit::new(total);
        for input in inputs {
            split.add(input.method, input.amount, input.reference.clone())?;
        }
        Ok(split)
    }

    #[inline]
    pub fn total(&self) -> Money {
        self.total
    }

    pub fn entries(&self) -> &[SplitEntry] {
        &self.entries
    }

    /// Σ applied amounts.
    pub fn paid(&self) -> Money {
        self.entries.iter().map(|e| e.amount).sum()
    }

    /// What is still owed. Never negative.
    pub fn remaining(&self) -> Money {
        (self.total - self.paid()).non_negative()
    }

    /// Total change to hand back.
    pub fn change_due(&self) -> Money {
        self.entries.iter().map(SplitEntry::change).sum()
    }

    /// Paid amount is within one cent of the total.
    pub fn is_complete(&self) -> bool {
        (self.total - self.paid()).abs() <= PAYMENT_TOLERANCE
    }

    /// Records a payment.
    ///
    /// ## Errors
    /// - `InvalidPaymentAmount` if `amount` is not positive
    /// - `PaymentExceedsRemaining` if a non-cash payment is above the
    ///   remaining balance, or anything is added once the split is complete
    ///
    /// ## Example
    /// ```rust
    /// use mostrador_core::money::Money;
    /// use mostrador_core::split::PaymentSplit;
    /// use mostrador_core::types::PaymentMethod;
    ///
    /// let mut split = PaymentSplit::new(Money::from_cents(16_200));
    /// split.add(PaymentMethod::DebitCard, Money::from_cents(10_000), None).unwrap();
    /// assert!(split.add(PaymentMethod::CreditCard, Money::from_cents(9_000), None).is_err());
    ///
    /// let cash = split.add(PaymentMethod::Cash, Money::from_cents(10_000), None).unwrap();
    /// assert_eq!(cash.change().cents(), 3_800);
    /// assert!(split.is_complete());
    /// ```
    pub fn add(&mut self, method: PaymentMethod, amount: Money, reference: Option<String>) -> CoreResult<&SplitEntry> {
        if !amount.is_positive() {
            return Err(CoreError::InvalidPaymentAmount {
                reason: "amount must be positive".to_string(),
            });
        }

        let remaining = self.remaining();
        if self.is_complete() {
            return Err(CoreError::PaymentExceedsRemaining { amount, remaining });
        }

        let entry = if amount <= remaining + PAYMENT_TOLERANCE {
            SplitEntry {
                method,
                amount,
                tendered: None,
                reference,
            }
        } else if method.allows_change() {
            SplitEntry {
                method,
                amount: remaining,
                tendered: Some(amount),
                reference,
            }
        } else {
            return Err(CoreError::PaymentExceedsRemaining { amount, remaining });
        };

        self.entries.push(entry);
        Ok(&self.entries[self.entries.len() - 1])
    }

    /// Removes the payment at `index`.
    pub fn remove(&mut self, index: usize) -> CoreResult<SplitEntry> {
        if index >= self.entries.len() {
            return Err(CoreError::PaymentNotFound(index));
        }
        Ok(self.entries.remove(index))
    }

    /// Fails unless the payments cover the total.
    pub fn ensure_complete(&self) -> CoreResult<()> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(CoreError::PaymentsUnbalanced {
                paid: self.paid(),
                total: self.total,
            })
        }
    }

    pub fn into_entries(self) -> Vec<SplitEntry> {
        self.entries
    }
}
