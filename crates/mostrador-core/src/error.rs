//! # Error Types
//!
//! Domain-specific error types for mostrador-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  mostrador-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  mostrador-db errors (separate crate)                                  │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  Backoffice errors (in app)                                            │
//! │  └── ApiError         - What the UI toast shows (serialized)           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ApiError → UI                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These represent business rule violations. The command layer turns them
/// into user-facing messages.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Product is not in the cart.
    #[error("Product {0} is not in the cart")]
    NotInCart(String),

    /// Insufficient stock to complete sale.
    ///
    /// ## When This Occurs
    /// - Product tracks inventory and forbids negative stock
    /// - Cart quantity is larger than the current stock
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// Checkout attempted with no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Line quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Payment amount is invalid.
    #[error("Invalid payment amount: {reason}")]
    InvalidPaymentAmount { reason: String },

    /// A partial payment is larger than what is still owed.
    ///
    /// ## User Workflow
    /// ```text
    /// Total $1,000.00, already paid $700.00
    ///      │
    ///      ▼
    /// Add card payment $400.00
    ///      │
    ///      ▼
    /// PaymentExceedsRemaining { amount: $400.00, remaining: $300.00 }
    /// ```
    #[error("Payment of {amount} exceeds remaining balance of {remaining}")]
    PaymentExceedsRemaining { amount: Money, remaining: Money },

    /// Recorded payments do not add up to the total.
    #[error("Payments total {paid} but sale total is {total}")]
    PaymentsUnbalanced { paid: Money, total: Money },

    /// No payment at the given position.
    #[error("No payment at position {0}")]
    PaymentNotFound(usize),

    /// The voucher needs a customer (e.g. Factura A).
    #[error("{voucher} requires a customer with a valid CUIT")]
    CustomerRequired { voucher: String },

    /// Cancelling a sale twice.
    #[error("Sale {0} is already cancelled")]
    SaleAlreadyCancelled(String),

    /// Discount outside what the business allows.
    #[error("Invalid discount: {reason}")]
    InvalidDiscount { reason: String },

    /// A purchase voucher was already registered for the supplier.
    #[error("Voucher {voucher} was already registered for this supplier")]
    DuplicateVoucher { voucher: String },

    /// Purchase with no items.
    #[error("Purchase has no items")]
    EmptyPurchase,

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, bad CUIT check digit).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., duplicate SKU).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },

    /// Uploaded file is larger than allowed.
    #[error("{field} is too large: {size} bytes (max {max})")]
    FileTooLarge { field: String, size: u64, max: u64 },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            sku: "YERBA-1KG".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for YERBA-1KG: available 3, requested 5"
        );
    }

    #[test]
    fn test_payment_exceeds_message_uses_money_display() {
        let err = CoreError::PaymentExceedsRemaining {
            amount: Money::from_cents(40_000),
            remaining: Money::from_cents(30_000),
        };
        assert_eq!(
            err.to_string(),
            "Payment of $400.00 exceeds remaining balance of $300.00"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "sku".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
