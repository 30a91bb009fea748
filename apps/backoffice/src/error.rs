//! # API Error Type
//!
//! Unified error type for back office commands.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Mostrador                              │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Command Function                                                │  │
//! │  │  Result<T, ApiError>                                             │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Input invalid? ──── ValidationError::InvalidFormat ─┐           │  │
//! │  │         │                                            │           │  │
//! │  │         ▼                                            ▼           │  │
//! │  │  Rule broken? ────── CoreError::PaymentsUnbalanced ─ ApiError ──►│  │
//! │  │         │                                            ▲           │  │
//! │  │         ▼                                            │           │  │
//! │  │  Database? ───────── DbError::UniqueViolation ───────┘           │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Success ───────────────────────────────────────────────────────►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  The UI shows `message` in a toast and branches on `code`:             │
//! │    { "code": "PAYMENT_ERROR", "message": "Payments total ..." }        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;

use mostrador_core::{CoreError, ValidationError};
use mostrador_db::DbError;

/// API error returned from commands.
///
/// ## Serialization
/// ```json
/// {
///   "code": "NOT_FOUND",
///   "message": "Product not found: 5f0c..."
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found
    NotFound,

    /// Input validation failed
    ValidationError,

    /// Same SKU, voucher or name already registered
    Duplicate,

    /// Data changed underneath the operation (stock, sale status)
    Conflict,

    /// Database operation failed
    DatabaseError,

    /// Business rule broken
    BusinessLogic,

    /// Internal error
    Internal,

    /// Cart operation failed
    CartError,

    /// Insufficient stock
    InsufficientStock,

    /// Payment reconciliation failed
    PaymentError,

    /// Fiscal setup missing or voucher requirements not met
    FiscalError,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    pub fn fiscal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::FiscalError, message)
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => {
                ApiError::new(ErrorCode::Duplicate, format!("{} '{}' already exists", field, value))
            }
            DbError::Conflict(message) => ApiError::new(ErrorCode::Conflict, message),
            DbError::ConnectionFailed(_) => ApiError::new(ErrorCode::DatabaseError, "Database connection failed"),
            DbError::MigrationFailed(_) => ApiError::new(ErrorCode::DatabaseError, "Database migration failed"),
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::new(ErrorCode::ValidationError, "Invalid reference")
            }
            DbError::PoolExhausted => ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted"),
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::ProductNotFound(id) => ApiError::not_found("Product", &id),
            CoreError::NotInCart(_) | CoreError::CartTooLarge { .. } | CoreError::EmptyCart => {
                ApiError::new(ErrorCode::CartError, message)
            }
            CoreError::InsufficientStock { .. } => ApiError::new(ErrorCode::InsufficientStock, message),
            CoreError::QuantityTooLarge { .. } | CoreError::InvalidDiscount { .. } => {
                ApiError::new(ErrorCode::ValidationError, message)
            }
            CoreError::InvalidPaymentAmount { .. }
            | CoreError::PaymentExceedsRemaining { .. }
            | CoreError::PaymentsUnbalanced { .. }
            | CoreError::PaymentNotFound(_) => ApiError::new(ErrorCode::PaymentError, message),
            CoreError::CustomerRequired { .. } => ApiError::fiscal(message),
            CoreError::SaleAlreadyCancelled(_) => ApiError::new(ErrorCode::Conflict, message),
            CoreError::DuplicateVoucher { .. } => ApiError::new(ErrorCode::Duplicate, message),
            CoreError::EmptyPurchase => ApiError::new(ErrorCode::BusinessLogic, message),
            CoreError::Validation(e) => e.into(),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;
    use mostrador_core::Money;

    #[test]
    fn test_serializes_screaming_code() {
        let err = ApiError::new(ErrorCode::InsufficientStock, "no stock");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "INSUFFICIENT_STOCK");
        assert_eq!(json["message"], "no stock");
    }

    #[test]
    fn test_core_errors_keep_their_message() {
        let err: ApiError = CoreError::PaymentsUnbalanced {
            paid: Money::from_cents(10_000),
            total: Money::from_cents(16_200),
        }
        .into();
        assert_eq!(err.code, ErrorCode::PaymentError);
        assert!(err.message.contains("Payments total"));

        let err: ApiError = CoreError::Validation(ValidationError::Required {
            field: "sku".to_string(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[test]
    fn test_db_errors_map_codes() {
        let err: ApiError = DbError::duplicate("products.sku", "YERBA-1KG").into();
        assert_eq!(err.code, ErrorCode::Duplicate);

        let err: ApiError = DbError::Conflict("stock moved".to_string()).into();
        assert_eq!(err.code, ErrorCode::Conflict);

        let err: ApiError = DbError::QueryFailed("syntax error near SELECT".to_string()).into();
        assert_eq!(err.message, "Database operation failed");
    }
}
