//! # Validation Module
//!
//! Field-level input rules, checked by commands before anything is
//! computed or written.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: Command (Rust)                                                │
//! │  ├── Deserialization (types)                                            │
//! │  └── THIS MODULE: field rules (SKU, CUIT, rates, uploads)               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Business rules (pricing, split, fiscal, purchase)             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  ├── NOT NULL / CHECK constraints                                       │
//! │  ├── UNIQUE (sku, supplier voucher, voucher sequence)                   │
//! │  └── Foreign keys                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use mostrador_core::validation::{validate_cuit, validate_sku};
//!
//! validate_sku("YERBA-1KG").unwrap();
//! assert_eq!(validate_cuit("20123456786").unwrap(), "20-12345678-6");
//! ```

use crate::error::ValidationError;
use crate::fiscal::{MAX_POINT_OF_SALE, MAX_VOUCHER_NUMBER};
use crate::{FULL_BPS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// IVA rates in force, in basis points.
pub const ALLOWED_TAX_RATES_BPS: [u32; 6] = [0, 250, 500, 1050, 2100, 2700];

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, digits, hyphens and underscores only
///
/// ## Example
/// ```rust
/// use mostrador_core::validation::validate_sku;
///
/// assert!(validate_sku("YERBA-1KG").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("A".repeat(100).as_str()).is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.chars().count() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a required display name (product, supplier, customer, ...).
pub fn validate_name(field: &str, name: &str, max: usize) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a search query. Empty means "list everything".
///
/// ## Returns
/// The trimmed query string.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

/// Loose e-mail check: one `@` with text on both sides and a dot after it.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let invalid = || ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: "must look like name@domain.tld".to_string(),
    };

    let (local, domain) = email.trim().split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') || !domain.contains('.') || domain.ends_with('.') {
        return Err(invalid());
    }
    Ok(())
}

// =============================================================================
// CUIT
// =============================================================================

/// Validates an Argentine CUIT/CUIL and returns it as `XX-XXXXXXXX-X`.
///
/// ## Rules
/// - 11 digits; hyphens, dots and spaces are ignored
/// - Known type prefix (20, 23, 24, 27, 30, 33, 34)
/// - Mod-11 check digit with weights `5 4 3 2 7 6 5 4 3 2`
///
/// ## Example
/// ```rust
/// use mostrador_core::validation::validate_cuit;
///
/// assert!(validate_cuit("33-69345023-9").is_ok());
/// assert!(validate_cuit("33-69345023-8").is_err());
/// ```
pub fn validate_cuit(cuit: &str) -> ValidationResult<String> {
    const WEIGHTS: [u32; 10] = [5, 4, 3, 2, 7, 6, 5, 4, 3, 2];
    const PREFIXES: [&str; 7] = ["20", "23", "24", "27", "30", "33", "34"];

    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "cuit".to_string(),
        reason: reason.to_string(),
    };

    let digits: String = cuit
        .chars()
        .filter(|c| !matches!(c, '-' | '.' | ' '))
        .collect();

    if digits.is_empty() {
        return Err(ValidationError::Required {
            field: "cuit".to_string(),
        });
    }
    if digits.len() != 11 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("must have 11 digits"));
    }
    if !PREFIXES.contains(&&digits[..2]) {
        return Err(invalid("unknown prefix"));
    }

    let values: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();
    let sum: u32 = values.iter().zip(WEIGHTS.iter()).map(|(d, w)| d * w).sum();
    let expected = match 11 - (sum % 11) {
        11 => 0,
        10 => return Err(invalid("check digit does not match")),
        n => n,
    };
    if values[10] != expected {
        return Err(invalid("check digit does not match"));
    }

    Ok(format!("{}-{}-{}", &digits[..2], &digits[2..10], &digits[10..]))
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price or cost in cents. Zero is allowed.
///
/// ## Example
/// ```rust
/// use mostrador_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(1099).is_ok());
/// assert!(validate_price_cents(0).is_ok());
/// assert!(validate_price_cents(-100).is_err());
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Only the IVA rates in force are accepted.
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if !ALLOWED_TAX_RATES_BPS.contains(&bps) {
        return Err(ValidationError::NotAllowed {
            field: "tax_rate".to_string(),
            allowed: ALLOWED_TAX_RATES_BPS.iter().map(|b| b.to_string()).collect(),
        });
    }

    Ok(())
}

/// Discount percentages are 0..=100%.
pub fn validate_discount_bps(bps: u32) -> ValidationResult<()> {
    if bps > FULL_BPS {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: FULL_BPS as i64,
        });
    }

    Ok(())
}

pub fn validate_point_of_sale_number(number: i64) -> ValidationResult<()> {
    if !(1..=MAX_POINT_OF_SALE).contains(&number) {
        return Err(ValidationError::OutOfRange {
            field: "point_of_sale".to_string(),
            min: 1,
            max: MAX_POINT_OF_SALE,
        });
    }
    Ok(())
}

pub fn validate_voucher_number(number: i64) -> ValidationResult<()> {
    if !(1..=MAX_VOUCHER_NUMBER).contains(&number) {
        return Err(ValidationError::OutOfRange {
            field: "voucher_number".to_string(),
            min: 1,
            max: MAX_VOUCHER_NUMBER,
        });
    }
    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string.
///
/// ## Example
/// ```rust
/// use mostrador_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Uploads
// =============================================================================

/// What a file is being uploaded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum UploadKind {
    /// Organization logo printed on vouchers.
    Logo,
    /// ARCA certificate (.crt, PEM).
    ArcaCertificate,
    /// Private key matching the ARCA certificate (PEM).
    ArcaPrivateKey,
    /// Scan of a supplier voucher.
    PurchaseAttachment,
}

impl UploadKind {
    pub fn field(&self) -> &'static str {
        match self {
            UploadKind::Logo => "logo",
            UploadKind::ArcaCertificate => "certificate",
            UploadKind::ArcaPrivateKey => "private_key",
            UploadKind::PurchaseAttachment => "attachment",
        }
    }

    /// Maximum size in bytes.
    pub fn max_bytes(&self) -> u64 {
        match self {
            UploadKind::Logo => 2 * 1024 * 1024,
            UploadKind::ArcaCertificate | UploadKind::ArcaPrivateKey => 64 * 1024,
            UploadKind::PurchaseAttachment => 10 * 1024 * 1024,
        }
    }

    pub fn allowed_mime_types(&self) -> &'static [&'static str] {
        match self {
            UploadKind::Logo => &["image/png", "image/jpeg", "image/webp"],
            UploadKind::ArcaCertificate | UploadKind::ArcaPrivateKey => {
                &["application/x-pem-file", "application/x-x509-ca-cert", "text/plain"]
            }
            UploadKind::PurchaseAttachment => &["application/pdf", "image/png", "image/jpeg"],
        }
    }
}

/// Checks an upload's declared MIME type and size. Content is not inspected.
///
/// ## Example
/// ```rust
/// use mostrador_core::validation::{validate_upload, UploadKind};
///
/// assert!(validate_upload(UploadKind::Logo, "image/png", 150_000).is_ok());
/// assert!(validate_upload(UploadKind::Logo, "application/pdf", 150_000).is_err());
/// assert!(validate_upload(UploadKind::Logo, "image/png", 5 * 1024 * 1024).is_err());
/// ```
pub fn validate_upload(kind: UploadKind, mime_type: &str, size_bytes: u64) -> ValidationResult<()> {
    if size_bytes == 0 {
        return Err(ValidationError::Required {
            field: kind.field().to_string(),
        });
    }

    // Parameters such as "; charset=utf-8" are ignored
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if !kind.allowed_mime_types().contains(&essence.as_str()) {
        return Err(ValidationError::NotAllowed {
            field: kind.field().to_string(),
            allowed: kind.allowed_mime_types().iter().map(|m| m.to_string()).collect(),
        });
    }

    if size_bytes > kind.max_bytes() {
        return Err(ValidationError::FileTooLarge {
            field: kind.field().to_string(),
            size: size_bytes,
            max: kind.max_bytes(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
