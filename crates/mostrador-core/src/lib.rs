//! # mostrador-core: Pure Business Logic for Mostrador
//!
//! Every rule that decides a number on a voucher lives here, as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mostrador Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Backoffice commands (apps/backoffice)           │   │
//! │  │    add_to_cart, checkout, register_purchase, save_fiscal_config │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ mostrador-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌──────────┐ │   │
//! │  │   │ pricing │ │  cart   │ │  split  │ │ fiscal  │ │ checkout │ │   │
//! │  │   │discounts│ │  lines  │ │payments │ │vouchers │ │ purchase │ │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └──────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  mostrador-db (Database Layer)                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`types`] - Domain records (Product, Sale, Purchase, ...)
//! - [`pricing`] - Item/global discounts, IVA and cart totals
//! - [`cart`] - The in-progress cart with frozen product snapshots
//! - [`split`] - Split-payment reconciliation
//! - [`fiscal`] - Tax conditions, voucher types and numbering
//! - [`checkout`] - Turns a cart plus payments into insert-ready records
//! - [`purchase`] - Supplier purchase totals and payment allocation
//! - [`validation`] - Field-level input rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use mostrador_core::money::Money;
//! use mostrador_core::pricing::{price_lines, Discount, PricingLine, PricingPolicy};
//! use mostrador_core::types::TaxRate;
//!
//! let lines = vec![PricingLine {
//!     unit_price: Money::from_cents(10_000),
//!     quantity: 2,
//!     tax_rate: TaxRate::zero(),
//!     discount: Some(Discount::Percentage(1000)),
//! }];
//!
//! let totals = price_lines(&lines, Some(Discount::Percentage(1000)), &PricingPolicy::default());
//! assert_eq!(totals.total.cents(), 16_200);
//! ```

pub mod cart;
pub mod checkout;
pub mod error;
pub mod fiscal;
pub mod money;
pub mod pricing;
pub mod purchase;
pub mod split;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default organization for single-store installs.
///
/// The schema carries `organization_id` everywhere so several businesses can
/// share one database; a fresh install uses this one.
pub const DEFAULT_ORGANIZATION_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Maximum distinct lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line in the cart.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Tolerance when reconciling payments against a total (one cent).
pub const PAYMENT_TOLERANCE: Money = Money::from_cents(1);

/// Basis points in 100%.
pub const FULL_BPS: u32 = 10_000;
