//! # Commands Module
//!
//! Everything the back office UI can ask for.
//!
//! ## Command Organization
//! ```text
//! commands/
//! ├── mod.rs       ◄─── You are here (exports)
//! ├── product.rs   ◄─── Catalog search, CRUD, stock adjustments
//! ├── cart.rs      ◄─── Cart lines, discounts, customer
//! ├── sale.rs      ◄─── Payment preview, checkout, receipts, cancellation
//! ├── purchase.rs  ◄─── Supplier vouchers, orders, supplier payments
//! ├── party.rs     ◄─── Suppliers, customers, categories
//! ├── fiscal.rs    ◄─── Fiscal config, locations, points of sale
//! └── upload.rs    ◄─── File upload pre-checks
//! ```
//!
//! ## How Commands Work
//! Commands are plain async functions. Each declares only the state it
//! needs and returns `Result<T, ApiError>` where `T` serializes to camelCase
//! JSON:
//! ```rust,ignore
//! // Only needs database
//! async fn search_products(db: &DbState, config: &ConfigState, query: &str, limit: Option<u32>)
//!
//! // Needs the cart too
//! async fn add_to_cart(db: &DbState, cart: &CartState, config: &ConfigState, product_id: &str, quantity: Option<i64>)
//! ```
//!
//! Business rules live in `mostrador-core`; a command loads what a rule
//! needs, calls it, and hands the result to a `mostrador-db` repository.

pub mod cart;
pub mod fiscal;
pub mod party;
pub mod product;
pub mod purchase;
pub mod sale;
pub mod upload;
