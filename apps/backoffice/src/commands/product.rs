//! # Product Commands
//!
//! Catalog search and maintenance.
//!
//! ## Search Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Product Search Flow                                  │
//! │                                                                         │
//! │  Cashier types or scans "7790001000012"                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  search_products(query)                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌───────────────────────────────────────────┐                         │
//! │  │  Empty query? -> active catalog, by name  │                         │
//! │  │  Otherwise   -> LIKE on sku/name/barcode  │                         │
//! │  │               exact sku/barcode first     │                         │
//! │  └───────────────────────────────────────────┘                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Vec<ProductDto>                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ApiError, ErrorCode};
use crate::state::{ConfigState, DbState};
use mostrador_core::validation::{
    validate_name, validate_price_cents, validate_search_query, validate_sku, validate_tax_rate_bps,
};
use mostrador_core::Product;
use mostrador_db::DeleteOutcome;

/// Product DTO (Data Transfer Object) for the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDto {
    pub id: String,
    pub category_id: Option<String>,
    pub supplier_id: Option<String>,
    pub sku: String,
    pub barcode: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub cost_cents: Option<i64>,
    pub tax_rate_bps: u32,
    pub track_inventory: bool,
    /// Whether selling is allowed when stock is 0 or negative.
    pub allow_negative_stock: bool,
    pub current_stock: Option<i64>,
    pub is_active: bool,
}

impl From<Product> for ProductDto {
    fn from(p: Product) -> Self {
        ProductDto {
            id: p.id,
            category_id: p.category_id,
            supplier_id: p.supplier_id,
            sku: p.sku,
            barcode: p.barcode,
            name: p.name,
            description: p.description,
            price_cents: p.price_cents,
            cost_cents: p.cost_cents,
            tax_rate_bps: p.tax_rate_bps,
            track_inventory: p.track_inventory,
            allow_negative_stock: p.allow_negative_stock,
            current_stock: p.current_stock,
            is_active: p.is_active,
        }
    }
}

/// Product form, shared by create and update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub category_id: Option<String>,
    pub supplier_id: Option<String>,
    pub sku: String,
    pub barcode: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub cost_cents: Option<i64>,
    pub tax_rate_bps: u32,
    pub track_inventory: bool,
    pub allow_negative_stock: bool,
    /// Opening stock. Ignored on update (use `adjust_stock`).
    pub initial_stock: Option<i64>,
}

impl ProductInput {
    fn validate(&self) -> Result<(), ApiError> {
        validate_sku(&self.sku)?;
        validate_name("name", &self.name, 200)?;
        validate_price_cents(self.price_cents)?;
        if let Some(cost) = self.cost_cents {
            validate_price_cents(cost)?;
        }
        validate_tax_rate_bps(self.tax_rate_bps)?;
        Ok(())
    }
}

/// Searches active products by SKU, name or barcode.
///
/// ## Arguments
/// * `query` - Search term; empty lists the catalog
/// * `limit` - Maximum results to return (default: 20, max: 100)
pub async fn search_products(
    db: &DbState,
    config: &ConfigState,
    query: &str,
    limit: Option<u32>,
) -> Result<Vec<ProductDto>, ApiError> {
    let start = Instant::now();
    let query = validate_search_query(query)?;
    let limit = limit.unwrap_or(20).min(100);

    debug!(query = %query, limit = %limit, "search_products command");

    let products = if query.is_empty() {
        db.inner().products().list_active(&config.organization_id, limit).await?
    } else {
        db.inner().products().search(&config.organization_id, &query, limit).await?
    };
    let dtos: Vec<ProductDto> = products.into_iter().map(ProductDto::from).collect();

    info!(
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        count = dtos.len(),
        query = %query,
        "search_products complete"
    );

    Ok(dtos)
}

/// Loads a product of this store's organization. Another organization's
/// product is reported as not found.
async fn load_product(db: &DbState, config: &ConfigState, id: &str) -> Result<Product, ApiError> {
    db.inner()
        .products()
        .get_by_id(id)
        .await?
        .filter(|p| p.organization_id == config.organization_id)
        .ok_or_else(|| ApiError::not_found("Product", id))
}

pub async fn get_product(db: &DbState, config: &ConfigState, id: &str) -> Result<ProductDto, ApiError> {
    debug!(id = %id, "get_product command");
    Ok(ProductDto::from(load_product(db, config, id).await?))
}

/// Creates a product.
///
/// ## Errors
/// - `VALIDATION_ERROR` for a bad SKU, name, price or IVA rate
/// - `DUPLICATE` when the SKU is already used in the organization
pub async fn create_product(
    db: &DbState,
    config: &ConfigState,
    input: ProductInput,
) -> Result<ProductDto, ApiError> {
    debug!(sku = %input.sku, "create_product command");
    input.validate()?;

    let sku = input.sku.trim().to_string();
    if db.inner().products().get_by_sku(&config.organization_id, &sku).await?.is_some() {
        return Err(ApiError::new(
            ErrorCode::Duplicate,
            format!("SKU '{}' already exists", sku),
        ));
    }

    let now = Utc::now();
    let product = Product {
        id: Uuid::new_v4().to_string(),
        organization_id: config.organization_id.clone(),
        category_id: input.category_id,
        supplier_id: input.supplier_id,
        sku,
        barcode: input.barcode.filter(|b| !b.trim().is_empty()),
        name: input.name.trim().to_string(),
        description: input.description,
        price_cents: input.price_cents,
        cost_cents: input.cost_cents,
        tax_rate_bps: input.tax_rate_bps,
        track_inventory: input.track_inventory,
        allow_negative_stock: input.allow_negative_stock,
        current_stock: if input.track_inventory {
            Some(input.initial_stock.unwrap_or(0))
        } else {
            None
        },
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    let product = db.inner().products().insert(&product).await?;
    info!(id = %product.id, sku = %product.sku, "Product created");
    Ok(ProductDto::from(product))
}

/// Updates a product's catalog data. Stock is left untouched.
pub async fn update_product(
    db: &DbState,
    config: &ConfigState,
    id: &str,
    input: ProductInput,
) -> Result<ProductDto, ApiError> {
    debug!(id = %id, "update_product command");
    input.validate()?;

    let products = db.inner().products();
    let mut product = load_product(db, config, id).await?;

    let sku = input.sku.trim().to_string();
    if sku != product.sku {
        if let Some(other) = products.get_by_sku(&config.organization_id, &sku).await? {
            if other.id != product.id {
                return Err(ApiError::new(
                    ErrorCode::Duplicate,
                    format!("SKU '{}' already exists", sku),
                ));
            }
        }
    }

    product.category_id = input.category_id;
    product.supplier_id = input.supplier_id;
    product.sku = sku;
    product.barcode = input.barcode.filter(|b| !b.trim().is_empty());
    product.name = input.name.trim().to_string();
    product.description = input.description;
    product.price_cents = input.price_cents;
    product.cost_cents = input.cost_cents;
    product.tax_rate_bps = input.tax_rate_bps;
    product.track_inventory = input.track_inventory;
    product.allow_negative_stock = input.allow_negative_stock;

    products.update(&product).await?;
    info!(id = %product.id, sku = %product.sku, "Product updated");

    let updated = products
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product", id))?;
    Ok(ProductDto::from(updated))
}

/// Manual stock correction (count, breakage, ...).
///
/// Refused when it would leave stock negative on a product that does not
/// allow it. The early check gives the cashier the available quantity; the
/// guarded update still refuses with `CONFLICT` if a sale got there first.
pub async fn adjust_stock(
    db: &DbState,
    config: &ConfigState,
    id: &str,
    delta: i64,
) -> Result<ProductDto, ApiError> {
    debug!(id = %id, delta = %delta, "adjust_stock command");

    let product = load_product(db, config, id).await?;

    if !product.track_inventory {
        return Err(ApiError::validation(format!(
            "Product {} does not track inventory",
            product.sku
        )));
    }

    let current = product.current_stock.unwrap_or(0);
    if delta < 0 && current + delta < 0 && !product.allow_negative_stock {
        return Err(ApiError::new(
            ErrorCode::InsufficientStock,
            format!(
                "Insufficient stock for {}: available {}, requested {}",
                product.sku, current, -delta
            ),
        ));
    }

    db.inner().products().update_stock(id, delta).await?;
    info!(id = %id, sku = %product.sku, delta, "Stock adjusted");

    get_product(db, config, id).await
}

/// Deletes a product, or archives it when sales or purchases reference it.
pub async fn delete_product(db: &DbState, config: &ConfigState, id: &str) -> Result<DeleteOutcome, ApiError> {
    debug!(id = %id, "delete_product command");
    let product = load_product(db, config, id).await?;
    Ok(db.inner().products().delete_or_archive(&product.id).await?)
}

