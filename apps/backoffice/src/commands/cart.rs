//! # Cart Commands
//!
//! Cart manipulation at the counter.
//!
//! ## Cart Response
//! Every command returns the whole cart with freshly computed totals, so
//! the UI never does money arithmetic.
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CART                                                     2 items       │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  Yerba mate 1kg          x2   -10%                        $180,00       │
//! │  Leche entera 1l         x1                               $1.250,00     │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  Subtotal                                                 $1.450,00     │
//! │  Descuento ítems                                          -$20,00       │
//! │  Descuento general (10%)                                  -$143,00      │
//! │  TOTAL                                                    $1.287,00     │
//! │  IVA contenido                                            $165,21       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Totals follow the organization's pricing policy (tax mode, global
//! discount cap), read from the fiscal configuration on each call.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::commands::fiscal::pricing_policy;
use crate::error::ApiError;
use crate::state::{CartState, ConfigState, DbState};
use mostrador_core::cart::{Cart, CartItem};
use mostrador_core::pricing::{CartTotals, Discount, PricingPolicy};

/// Cart response including items and totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub items: Vec<CartItem>,
    pub global_discount: Option<Discount>,
    pub customer_id: Option<String>,
    pub totals: CartTotals,
}

impl CartResponse {
    pub fn build(cart: &Cart, policy: &PricingPolicy) -> Self {
        CartResponse {
            items: cart.items.clone(),
            global_discount: cart.global_discount,
            customer_id: cart.customer_id.clone(),
            totals: cart.totals(policy),
        }
    }
}

async fn respond(db: &DbState, cart: &CartState, config: &ConfigState) -> Result<CartResponse, ApiError> {
    let policy = pricing_policy(db.inner(), &config.organization_id).await?;
    Ok(cart.with_cart(|c| CartResponse::build(c, &policy)))
}

/// Gets the current cart contents.
pub async fn get_cart(db: &DbState, cart: &CartState, config: &ConfigState) -> Result<CartResponse, ApiError> {
    debug!("get_cart command");
    respond(db, cart, config).await
}

/// Adds a product to the cart.
///
/// ## Behavior
/// - If product already in cart: quantity increases
/// - If product not in cart: added as new item
/// - Price is "frozen" at time of adding (won't change if product price updates)
///
/// Stock is checked again at checkout; here only archived products are
/// refused.
pub async fn add_to_cart(
    db: &DbState,
    cart: &CartState,
    config: &ConfigState,
    product_id: &str,
    quantity: Option<i64>,
) -> Result<CartResponse, ApiError> {
    let quantity = quantity.unwrap_or(1);
    debug!(product_id = %product_id, quantity = %quantity, "add_to_cart command");

    let product = db
        .inner()
        .products()
        .get_by_id(product_id)
        .await?
        .filter(|p| p.organization_id == config.organization_id)
        .ok_or_else(|| ApiError::not_found("Product", product_id))?;

    if !product.is_active {
        return Err(ApiError::validation("Product is not available for sale"));
    }

    cart.with_cart_mut(|c| c.add_item(&product, quantity))?;
    respond(db, cart, config).await
}

/// Updates the quantity of an item in the cart. Zero removes the line.
pub async fn update_cart_item(
    db: &DbState,
    cart: &CartState,
    config: &ConfigState,
    product_id: &str,
    quantity: i64,
) -> Result<CartResponse, ApiError> {
    debug!(product_id = %product_id, quantity = %quantity, "update_cart_item command");
    cart.with_cart_mut(|c| c.update_quantity(product_id, quantity))?;
    respond(db, cart, config).await
}

pub async fn remove_from_cart(
    db: &DbState,
    cart: &CartState,
    config: &ConfigState,
    product_id: &str,
) -> Result<CartResponse, ApiError> {
    debug!(product_id = %product_id, "remove_from_cart command");
    cart.with_cart_mut(|c| c.remove_item(product_id))?;
    respond(db, cart, config).await
}

/// Sets (or clears, with `None`) the discount on one line.
pub async fn set_item_discount(
    db: &DbState,
    cart: &CartState,
    config: &ConfigState,
    product_id: &str,
    discount: Option<Discount>,
) -> Result<CartResponse, ApiError> {
    debug!(product_id = %product_id, discount = ?discount, "set_item_discount command");
    cart.with_cart_mut(|c| c.set_item_discount(product_id, discount))?;
    respond(db, cart, config).await
}

/// Sets (or clears) the cart-wide discount.
///
/// A discount above the organization's maximum is accepted and capped;
/// `totals.globalDiscountCapped` tells the UI it happened.
pub async fn set_global_discount(
    db: &DbState,
    cart: &CartState,
    config: &ConfigState,
    discount: Option<Discount>,
) -> Result<CartResponse, ApiError> {
    debug!(discount = ?discount, "set_global_discount command");
    cart.with_cart_mut(|c| c.set_global_discount(discount))?;

    let response = respond(db, cart, config).await?;
    if response.totals.global_discount_capped {
        info!(
            applied = %response.totals.global_discount,
            "Global discount capped to the configured maximum"
        );
    }
    Ok(response)
}

/// Identifies (or forgets) the customer. Decides between Factura A and B.
pub async fn set_cart_customer(
    db: &DbState,
    cart: &CartState,
    config: &ConfigState,
    customer_id: Option<String>,
) -> Result<CartResponse, ApiError> {
    debug!(customer_id = ?customer_id, "set_cart_customer command");

    if let Some(id) = &customer_id {
        let customer = db
            .inner()
            .customers()
            .get_by_id(id)
            .await?
            .filter(|c| c.organization_id == config.organization_id)
            .ok_or_else(|| ApiError::not_found("Customer", id))?;
        if !customer.is_active {
            return Err(ApiError::validation("Customer is archived"));
        }
    }

    cart.with_cart_mut(|c| c.set_customer(customer_id));
    respond(db, cart, config).await
}

/// Clears all items from the cart.
pub async fn clear_cart(db: &DbState, cart: &CartState, config: &ConfigState) -> Result<CartResponse, ApiError> {
    debug!("clear_cart command");
    cart.with_cart_mut(|c| c.clear());
    respond(db, cart, config).await
}
