//! # Cart
//!
//! The sale being assembled at the counter.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Cashier Action           Command                 Cart Change           │
//! │  ──────────────           ───────                 ───────────           │
//! │                                                                         │
//! │  Scan product ───────────► add_to_cart() ───────► items.push(item)      │
//! │  Change quantity ────────► update_cart_item() ──► items[i].qty = n      │
//! │  Line discount ──────────► set_item_discount() ─► items[i].discount     │
//! │  Cart discount ──────────► set_global_discount()► global_discount       │
//! │  Pick customer ──────────► set_cart_customer() ─► customer_id           │
//! │  Click remove ───────────► remove_from_cart() ──► items.remove(i)       │
//! │  View cart ──────────────► get_cart() ──────────► totals(policy)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::pricing::{price_lines, CartTotals, Discount, PricingLine, PricingPolicy};
use crate::types::{Product, TaxRate};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// A line in the cart.
///
/// Name, SKU, price and tax rate are frozen when the product is added, so
/// a price change in the catalog does not move an open sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub tax_rate_bps: u32,
    pub quantity: i64,
    pub discount: Option<Discount>,
    #[ts(as = "String")]
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    pub fn from_product(product: &Product, quantity: i64) -> Self {
        CartItem {
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            unit_price_cents: product.price_cents,
            tax_rate_bps: product.tax_rate_bps,
            quantity,
            discount: None,
            added_at: Utc::now(),
        }
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }

    /// Unit price × quantity, before any discount.
    pub fn subtotal(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }

    fn pricing_line(&self) -> PricingLine {
        PricingLine {
            unit_price: self.unit_price(),
            quantity: self.quantity,
            tax_rate: self.tax_rate(),
            discount: self.discount,
        }
    }
}

/// The shopping cart.
///
/// ## Invariants
/// - Items are unique by `product_id` (adding the same product increases quantity)
/// - Quantity is always in `1..=MAX_ITEM_QUANTITY`
/// - At most `MAX_CART_ITEMS` lines
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub items: Vec<CartItem>,
    pub global_discount: Option<Discount>,
    pub customer_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Default for Cart {
    fn default() -> Self {
        Cart::new()
    }
}

impl Cart {
    pub fn new() -> Self {
        Cart {
            items: Vec::new(),
            global_discount: None,
            customer_id: None,
            created_at: Utc::now(),
        }
    }

    /// Adds a product or increases its quantity if already present.
    pub fn add_item(&mut self, product: &Product, quantity: i64) -> CoreResult<()> {
        if quantity <= 0 {
            return Err(crate::ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }

        if let Some(item) = self.items.iter_mut().find(|i| i.product_id == product.id) {
            let new_qty = item.quantity + quantity;
            if new_qty > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: new_qty,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            item.quantity = new_qty;
            return Ok(());
        }

        if quantity > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: MAX_ITEM_QUANTITY,
            });
        }
        if self.items.len() >= MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge { max: MAX_CART_ITEMS });
        }

        self.items.push(CartItem::from_product(product, quantity));
        Ok(())
    }

    /// Sets a line's quantity. Zero removes the line.
    pub fn update_quantity(&mut self, product_id: &str, quantity: i64) -> CoreResult<()> {
        if quantity == 0 {
            return self.remove_item(product_id);
        }
        if quantity < 0 {
            return Err(crate::ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }
        if quantity > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: MAX_ITEM_QUANTITY,
            });
        }

        let item = self.item_mut(product_id)?;
        item.quantity = quantity;
        Ok(())
    }

    /// Sets or clears the discount on one line.
    pub fn set_item_discount(&mut self, product_id: &str, discount: Option<Discount>) -> CoreResult<()> {
        if let Some(d) = &discount {
            d.validate()?;
        }
        let item = self.item_mut(product_id)?;
        item.discount = discount;
        Ok(())
    }

    /// Sets or clears the cart-wide discount.
    ///
    /// The policy cap is applied when totals are computed, not here, so the
    /// cashier sees the capped flag instead of an error.
    pub fn set_global_discount(&mut self, discount: Option<Discount>) -> CoreResult<()> {
        if let Some(d) = &discount {
            d.validate()?;
        }
        self.global_discount = discount;
        Ok(())
    }

    pub fn set_customer(&mut self, customer_id: Option<String>) {
        self.customer_id = customer_id;
    }

    pub fn remove_item(&mut self, product_id: &str) -> CoreResult<()> {
        let initial_len = self.items.len();
        self.items.retain(|i| i.product_id != product_id);

        if self.items.len() == initial_len {
            Err(CoreError::NotInCart(product_id.to_string()))
        } else {
            Ok(())
        }
    }

    /// Empties the cart and forgets discounts and customer.
    pub fn clear(&mut self) {
        *self = Cart::new();
    }

    /// Takes a completed sale out of the cart.
    ///
    /// `sold` is the snapshot that was checked out. Its quantities are
    /// subtracted line by line, so anything scanned while the sale was being
    /// recorded stays in the cart. Discount and customer are forgotten only
    /// if they are still the ones that were sold.
    pub fn remove_sold(&mut self, sold: &Cart) {
        for sold_item in &sold.items {
            if let Some(item) = self.items.iter_mut().find(|i| i.product_id == sold_item.product_id) {
                item.quantity -= sold_item.quantity;
            }
        }
        self.items.retain(|i| i.quantity > 0);

        if self.items.is_empty() {
            *self = Cart::new();
            return;
        }
        if self.global_discount == sold.global_discount {
            self.global_discount = None;
        }
        if self.customer_id == sold.customer_id {
            self.customer_id = None;
        }
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Prices the cart under `policy`.
    pub fn totals(&self, policy: &PricingPolicy) -> CartTotals {
        let lines: Vec<PricingLine> = self.items.iter().map(CartItem::pricing_line).collect();
        price_lines(&lines, self.global_discount, policy)
    }

    fn item_mut(&mut self, product_id: &str) -> CoreResult<&mut CartItem> {
        self.items
            .iter_mut()
            .find(|i| i.product_id == product_id)
            .ok_or_else(|| CoreError::NotInCart(product_id.to_string()))
    }
}
