//! # Cart State
//!
//! Holds the cart being rung up at this terminal.
//!
//! ## Thread Safety
//! The cart is wrapped in `Arc<Mutex<T>>` because:
//! 1. Multiple commands may access/modify the cart
//! 2. Only one command should modify the cart at a time
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart State Operations                                │
//! │                                                                         │
//! │  Cashier Action           Command                  Cart State Change    │
//! │  ──────────────           ───────                  ─────────────────    │
//! │                                                                         │
//! │  Scan product ───────────► add_to_cart() ────────► items.push(item)     │
//! │  Change quantity ────────► update_cart_item() ───► items[i].qty = n     │
//! │  Line discount ──────────► set_item_discount() ──► items[i].discount    │
//! │  Cart discount ──────────► set_global_discount() ► global_discount      │
//! │  Identify customer ──────► set_cart_customer() ──► customer_id          │
//! │  Click Clear ────────────► clear_cart() ─────────► items.clear()        │
//! │  View Cart ──────────────► get_cart() ───────────► (read only)          │
//! │                                                                         │
//! │  checkout() records a snapshot, then removes just those lines.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use mostrador_core::cart::Cart;

/// Shared cart state.
///
/// A poisoned lock still holds a usable cart (every cart mutation either
/// completes or returns an error before touching items), so the guard is
/// recovered instead of propagating the panic.
#[derive(Debug, Clone)]
pub struct CartState {
    cart: Arc<Mutex<Cart>>,
}

impl CartState {
    /// Creates a new empty cart state.
    pub fn new() -> Self {
        CartState {
            cart: Arc::new(Mutex::new(Cart::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Cart> {
        self.cart.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Executes a function with read access to the cart.
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let totals = cart_state.with_cart(|cart| cart.totals(&policy));
    /// ```
    pub fn with_cart<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Cart) -> R,
    {
        let cart = self.lock();
        f(&cart)
    }

    /// Executes a function with write access to the cart.
    ///
    /// ## Usage
    /// ```rust,ignore
    /// cart_state.with_cart_mut(|cart| cart.add_item(&product, 1))?;
    /// ```
    pub fn with_cart_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Cart) -> R,
    {
        let mut cart = self.lock();
        f(&mut cart)
    }

    /// Copy of the current cart (for checkout, which awaits the database).
    pub fn snapshot(&self) -> Cart {
        self.lock().clone()
    }
}

impl Default for CartState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mostrador_core::{Product, DEFAULT_ORGANIZATION_ID};

    fn product(id: &str, price_cents: i64) -> Product {
        Product {
            id: id.to_string(),
            organization_id: DEFAULT_ORGANIZATION_ID.to_string(),
            category_id: None,
            supplier_id: None,
            sku: format!("SKU-{}", id),
            barcode: None,
            name: format!("Producto {}", id),
            description: None,
            price_cents,
            cost_cents: None,
            tax_rate_bps: 2100,
            track_inventory: false,
            allow_negative_stock: false,
            current_stock: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_mutations_are_shared_between_clones() {
        let state = CartState::new();
        let other = state.clone();

        state.with_cart_mut(|c| c.add_item(&product("1", 999), 2)).unwrap();
        assert_eq!(other.with_cart(|c| c.total_quantity()), 2);

        let snapshot = other.snapshot();
        state.with_cart_mut(|c| c.clear());
        assert_eq!(snapshot.item_count(), 1);
        assert!(state.with_cart(|c| c.is_empty()));
    }
}
