//! # Checkout
//!
//! Turns a cart and its payments into the rows a sale is made of.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Cart + payments + fiscal config + customer + current products          │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  1. cart not empty                                                      │
//! │  2. totals (pricing)                                                    │
//! │  3. payments reconcile within one cent (split)                          │
//! │  4. voucher type + customer requirements (fiscal)                       │
//! │  5. stock available for tracked products                                │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  CheckoutPlan { sale, items, payments, stock_movements }                │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  mostrador-db assigns the voucher number and writes it all in one       │
//! │  transaction                                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here touches the database: the plan is built from data the
//! caller already loaded, so every rule can be tested without SQLite.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::cart::Cart;
use crate::error::{CoreError, CoreResult};
use crate::fiscal::{check_customer_requirements, select_sale_voucher, FiscalConfig, VoucherType};
use crate::money::Money;
use crate::pricing::TaxBreakdown;
use crate::split::{PaymentInput, PaymentSplit};
use crate::types::{Customer, Payment, PointOfSale, Product, Sale, SaleItem, SaleStatus};

/// A change to a product's stock caused by a sale, cancellation or purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockMovement {
    pub product_id: String,
    /// Negative for sales, positive for purchases and cancellations.
    pub delta: i64,
}

/// Who is selling, where.
#[derive(Debug, Clone, Copy)]
pub struct CheckoutContext<'a> {
    pub fiscal: &'a FiscalConfig,
    pub point_of_sale: &'a PointOfSale,
    pub customer: Option<&'a Customer>,
    pub user_id: &'a str,
    pub device_id: &'a str,
    pub now: DateTime<Utc>,
}

/// Insert-ready rows for one sale.
///
/// `sale.voucher_number` is zero until the repository reserves the next
/// number for `(point of sale, voucher type)`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutPlan {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub payments: Vec<Payment>,
    pub stock_movements: Vec<StockMovement>,
    pub change_due: Money,
    pub tax_breakdown: Vec<TaxBreakdown>,
    pub global_discount_capped: bool,
}

impl CheckoutPlan {
    /// Stamps the reserved voucher number on the sale.
    pub fn assign_voucher_number(&mut self, number: i64) {
        self.sale.voucher_number = number;
    }
}

/// Builds the rows for a sale.
///
/// ## Arguments
/// * `cart` - The cart being paid
/// * `payments` - Payments in the order they were entered
/// * `ctx` - Fiscal config, terminal, customer and operator
/// * `products` - Current catalog rows for every product in the cart
///
/// ## Errors
/// `EmptyCart`, `PaymentsUnbalanced`/`PaymentExceedsRemaining`,
/// `CustomerRequired`, `ProductNotFound`, `InsufficientStock`.
pub fn build_checkout(
    cart: &Cart,
    payments: &[PaymentInput],
    ctx: &CheckoutContext<'_>,
    products: &[Product],
) -> CoreResult<CheckoutPlan> {
    if cart.is_empty() {
        return Err(CoreError::EmptyCart);
    }

    let totals = cart.totals(&ctx.fiscal.pricing_policy());

    let split = PaymentSplit::from_inputs(totals.total, payments)?;
    split.ensure_complete()?;

    let voucher_type = select_sale_voucher(
        ctx.fiscal,
        ctx.point_of_sale.is_fiscal,
        ctx.customer.map(|c| c.tax_condition),
    );
    check_customer_requirements(voucher_type, ctx.customer)?;

    let by_id: HashMap<&str, &Product> = products.iter().map(|p| (p.id.as_str(), p)).collect();
    for item in &cart.items {
        let product = by_id
            .get(item.product_id.as_str())
            .ok_or_else(|| CoreError::ProductNotFound(item.product_id.clone()))?;
        if !product.can_sell(item.quantity) {
            return Err(CoreError::InsufficientStock {
                sku: product.sku.clone(),
                available: product.current_stock.unwrap_or(0),
                requested: item.quantity,
            });
        }
    }

    let sale_id = Uuid::new_v4().to_string();

    let sale = Sale {
        id: sale_id.clone(),
        organization_id: ctx.fiscal.organization_id.clone(),
        point_of_sale_id: ctx.point_of_sale.id.clone(),
        customer_id: ctx.customer.map(|c| c.id.clone()),
        voucher_type,
        point_of_sale_number: ctx.point_of_sale.number,
        voucher_number: 0,
        status: SaleStatus::Completed,
        subtotal_cents: totals.subtotal.cents(),
        item_discount_cents: totals.item_discount.cents(),
        global_discount_cents: totals.global_discount.cents(),
        tax_cents: totals.tax.cents(),
        total_cents: totals.total.cents(),
        user_id: ctx.user_id.to_string(),
        device_id: ctx.device_id.to_string(),
        notes: None,
        created_at: ctx.now,
        cancelled_at: None,
        credit_note_number: None,
    };

    let items: Vec<SaleItem> = cart
        .items
        .iter()
        .zip(&totals.lines)
        .map(|(item, line)| SaleItem {
            id: Uuid::new_v4().to_string(),
            sale_id: sale_id.clone(),
            product_id: item.product_id.clone(),
            sku_snapshot: item.sku.clone(),
            name_snapshot: item.name.clone(),
            unit_price_cents: item.unit_price_cents,
            quantity: item.quantity,
            subtotal_cents: line.subtotal.cents(),
            discount_cents: line.item_discount.cents(),
            global_discount_cents: line.global_discount.cents(),
            tax_rate_bps: item.tax_rate_bps,
            tax_cents: line.tax.cents(),
            total_cents: line.total.cents(),
            created_at: ctx.now,
        })
        .collect();

    let stock_movements: Vec<StockMovement> = cart
        .items
        .iter()
        .filter(|item| by_id.get(item.product_id.as_str()).is_some_and(|p| p.track_inventory))
        .map(|item| StockMovement {
            product_id: item.product_id.clone(),
            delta: -item.quantity,
        })
        .collect();

    let change_due = split.change_due();
    let payments: Vec<Payment> = split
        .into_entries()
        .into_iter()
        .map(|entry| {
            let change = entry.change();
            Payment {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.clone(),
                method: entry.method,
                amount_cents: entry.amount.cents(),
                tendered_cents: entry.tendered.map(|t| t.cents()),
                change_cents: entry.tendered.map(|_| change.cents()),
                reference: entry.reference,
                created_at: ctx.now,
            }
        })
        .collect();

    Ok(CheckoutPlan {
        sale,
        items,
        payments,
        stock_movements,
        change_due,
        tax_breakdown: totals.tax_breakdown,
        global_discount_capped: totals.global_discount_capped,
    })
}

// =============================================================================
// Cancellation
// =============================================================================

/// What undoing a sale involves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CancellationPlan {
    pub sale_id: String,
    /// Stock returned for tracked products.
    pub stock_movements: Vec<StockMovement>,
    /// Fiscal sales are annulled with a credit note of the same letter.
    pub credit_note: Option<VoucherType>,
}

/// Plans the cancellation of a completed sale.
///
/// `tracked` says which of the sale's products track inventory.
pub fn plan_cancellation(sale: &Sale, items: &[SaleItem], tracked: &[String]) -> CoreResult<CancellationPlan> {
    if sale.status == SaleStatus::Cancelled {
        return Err(CoreError::SaleAlreadyCancelled(sale.voucher().to_string()));
    }

    let stock_movements = items
        .iter()
        .filter(|item| tracked.contains(&item.product_id))
        .map(|item| StockMovement {
            product_id: item.product_id.clone(),
            delta: item.quantity,
        })
        .collect();

    Ok(CancellationPlan {
        sale_id: sale.id.clone(),
        stock_movements,
        credit_note: sale.voucher_type.credit_note(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiscal::TaxCondition;
    use crate::pricing::{Discount, TaxMode};
    use crate::types::PaymentMethod;
    use crate::DEFAULT_ORGANIZATION_ID;

    fn fiscal(condition: TaxCondition) -> FiscalConfig {
        FiscalConfig {
            organization_id: DEFAULT_ORGANIZATION_ID.to_string(),
            legal_name: "Almacén Don Pepe SRL".to_string(),
            cuit: "30-71234567-1".to_string(),
            tax_condition: condition,
            gross_income_number: None,
            activity_start_date: None,
            invoicing_enabled: true,
            default_point_of_sale_id: None,
            tax_mode: TaxMode::Inclusive,
            max_global_discount_bps: 10_000,
            updated_at: Utc::now(),
        }
    }

    fn terminal() -> PointOfSale {
        PointOfSale {
            id: "pos-1".to_string(),
            organization_id: DEFAULT_ORGANIZATION_ID.to_string(),
            location_id: "loc-1".to_string(),
            number: 3,
            description: None,
            is_fiscal: true,
            is_active: true,
        }
    }

    fn product(id: &str, price: i64, stock: Option<i64>) -> Product {
        Product {
            id: id.to_string(),
            organization_id: DEFAULT_ORGANIZATION_ID.to_string(),
            category_id: None,
            supplier_id: None,
            sku: format!("SKU-{}", id),
            barcode: None,
            name: format!("Producto {}", id),
            description: None,
            price_cents: price,
            cost_cents: None,
            tax_rate_bps: 2100,
            track_inventory: stock.is_some(),
            allow_negative_stock: false,
            current_stock: stock,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn pay(method: PaymentMethod, cents: i64) -> PaymentInput {
        PaymentInput {
            method,
            amount: Money::from_cents(cents),
            reference: None,
        }
    }

    fn ctx<'a>(fiscal: &'a FiscalConfig, pos: &'a PointOfSale, customer: Option<&'a Customer>) -> CheckoutContext<'a> {
        CheckoutContext {
            fiscal,
            point_of_sale: pos,
            customer,
            user_id: "cajero",
            device_id: "caja-1",
            now: Utc::now(),
        }
    }

    #[test]
    fn test_checkout_builds_sale_rows() {
        let config = fiscal(TaxCondition::ResponsableInscripto);
        let pos = terminal();
        let products = vec![product("1", 10_000, Some(10)), product("2", 2_500, None)];

        let mut cart = Cart::new();
        cart.add_item(&products[0], 2).unwrap();
        cart.add_item(&products[1], 1).unwrap();
        cart.set_item_discount("1", Some(Discount::Percentage(1000))).unwrap();

        // 180.00 + 25.00
        let payments = vec![pay(PaymentMethod::DebitCard, 10_000), pay(PaymentMethod::Cash, 20_000)];
        let plan = build_checkout(&cart, &payments, &ctx(&config, &pos, None), &products).unwrap();

        assert_eq!(plan.sale.total_cents, 20_500);
        assert_eq!(plan.sale.voucher_type, VoucherType::FacturaB);
        assert_eq!(plan.sale.point_of_sale_number, 3);
        assert_eq!(plan.items.len(), 2);
        assert_eq!(plan.items[0].discount_cents, 2_000);
        assert_eq!(plan.payments.len(), 2);
        assert_eq!(plan.payments[1].amount_cents, 10_500);
        assert_eq!(plan.payments[1].change_cents, Some(9_500));
        assert_eq!(plan.change_due.cents(), 9_500);

        // Only the tracked product moves stock
        assert_eq!(
            plan.stock_movements,
            vec![StockMovement {
                product_id: "1".to_string(),
                delta: -2
            }]
        );

        let line_sum: i64 = plan.items.iter().map(|i| i.total_cents).sum();
        assert_eq!(line_sum, plan.sale.total_cents);
    }

    #[test]
    fn test_checkout_rejects_empty_cart() {
        let config = fiscal(TaxCondition::ResponsableInscripto);
        let pos = terminal();
        let result = build_checkout(&Cart::new(), &[], &ctx(&config, &pos, None), &[]);
        assert!(matches!(result, Err(CoreError::EmptyCart)));
    }

    #[test]
    fn test_checkout_rejects_unbalanced_payments() {
        let config = fiscal(TaxCondition::ResponsableInscripto);
        let pos = terminal();
        let products = vec![product("1", 10_000, None)];
        let mut cart = Cart::new();
        cart.add_item(&products[0], 1).unwrap();

        let result = build_checkout(
            &cart,
            &[pay(PaymentMethod::DebitCard, 9_000)],
            &ctx(&config, &pos, None),
            &products,
        );
        assert!(matches!(result, Err(CoreError::PaymentsUnbalanced { .. })));
    }

    #[test]
    fn test_checkout_rejects_insufficient_stock() {
        let config = fiscal(TaxCondition::Monotributo);
        let pos = terminal();
        let mut products = vec![product("1", 1_000, Some(5))];
        let mut cart = Cart::new();
        cart.add_item(&products[0], 3).unwrap();

        // Stock dropped after the item was added
        products[0].current_stock = Some(2);
        let result = build_checkout(
            &cart,
            &[pay(PaymentMethod::Cash, 3_000)],
            &ctx(&config, &pos, None),
            &products,
        );
        assert!(matches!(
            result,
            Err(CoreError::InsufficientStock { available: 2, requested: 3, .. })
        ));
    }

    #[test]
    fn test_factura_a_needs_customer_cuit() {
        let config = fiscal(TaxCondition::ResponsableInscripto);
        let pos = terminal();
        let products = vec![product("1", 1_000, None)];
        let mut cart = Cart::new();
        cart.add_item(&products[0], 1).unwrap();

        let mut customer = Customer {
            id: "c1".to_string(),
            organization_id: DEFAULT_ORGANIZATION_ID.to_string(),
            name: "Kiosco Central".to_string(),
            cuit: None,
            tax_condition: TaxCondition::ResponsableInscripto,
            email: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let payments = [pay(PaymentMethod::Cash, 1_000)];

        let result = build_checkout(&cart, &payments, &ctx(&config, &pos, Some(&customer)), &products);
        assert!(matches!(result, Err(CoreError::CustomerRequired { .. })));

        customer.cuit = Some("20-12345678-6".to_string());
        let plan = build_checkout(&cart, &payments, &ctx(&config, &pos, Some(&customer)), &products).unwrap();
        assert_eq!(plan.sale.voucher_type, VoucherType::FacturaA);
        assert_eq!(plan.sale.customer_id.as_deref(), Some("c1"));
    }

    #[test]
    fn test_monotributo_sale_has_no_iva() {
        let config = fiscal(TaxCondition::Monotributo);
        let pos = terminal();
        let products = vec![product("1", 12_100, None)];
        let mut cart = Cart::new();
        cart.add_item(&products[0], 1).unwrap();

        let plan = build_checkout(
            &cart,
            &[pay(PaymentMethod::QrCode, 12_100)],
            &ctx(&config, &pos, None),
            &products,
        )
        .unwrap();
        assert_eq!(plan.sale.voucher_type, VoucherType::FacturaC);
        assert_eq!(plan.sale.tax_cents, 0);
    }

    #[test]
    fn test_plan_cancellation_returns_stock() {
        let config = fiscal(TaxCondition::ResponsableInscripto);
        let pos = terminal();
        let products = vec![product("1", 1_000, Some(10)), product("2", 500, None)];
        let mut cart = Cart::new();
        cart.add_item(&products[0], 4).unwrap();
        cart.add_item(&products[1], 1).unwrap();

        let mut plan = build_checkout(
            &cart,
            &[pay(PaymentMethod::Cash, 4_500)],
            &ctx(&config, &pos, None),
            &products,
        )
        .unwrap();
        plan.assign_voucher_number(7);

        let cancel = plan_cancellation(&plan.sale, &plan.items, &["1".to_string()]).unwrap();
        assert_eq!(cancel.credit_note, Some(VoucherType::NotaCreditoB));
        assert_eq!(cancel.stock_movements.len(), 1);
        assert_eq!(cancel.stock_movements[0].delta, 4);

        plan.sale.status = SaleStatus::Cancelled;
        assert!(matches!(
            plan_cancellation(&plan.sale, &plan.items, &[]),
            Err(CoreError::SaleAlreadyCancelled(_))
        ));
    }
}
