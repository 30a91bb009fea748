//! End-to-end tests of the back office commands against an in-memory
//! database.
//!
//! Tests cover:
//! - Fiscal setup → cart pricing with item and global discounts
//! - Split payments, checkout, voucher numbering and stock
//! - Cancellation with credit note
//! - Factura A for registered customers
//! - Supplier purchases, duplicates and supplier payments
//! - Organization scoping and guarded stock adjustments
//! - Monotributo receipts without IVA breakdown

use chrono::NaiveDate;

use mostrador_backoffice::commands::{cart, fiscal, party, product, purchase, sale};
use mostrador_backoffice::error::ErrorCode;
use mostrador_backoffice::state::ConfigState;
use mostrador_backoffice::{bootstrap_with, AppState};
use mostrador_core::fiscal::{TaxCondition, VoucherType};
use mostrador_core::pricing::{Discount, TaxMode};
use mostrador_core::purchase::{PurchaseDraft, PurchaseLineInput, SupplierPaymentInput};
use mostrador_core::split::PaymentInput;
use mostrador_core::{Money, PaymentMethod, SaleStatus, TaxRate};
use mostrador_db::DbConfig;

async fn setup() -> AppState {
    setup_as(TaxCondition::ResponsableInscripto).await
}

async fn setup_as(tax_condition: TaxCondition) -> AppState {
    let app = bootstrap_with(ConfigState::default(), DbConfig::in_memory())
        .await
        .unwrap();

    let location = fiscal::create_location(&app.db, &app.config, "Casa central".to_string(), None)
        .await
        .unwrap();
    let pos = fiscal::create_point_of_sale(
        &app.db,
        &app.config,
        fiscal::PointOfSaleInput {
            location_id: location.id,
            number: 3,
            description: Some("Caja 1".to_string()),
            is_fiscal: true,
        },
    )
    .await
    .unwrap();

    fiscal::save_fiscal_config(
        &app.db,
        &app.config,
        fiscal::FiscalConfigInput {
            legal_name: "Almacén Don Pepe SRL".to_string(),
            cuit: "30712345671".to_string(),
            tax_condition,
            gross_income_number: None,
            activity_start_date: NaiveDate::from_ymd_opt(2020, 3, 1),
            invoicing_enabled: true,
            default_point_of_sale_id: Some(pos.id),
            tax_mode: TaxMode::Inclusive,
            max_global_discount_bps: 1_000,
        },
    )
    .await
    .unwrap();

    app
}

fn product_input(sku: &str, price_cents: i64, stock: i64) -> product::ProductInput {
    product::ProductInput {
        category_id: None,
        supplier_id: None,
        sku: sku.to_string(),
        barcode: None,
        name: format!("Producto {}", sku),
        description: None,
        price_cents,
        cost_cents: None,
        tax_rate_bps: 2100,
        track_inventory: true,
        allow_negative_stock: false,
        initial_stock: Some(stock),
    }
}

fn pay(method: PaymentMethod, cents: i64) -> PaymentInput {
    PaymentInput {
        method,
        amount: Money::from_cents(cents),
        reference: None,
    }
}

/// Two units at $100 with 10% off the line and 10% off the cart: $162.
async fn fill_cart(app: &AppState, product_id: &str) {
    cart::add_to_cart(&app.db, &app.cart, &app.config, product_id, Some(2))
        .await
        .unwrap();
    cart::set_item_discount(&app.db, &app.cart, &app.config, product_id, Some(Discount::Percentage(1_000)))
        .await
        .unwrap();
    let response = cart::set_global_discount(&app.db, &app.cart, &app.config, Some(Discount::Percentage(1_000)))
        .await
        .unwrap();
    assert_eq!(response.totals.total.cents(), 16_200);
}

#[tokio::test]
async fn test_checkout_with_discounts_and_split_payment() {
    let app = setup().await;
    let yerba = product::create_product(&app.db, &app.config, product_input("YERBA-1KG", 10_000, 5))
        .await
        .unwrap();

    fill_cart(&app, &yerba.id).await;

    // Preview: card covers part, nothing is written
    let status = sale::reconcile_payments(&app.db, &app.cart, &app.config, &[pay(PaymentMethod::DebitCard, 10_000)])
        .await
        .unwrap();
    assert_eq!(status.remaining_cents, 6_200);
    assert!(!status.complete);

    let err = sale::reconcile_payments(
        &app.db,
        &app.cart,
        &app.config,
        &[pay(PaymentMethod::DebitCard, 10_000), pay(PaymentMethod::CreditCard, 9_000)],
    )
    .await
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::PaymentError);

    let receipt = sale::checkout(
        &app.db,
        &app.cart,
        &app.config,
        &[pay(PaymentMethod::DebitCard, 10_000), pay(PaymentMethod::Cash, 10_000)],
        "cajero-1",
    )
    .await
    .unwrap();

    assert_eq!(receipt.voucher_type, VoucherType::FacturaB);
    assert_eq!(receipt.voucher_number, "00003-00000001");
    assert_eq!(receipt.total_cents, 16_200);
    assert_eq!(receipt.item_discount_cents, 2_000);
    assert_eq!(receipt.global_discount_cents, 1_800);
    assert_eq!(receipt.change_cents, 3_800);
    assert_eq!(receipt.payments.len(), 2);
    assert_eq!(receipt.issuer_cuit.as_deref(), Some("30-71234567-1"));
    assert!(!receipt.itemizes_iva);

    let cart_now = cart::get_cart(&app.db, &app.cart, &app.config).await.unwrap();
    assert!(cart_now.items.is_empty());

    let stock = product::get_product(&app.db, &app.config, &yerba.id).await.unwrap().current_stock;
    assert_eq!(stock, Some(3));

    // Next sale continues the sequence
    cart::add_to_cart(&app.db, &app.cart, &app.config, &yerba.id, Some(1))
        .await
        .unwrap();
    let second = sale::checkout(&app.db, &app.cart, &app.config, &[pay(PaymentMethod::Cash, 10_000)], "cajero-1")
        .await
        .unwrap();
    assert_eq!(second.voucher_number, "00003-00000002");
}

#[tokio::test]
async fn test_failed_checkout_keeps_cart() {
    let app = setup().await;
    let leche = product::create_product(&app.db, &app.config, product_input("LECHE-1L", 10_000, 1))
        .await
        .unwrap();

    fill_cart(&app, &leche.id).await;

    let err = sale::checkout(&app.db, &app.cart, &app.config, &[pay(PaymentMethod::Cash, 10_000)], "cajero-1")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::PaymentError);

    // Two units in the cart, one on the shelf
    let err = sale::checkout(&app.db, &app.cart, &app.config, &[pay(PaymentMethod::Cash, 16_200)], "cajero-1")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InsufficientStock);

    assert_eq!(app.cart.with_cart(|c| c.total_quantity()), 2);
    assert!(sale::list_recent_sales(&app.db, &app.config, None).await.unwrap().is_empty());

    let err = sale::checkout(&app.db, &app.cart, &app.config, &[], "cajero-1").await;
    assert!(err.is_err());
}

#[tokio::test]
async fn test_global_discount_is_capped() {
    let app = setup().await;
    let p = product::create_product(&app.db, &app.config, product_input("FERNET-750", 10_000, 10))
        .await
        .unwrap();

    cart::add_to_cart(&app.db, &app.cart, &app.config, &p.id, Some(2))
        .await
        .unwrap();
    let response = cart::set_global_discount(&app.db, &app.cart, &app.config, Some(Discount::Percentage(5_000)))
        .await
        .unwrap();

    assert!(response.totals.global_discount_capped);
    assert_eq!(response.totals.global_discount.cents(), 2_000);
    assert_eq!(response.totals.total.cents(), 18_000);
}

#[tokio::test]
async fn test_cancel_issues_credit_note_and_returns_stock() {
    let app = setup().await;
    let p = product::create_product(&app.db, &app.config, product_input("ARROZ-1KG", 10_000, 5))
        .await
        .unwrap();

    fill_cart(&app, &p.id).await;
    let receipt = sale::checkout(&app.db, &app.cart, &app.config, &[pay(PaymentMethod::Cash, 16_200)], "cajero-1")
        .await
        .unwrap();

    let cancelled = sale::cancel_sale(&app.db, &app.config, &receipt.sale_id).await.unwrap();
    assert_eq!(cancelled.status, SaleStatus::Cancelled);
    assert_eq!(cancelled.credit_note.as_deref(), Some("Nota de Crédito B 00003-00000001"));

    let stock = product::get_product(&app.db, &app.config, &p.id).await.unwrap().current_stock;
    assert_eq!(stock, Some(5));

    let err = sale::cancel_sale(&app.db, &app.config, &receipt.sale_id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Conflict);

    // A product with sales history is archived, not deleted
    let outcome = product::delete_product(&app.db, &app.config, &p.id).await.unwrap();
    assert_eq!(outcome, mostrador_db::DeleteOutcome::Archived);
}

#[tokio::test]
async fn test_registered_customer_gets_factura_a() {
    let app = setup().await;
    let p = product::create_product(&app.db, &app.config, product_input("HARINA-1KG", 12_100, 10))
        .await
        .unwrap();
    let customer = party::create_customer(
        &app.db,
        &app.config,
        party::CustomerInput {
            name: "Panadería La Espiga".to_string(),
            cuit: Some("20-12345678-6".to_string()),
            tax_condition: TaxCondition::ResponsableInscripto,
            email: None,
        },
    )
    .await
    .unwrap();

    cart::add_to_cart(&app.db, &app.cart, &app.config, &p.id, Some(1))
        .await
        .unwrap();
    cart::set_cart_customer(&app.db, &app.cart, &app.config, Some(customer.id.clone()))
        .await
        .unwrap();

    let preview = fiscal::preview_next_voucher(&app.db, &app.cart, &app.config).await.unwrap();
    assert_eq!(preview.voucher_type, VoucherType::FacturaA);
    assert_eq!(preview.number, "00003-00000001");
    assert!(preview.requires_customer);

    let receipt = sale::checkout(&app.db, &app.cart, &app.config, &[pay(PaymentMethod::BankTransfer, 12_100)], "cajero-1")
        .await
        .unwrap();
    assert_eq!(receipt.voucher_type, VoucherType::FacturaA);
    assert_eq!(receipt.voucher_number, "00003-00000001");
    assert!(receipt.itemizes_iva);
    assert_eq!(receipt.tax_cents, 2_100);
    assert_eq!(receipt.tax_breakdown.len(), 1);
    assert_eq!(receipt.tax_breakdown[0].taxable_cents, 10_000);
    assert_eq!(receipt.customer_cuit.as_deref(), Some("20-12345678-6"));
}

#[tokio::test]
async fn test_purchase_registration_and_supplier_payment() {
    let app = setup().await;
    let p = product::create_product(&app.db, &app.config, product_input("AZUCAR-1KG", 9_000, 5))
        .await
        .unwrap();
    let supplier = party::create_supplier(
        &app.db,
        &app.config,
        party::SupplierInput {
            business_name: "Distribuidora del Litoral SA".to_string(),
            cuit: Some("30-71234567-1".to_string()),
            tax_condition: TaxCondition::ResponsableInscripto,
            email: None,
            phone: None,
        },
    )
    .await
    .unwrap();
    let order = purchase::create_purchase_order(&app.db, &app.config, &supplier.id, None)
        .await
        .unwrap();

    let draft = PurchaseDraft {
        supplier_id: supplier.id.clone(),
        purchase_order_id: Some(order.id.clone()),
        voucher_type: VoucherType::FacturaA,
        point_of_sale_number: 2,
        voucher_number: 42,
        issue_date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
        items: vec![PurchaseLineInput {
            product_id: p.id.clone(),
            quantity: 10,
            unit_cost: Money::from_cents(5_000),
            tax_rate: TaxRate::IVA_GENERAL,
        }],
        perceptions: Money::zero(),
        notes: None,
    };

    let registered = purchase::register_purchase(&app.db, &app.config, draft.clone())
        .await
        .unwrap();
    assert_eq!(registered.totals.net.cents(), 50_000);
    assert_eq!(registered.totals.tax.cents(), 10_500);
    assert_eq!(registered.purchase.total_cents, 60_500);

    let restocked = product::get_product(&app.db, &app.config, &p.id).await.unwrap();
    assert_eq!(restocked.current_stock, Some(15));
    assert_eq!(restocked.cost_cents, Some(5_000));
    assert!(purchase::list_open_purchase_orders(&app.db, &app.config).await.unwrap().is_empty());

    // Same voucher again
    let mut duplicate = draft;
    duplicate.purchase_order_id = None;
    let err = purchase::register_purchase(&app.db, &app.config, duplicate).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Duplicate);

    let payment = purchase::pay_supplier(
        &app.db,
        &app.config,
        SupplierPaymentInput {
            supplier_id: supplier.id.clone(),
            method: PaymentMethod::BankTransfer,
            amount: Money::from_cents(70_000),
            reference: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(payment.allocations.len(), 1);
    assert_eq!(payment.allocations[0].amount_cents, 60_500);
    assert_eq!(payment.payment.unallocated_cents, 9_500);

    let account = purchase::get_supplier_account(&app.db, &app.config, &supplier.id)
        .await
        .unwrap();
    assert!(account.outstanding.is_empty());
    assert_eq!(account.balance_cents, 0);
    assert_eq!(account.credit_cents, 9_500);
}

#[tokio::test]
async fn test_catalog_is_scoped_to_the_organization() {
    let app = setup().await;
    let p = product::create_product(&app.db, &app.config, product_input("FIDEOS-500", 2_500, 4))
        .await
        .unwrap();
    let supplier = party::create_supplier(
        &app.db,
        &app.config,
        party::SupplierInput {
            business_name: "Molinos del Sur SA".to_string(),
            cuit: Some("30-71234567-1".to_string()),
            tax_condition: TaxCondition::ResponsableInscripto,
            email: None,
            phone: None,
        },
    )
    .await
    .unwrap();

    let mut other = app.config.clone();
    other.organization_id = uuid::Uuid::new_v4().to_string();

    let err = product::get_product(&app.db, &other, &p.id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
    let err = product::adjust_stock(&app.db, &other, &p.id, 10).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
    let err = product::delete_product(&app.db, &other, &p.id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
    let err = party::archive_supplier(&app.db, &other, &supplier.id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);

    // untouched in its own organization
    let own = product::get_product(&app.db, &app.config, &p.id).await.unwrap();
    assert_eq!(own.current_stock, Some(4));
    let suppliers = party::list_suppliers(&app.db, &app.config, None).await.unwrap();
    assert!(suppliers.iter().any(|s| s.id == supplier.id && s.is_active));
}

#[tokio::test]
async fn test_stock_adjustment_cannot_go_below_zero() {
    let app = setup().await;
    let p = product::create_product(&app.db, &app.config, product_input("ACEITE-900", 7_000, 3))
        .await
        .unwrap();

    let adjusted = product::adjust_stock(&app.db, &app.config, &p.id, -2).await.unwrap();
    assert_eq!(adjusted.current_stock, Some(1));

    let err = product::adjust_stock(&app.db, &app.config, &p.id, -2).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InsufficientStock);

    let after = product::get_product(&app.db, &app.config, &p.id).await.unwrap();
    assert_eq!(after.current_stock, Some(1));
}

#[tokio::test]
async fn test_monotributo_receipt_has_no_iva_breakdown() {
    let app = setup_as(TaxCondition::Monotributo).await;
    let p = product::create_product(&app.db, &app.config, product_input("GALLETITAS", 12_100, 5))
        .await
        .unwrap();

    cart::add_to_cart(&app.db, &app.cart, &app.config, &p.id, Some(1))
        .await
        .unwrap();
    let receipt = sale::checkout(&app.db, &app.cart, &app.config, &[pay(PaymentMethod::Cash, 12_100)], "cajero-1")
        .await
        .unwrap();

    assert_eq!(receipt.voucher_type, VoucherType::FacturaC);
    assert_eq!(receipt.tax_cents, 0);
    assert_eq!(receipt.items[0].tax_rate_bps, 2100);
    assert!(receipt.tax_breakdown.is_empty());
}
