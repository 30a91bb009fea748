//! # Seed Data Generator
//!
//! Fills a database with a demo store: fiscal identity, one location with
//! a fiscal terminal, categories, suppliers and a grocery catalog.
//!
//! ## Usage
//! ```bash
//! cargo run -p mostrador-db --bin seed
//!
//! # Specify database path and catalog size
//! cargo run -p mostrador-db --bin seed -- --db ./data/mostrador.db --count 2000
//! ```
//!
//! Each product has:
//! - SKU `{CATEGORY}-{NAME}-{INDEX}`
//! - An EAN-13-looking barcode with the Argentine 779 prefix
//! - Price between $500 and $7.000, tax-inclusive
//! - IVA 21% or 10.5% (basic foods)

use std::env;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use mostrador_core::fiscal::{FiscalConfig, TaxCondition};
use mostrador_core::pricing::TaxMode;
use mostrador_core::{Category, Location, PointOfSale, Product, Supplier, TaxRate, DEFAULT_ORGANIZATION_ID};
use mostrador_db::{Database, DbConfig};

/// Category code, display name, IVA rate, products.
const CATALOG: &[(&str, &str, TaxRate, &[&str])] = &[
    (
        "ALM",
        "Almacén",
        TaxRate::IVA_REDUCED,
        &[
            "Yerba mate",
            "Harina 000",
            "Fideos tallarines",
            "Arroz largo fino",
            "Azúcar",
            "Aceite de girasol",
            "Dulce de leche",
            "Polenta",
            "Lentejas",
            "Tomate triturado",
        ],
    ),
    (
        "BEB",
        "Bebidas",
        TaxRate::IVA_GENERAL,
        &[
            "Agua mineral",
            "Soda en sifón",
            "Gaseosa cola",
            "Gaseosa lima limón",
            "Jugo de naranja",
            "Cerveza rubia",
            "Vino tinto malbec",
            "Fernet",
            "Agua saborizada",
            "Amargo serrano",
        ],
    ),
    (
        "LAC",
        "Lácteos",
        TaxRate::IVA_REDUCED,
        &[
            "Leche entera",
            "Leche descremada",
            "Yogur bebible",
            "Queso cremoso",
            "Queso rallado",
            "Manteca",
            "Crema de leche",
            "Ricota",
        ],
    ),
    (
        "LIM",
        "Limpieza",
        TaxRate::IVA_GENERAL,
        &[
            "Lavandina",
            "Detergente",
            "Jabón en polvo",
            "Suavizante",
            "Limpiador de pisos",
            "Esponja",
        ],
    ),
];

const SIZES: &[(&str, i64)] = &[("chico", 0), ("mediano", 35_000), ("grande", 80_000), ("pack x6", 250_000)];

const SUPPLIERS: &[(&str, &str, TaxCondition)] = &[
    ("Distribuidora del Litoral SA", "30-71234567-1", TaxCondition::ResponsableInscripto),
    ("Lácteos Pampa SRL", "33-69345023-9", TaxCondition::ResponsableInscripto),
    ("Juan Pérez (limpieza)", "20-12345678-6", TaxCondition::Monotributo),
];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = 1000;
    let mut db_path = String::from("./mostrador_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if let Some(value) = args.get(i + 1) {
                    count = value.parse().context("--count expects a number")?;
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if let Some(value) = args.get(i + 1) {
                    db_path = value.clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Mostrador seed data generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Maximum number of products (default: 1000)");
                println!("  -d, --db <PATH>    Database file path (default: ./mostrador_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => warn!(argument = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    info!(db = %db_path, count, "Seeding database");

    let db = Database::new(DbConfig::new(&db_path))
        .await
        .with_context(|| format!("opening {}", db_path))?;

    let existing = db.products().count(DEFAULT_ORGANIZATION_ID).await?;
    if existing > 0 {
        warn!(existing, "Database already has products, skipping seed. Delete the file to regenerate");
        return Ok(());
    }

    seed_fiscal(&db).await?;
    let supplier_ids = seed_suppliers(&db).await?;

    let start = std::time::Instant::now();
    let mut generated = 0usize;

    'catalog: for (category_idx, (code, category_name, rate, names)) in CATALOG.iter().enumerate() {
        let category = db
            .categories()
            .insert(&Category {
                id: Uuid::new_v4().to_string(),
                organization_id: DEFAULT_ORGANIZATION_ID.to_string(),
                name: category_name.to_string(),
                is_active: true,
                created_at: Utc::now(),
            })
            .await?;

        for (name_idx, name) in names.iter().enumerate() {
            for (size_idx, (size, price_addon)) in SIZES.iter().enumerate() {
                if generated >= count {
                    break 'catalog;
                }

                let seed = category_idx * 1000 + name_idx * 10 + size_idx;
                let supplier_id = supplier_ids.get(category_idx % supplier_ids.len()).cloned();
                let product = generate_product(code, name, size, *price_addon, *rate, &category.id, supplier_id, seed);

                if let Err(e) = db.products().insert(&product).await {
                    warn!(sku = %product.sku, error = %e, "Failed to insert product");
                    continue;
                }
                generated += 1;
            }
        }
    }

    info!(generated, elapsed = ?start.elapsed(), "Catalog generated");

    let sample = db.products().search(DEFAULT_ORGANIZATION_ID, "yerba", 10).await?;
    info!(results = sample.len(), "Search 'yerba'");

    info!("Seed complete");
    Ok(())
}

async fn seed_fiscal(db: &Database) -> Result<()> {
    let location = db
        .fiscal()
        .insert_location(&Location {
            id: Uuid::new_v4().to_string(),
            organization_id: DEFAULT_ORGANIZATION_ID.to_string(),
            name: "Casa central".to_string(),
            address: Some("Av. Corrientes 1234, CABA".to_string()),
            is_active: true,
        })
        .await?;

    let pos = db
        .fiscal()
        .insert_point_of_sale(&PointOfSale {
            id: Uuid::new_v4().to_string(),
            organization_id: DEFAULT_ORGANIZATION_ID.to_string(),
            location_id: location.id,
            number: 1,
            description: Some("Caja 1".to_string()),
            is_fiscal: true,
            is_active: true,
        })
        .await?;

    let config = FiscalConfig {
        organization_id: DEFAULT_ORGANIZATION_ID.to_string(),
        legal_name: "Almacén Demo SRL".to_string(),
        cuit: "30-71234567-1".to_string(),
        tax_condition: TaxCondition::ResponsableInscripto,
        gross_income_number: Some("901-123456-7".to_string()),
        activity_start_date: NaiveDate::from_ymd_opt(2020, 3, 1),
        invoicing_enabled: true,
        default_point_of_sale_id: Some(pos.id),
        tax_mode: TaxMode::Inclusive,
        max_global_discount_bps: 2_000,
        updated_at: Utc::now(),
    };
    config.validate().context("demo fiscal config is invalid")?;
    db.fiscal().save_config(&config).await?;

    info!("Fiscal configuration seeded");
    Ok(())
}

async fn seed_suppliers(db: &Database) -> Result<Vec<String>> {
    let mut ids = Vec::with_capacity(SUPPLIERS.len());
    for (name, cuit, condition) in SUPPLIERS {
        let now = Utc::now();
        let supplier = db
            .suppliers()
            .insert(&Supplier {
                id: Uuid::new_v4().to_string(),
                organization_id: DEFAULT_ORGANIZATION_ID.to_string(),
                business_name: name.to_string(),
                cuit: Some(cuit.to_string()),
                tax_condition: *condition,
                email: None,
                phone: None,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await?;
        ids.push(supplier.id);
    }
    info!(count = ids.len(), "Suppliers seeded");
    Ok(ids)
}

#[allow(clippy::too_many_arguments)]
fn generate_product(
    category: &str,
    name: &str,
    size: &str,
    price_addon: i64,
    rate: TaxRate,
    category_id: &str,
    supplier_id: Option<String>,
    seed: usize,
) -> Product {
    let now = Utc::now();

    let short: String = name
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .take(3)
        .collect::<String>()
        .to_uppercase();
    let sku = format!("{}-{}-{:04}", category, short, seed);
    let barcode = Some(format!("779{:010}", seed));

    // $500 - $4.500 base plus size addon, in cents
    let price_cents = 50_000 + ((seed * 1_733) % 400_000) as i64 + price_addon;
    let cost_pct = 55 + (seed % 20) as i64;
    let cost_cents = Some(price_cents * cost_pct / 100);

    Product {
        id: Uuid::new_v4().to_string(),
        organization_id: DEFAULT_ORGANIZATION_ID.to_string(),
        category_id: Some(category_id.to_string()),
        supplier_id,
        sku,
        barcode,
        name: format!("{} {}", name, size),
        description: None,
        price_cents,
        cost_cents,
        tax_rate_bps: rate.bps(),
        track_inventory: true,
        allow_negative_stock: false,
        current_stock: Some((seed % 101) as i64),
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
