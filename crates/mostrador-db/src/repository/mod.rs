//! # Repository Module
//!
//! Database repository implementations for Mostrador.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Command                                                                │
//! │       │                                                                 │
//! │       │  db.products().search(org, "yerba", 20)                         │
//! │       ▼                                                                 │
//! │  ProductRepository                                                      │
//! │  ├── search(&self, org, query, limit)                                   │
//! │  ├── get_by_id(&self, id)                                               │
//! │  ├── insert(&self, product)                                             │
//! │  └── delete_or_archive(&self, id)                                       │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Multi-row writes (checkout, cancellation, purchase registration,
//! supplier payments) run inside one transaction: either every row lands
//! or none does.
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Products, search, stock
//! - [`category::CategoryRepository`] - Catalog categories
//! - [`party::SupplierRepository`] / [`party::CustomerRepository`]
//! - [`sale::SaleRepository`] - Checkout, cancellation, voucher sequences
//! - [`purchase::PurchaseRepository`] - Supplier vouchers and payments
//! - [`fiscal::FiscalRepository`] - Fiscal config, locations, points of sale

pub mod category;
pub mod fiscal;
pub mod party;
pub mod product;
pub mod purchase;
pub mod sale;

/// Escapes `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
pub(crate) fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixtures shared by repository tests.

    use chrono::Utc;
    use mostrador_core::fiscal::{FiscalConfig, TaxCondition};
    use mostrador_core::pricing::TaxMode;
    use mostrador_core::{Location, PointOfSale, Product, Supplier, DEFAULT_ORGANIZATION_ID};
    use uuid::Uuid;

    use crate::{Database, DbConfig};

    pub async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub fn product(sku: &str, price_cents: i64, stock: Option<i64>) -> Product {
        Product {
            id: Uuid::new_v4().to_string(),
            organization_id: DEFAULT_ORGANIZATION_ID.to_string(),
            category_id: None,
            supplier_id: None,
            sku: sku.to_string(),
            barcode: None,
            name: format!("Producto {}", sku),
            description: None,
            price_cents,
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

    pub fn supplier(name: &str) -> Supplier {
        Supplier {
            id: Uuid::new_v4().to_string(),
            organization_id: DEFAULT_ORGANIZATION_ID.to_string(),
            business_name: name.to_string(),
            cuit: Some("30-71234567-1".to_string()),
            tax_condition: TaxCondition::ResponsableInscripto,
            email: None,
            phone: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Inserts a location, a fiscal terminal numbered 3 and an RI fiscal config.
    pub async fn fiscal_setup(db: &Database) -> (FiscalConfig, PointOfSale) {
        let location = Location {
            id: Uuid::new_v4().to_string(),
            organization_id: DEFAULT_ORGANIZATION_ID.to_string(),
            name: "Casa central".to_string(),
            address: None,
            is_active: true,
        };
        db.fiscal().insert_location(&location).await.unwrap();

        let pos = PointOfSale {
            id: Uuid::new_v4().to_string(),
            organization_id: DEFAULT_ORGANIZATION_ID.to_string(),
            location_id: location.id.clone(),
            number: 3,
            description: Some("Caja 1".to_string()),
            is_fiscal: true,
            is_active: true,
        };
        db.fiscal().insert_point_of_sale(&pos).await.unwrap();

        let config = FiscalConfig {
            organization_id: DEFAULT_ORGANIZATION_ID.to_string(),
            legal_name: "Almacén Don Pepe SRL".to_string(),
            cuit: "30-71234567-1".to_string(),
            tax_condition: TaxCondition::ResponsableInscripto,
            gross_income_number: None,
            activity_start_date: None,
            invoicing_enabled: true,
            default_point_of_sale_id: Some(pos.id.clone()),
            tax_mode: TaxMode::Inclusive,
            max_global_discount_bps: 10_000,
            updated_at: Utc::now(),
        };
        db.fiscal().save_config(&config).await.unwrap();

        (config, pos)
    }
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("yerba"), "%yerba%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
