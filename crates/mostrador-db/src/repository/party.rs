//! # Supplier and Customer Repositories
//!
//! The two counterparties of the business. Both are soft-deleted so that
//! old purchases and sales keep pointing at a readable record.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::like_pattern;
use mostrador_core::{Customer, Supplier};

const SUPPLIER_COLUMNS: &str =
    "id, organization_id, business_name, cuit, tax_condition, email, phone, is_active, created_at, updated_at";

const CUSTOMER_COLUMNS: &str =
    "id, organization_id, name, cuit, tax_condition, email, is_active, created_at, updated_at";

// =============================================================================
// Suppliers
// =============================================================================

#[derive(Debug, Clone)]
pub struct SupplierRepository {
    pool: SqlitePool,
}

impl SupplierRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SupplierRepository { pool }
    }

    pub async fn insert(&self, supplier: &Supplier) -> DbResult<Supplier> {
        debug!(name = %supplier.business_name, "Inserting supplier");

        sqlx::query(
            r#"
            INSERT INTO suppliers (
                id, organization_id, business_name, cuit, tax_condition,
                email, phone, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&supplier.id)
        .bind(&supplier.organization_id)
        .bind(&supplier.business_name)
        .bind(&supplier.cuit)
        .bind(supplier.tax_condition)
        .bind(&supplier.email)
        .bind(&supplier.phone)
        .bind(supplier.is_active)
        .bind(supplier.created_at)
        .bind(supplier.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(supplier.clone())
    }

    pub async fn update(&self, supplier: &Supplier) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE suppliers SET
                business_name = ?2, cuit = ?3, tax_condition = ?4,
                email = ?5, phone = ?6, is_active = ?7, updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(&supplier.id)
        .bind(&supplier.business_name)
        .bind(&supplier.cuit)
        .bind(supplier.tax_condition)
        .bind(&supplier.email)
        .bind(&supplier.phone)
        .bind(supplier.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Supplier", &supplier.id));
        }
        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Supplier>> {
        let sql = format!("SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE id = ?1");
        let supplier = sqlx::query_as::<_, Supplier>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(supplier)
    }

    /// Active suppliers, optionally filtered by name or CUIT.
    pub async fn list(&self, organization_id: &str, query: Option<&str>) -> DbResult<Vec<Supplier>> {
        let pattern = like_pattern(query.map(str::trim).unwrap_or_default());
        let sql = format!(
            r#"
            SELECT {SUPPLIER_COLUMNS}
            FROM suppliers
            WHERE organization_id = ?1
              AND is_active = 1
              AND (business_name LIKE ?2 ESCAPE '\' OR COALESCE(cuit, '') LIKE ?2 ESCAPE '\')
            ORDER BY business_name
            "#
        );
        let suppliers = sqlx::query_as::<_, Supplier>(&sql)
            .bind(organization_id)
            .bind(pattern)
            .fetch_all(&self.pool)
            .await?;

        Ok(suppliers)
    }

    pub async fn archive(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE suppliers SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Supplier", id));
        }
        Ok(())
    }

    /// Supplier credit: payments not applied to any purchase plus the
    /// unapplied part of credit notes.
    pub async fn credit_balance(&self, supplier_id: &str) -> DbResult<i64> {
        let credit: i64 = sqlx::query_scalar(
            r#"
            SELECT
                (SELECT COALESCE(SUM(unallocated_cents), 0)
                 FROM supplier_payments WHERE supplier_id = ?1)
              + (SELECT COALESCE(SUM(total_cents - paid_cents), 0)
                 FROM purchases
                 WHERE supplier_id = ?1
                   AND voucher_type IN ('nota_credito_a', 'nota_credito_b', 'nota_credito_c')
                   AND status IN ('pending', 'partially_paid'))
            "#,
        )
        .bind(supplier_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(credit)
    }
}

// =============================================================================
// Customers
// =============================================================================

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn insert(&self, customer: &Customer) -> DbResult<Customer> {
        debug!(name = %customer.name, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, organization_id, name, cuit, tax_condition,
                email, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.organization_id)
        .bind(&customer.name)
        .bind(&customer.cuit)
        .bind(customer.tax_condition)
        .bind(&customer.email)
        .bind(customer.is_active)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(customer.clone())
    }

    pub async fn update(&self, customer: &Customer) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE customers SET
                name = ?2, cuit = ?3, tax_condition = ?4,
                email = ?5, is_active = ?6, updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.cuit)
        .bind(customer.tax_condition)
        .bind(&customer.email)
        .bind(customer.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", &customer.id));
        }
        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1");
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(customer)
    }

    /// Active customers, optionally filtered by name or CUIT.
    pub async fn list(&self, organization_id: &str, query: Option<&str>) -> DbResult<Vec<Customer>> {
        let pattern = like_pattern(query.map(str::trim).unwrap_or_default());
        let sql = format!(
            r#"
            SELECT {CUSTOMER_COLUMNS}
            FROM customers
            WHERE organization_id = ?1
              AND is_active = 1
              AND (name LIKE ?2 ESCAPE '\' OR COALESCE(cuit, '') LIKE ?2 ESCAPE '\')
            ORDER BY name
            "#
        );
        let customers = sqlx::query_as::<_, Customer>(&sql)
            .bind(organization_id)
            .bind(pattern)
            .fetch_all(&self.pool)
            .await?;

        Ok(customers)
    }

    pub async fn archive(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE customers SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{supplier, test_db};
    use mostrador_core::fiscal::TaxCondition;
    use mostrador_core::DEFAULT_ORGANIZATION_ID;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_supplier_search_and_archive() {
        let db = test_db().await;
        let repo = db.suppliers();
        let molinos = repo.insert(&supplier("Molinos del Sur SA")).await.unwrap();
        let mut lacteos = supplier("Lácteos Pampa SRL");
        lacteos.cuit = Some("33-69345023-9".to_string());
        repo.insert(&lacteos).await.unwrap();

        assert_eq!(repo.list(DEFAULT_ORGANIZATION_ID, None).await.unwrap().len(), 2);
        assert_eq!(repo.list(DEFAULT_ORGANIZATION_ID, Some("molinos")).await.unwrap().len(), 1);
        assert_eq!(repo.list(DEFAULT_ORGANIZATION_ID, Some("33-6934")).await.unwrap().len(), 1);

        repo.archive(&molinos.id).await.unwrap();
        assert_eq!(repo.list(DEFAULT_ORGANIZATION_ID, None).await.unwrap().len(), 1);
        assert_eq!(repo.credit_balance(&molinos.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_customer_round_trip() {
        let db = test_db().await;
        let now = Utc::now();
        let mut customer = Customer {
            id: Uuid::new_v4().to_string(),
            organization_id: DEFAULT_ORGANIZATION_ID.to_string(),
            name: "Ferretería Norte".to_string(),
            cuit: Some("20-12345678-6".to_string()),
            tax_condition: TaxCondition::Monotributo,
            email: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.customers().insert(&customer).await.unwrap();

        customer.tax_condition = TaxCondition::ResponsableInscripto;
        db.customers().update(&customer).await.unwrap();

        let found = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(found.tax_condition, TaxCondition::ResponsableInscripto);
        assert_eq!(found.cuit.as_deref(), Some("20-12345678-6"));
    }
}
