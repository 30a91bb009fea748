//! # Supplier, Customer and Category Commands
//!
//! Plain maintenance screens: create, edit, list, archive. Nothing is
//! ever hard-deleted because purchases and sales point at these rows.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::{ConfigState, DbState};
use mostrador_core::fiscal::TaxCondition;
use mostrador_core::validation::{validate_cuit, validate_email, validate_name, validate_search_query};
use mostrador_core::{Category, Customer, Supplier};

/// Normalizes an optional CUIT; blank means none.
fn normalize_cuit(cuit: Option<String>) -> Result<Option<String>, ApiError> {
    match cuit.filter(|c| !c.trim().is_empty()) {
        Some(c) => Ok(Some(validate_cuit(&c)?)),
        None => Ok(None),
    }
}

fn normalize_email(email: Option<String>) -> Result<Option<String>, ApiError> {
    match email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()) {
        Some(e) => {
            validate_email(&e)?;
            Ok(Some(e))
        }
        None => Ok(None),
    }
}

/// Registered taxpayers must be identified by CUIT.
fn require_cuit_for(condition: TaxCondition, cuit: &Option<String>) -> Result<(), ApiError> {
    let registered = matches!(
        condition,
        TaxCondition::ResponsableInscripto | TaxCondition::Monotributo | TaxCondition::Exento
    );
    if registered && cuit.is_none() {
        return Err(ApiError::validation(format!(
            "cuit is required for {}",
            condition.label()
        )));
    }
    Ok(())
}

/// Rows of another organization are reported as not found.
fn in_organization<T>(
    row: Option<T>,
    organization_id: impl Fn(&T) -> &str,
    config: &ConfigState,
    entity: &str,
    id: &str,
) -> Result<T, ApiError> {
    row.filter(|r| organization_id(r) == config.organization_id)
        .ok_or_else(|| ApiError::not_found(entity, id))
}

async fn load_supplier(db: &DbState, config: &ConfigState, id: &str) -> Result<Supplier, ApiError> {
    let row = db.inner().suppliers().get_by_id(id).await?;
    in_organization(row, |s: &Supplier| s.organization_id.as_str(), config, "Supplier", id)
}

async fn load_customer(db: &DbState, config: &ConfigState, id: &str) -> Result<Customer, ApiError> {
    let row = db.inner().customers().get_by_id(id).await?;
    in_organization(row, |c: &Customer| c.organization_id.as_str(), config, "Customer", id)
}

fn optional_query(query: Option<&str>) -> Result<Option<String>, ApiError> {
    Ok(query.map(validate_search_query).transpose()?.filter(|q| !q.is_empty()))
}

// =============================================================================
// Suppliers
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierInput {
    pub business_name: String,
    pub cuit: Option<String>,
    pub tax_condition: TaxCondition,
    pub email: Option<String>,
    pub phone: Option<String>,
}

pub async fn create_supplier(
    db: &DbState,
    config: &ConfigState,
    input: SupplierInput,
) -> Result<Supplier, ApiError> {
    debug!(name = %input.business_name, "create_supplier command");
    validate_name("business_name", &input.business_name, 200)?;
    let cuit = normalize_cuit(input.cuit)?;
    require_cuit_for(input.tax_condition, &cuit)?;

    let now = Utc::now();
    let supplier = db
        .inner()
        .suppliers()
        .insert(&Supplier {
            id: Uuid::new_v4().to_string(),
            organization_id: config.organization_id.clone(),
            business_name: input.business_name.trim().to_string(),
            cuit,
            tax_condition: input.tax_condition,
            email: normalize_email(input.email)?,
            phone: input.phone.filter(|p| !p.trim().is_empty()),
            is_active: true,
            created_at: now,
            updated_at: now,
        })
        .await?;

    info!(supplier_id = %supplier.id, name = %supplier.business_name, "Supplier created");
    Ok(supplier)
}

pub async fn update_supplier(
    db: &DbState,
    config: &ConfigState,
    id: &str,
    input: SupplierInput,
) -> Result<Supplier, ApiError> {
    debug!(id = %id, "update_supplier command");
    validate_name("business_name", &input.business_name, 200)?;
    let cuit = normalize_cuit(input.cuit)?;
    require_cuit_for(input.tax_condition, &cuit)?;

    let mut supplier = load_supplier(db, config, id).await?;

    supplier.business_name = input.business_name.trim().to_string();
    supplier.cuit = cuit;
    supplier.tax_condition = input.tax_condition;
    supplier.email = normalize_email(input.email)?;
    supplier.phone = input.phone.filter(|p| !p.trim().is_empty());
    supplier.updated_at = Utc::now();

    db.inner().suppliers().update(&supplier).await?;
    Ok(supplier)
}

pub async fn list_suppliers(
    db: &DbState,
    config: &ConfigState,
    query: Option<&str>,
) -> Result<Vec<Supplier>, ApiError> {
    let query = optional_query(query)?;
    Ok(db
        .inner()
        .suppliers()
        .list(&config.organization_id, query.as_deref())
        .await?)
}

pub async fn archive_supplier(db: &DbState, config: &ConfigState, id: &str) -> Result<(), ApiError> {
    debug!(id = %id, "archive_supplier command");
    let supplier = load_supplier(db, config, id).await?;
    db.inner().suppliers().archive(&supplier.id).await?;
    info!(supplier_id = %id, "Supplier archived");
    Ok(())
}

// =============================================================================
// Customers
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInput {
    pub name: String,
    pub cuit: Option<String>,
    pub tax_condition: TaxCondition,
    pub email: Option<String>,
}

pub async fn create_customer(
    db: &DbState,
    config: &ConfigState,
    input: CustomerInput,
) -> Result<Customer, ApiError> {
    debug!(name = %input.name, "create_customer command");
    validate_name("name", &input.name, 200)?;
    let cuit = normalize_cuit(input.cuit)?;
    require_cuit_for(input.tax_condition, &cuit)?;

    let now = Utc::now();
    let customer = db
        .inner()
        .customers()
        .insert(&Customer {
            id: Uuid::new_v4().to_string(),
            organization_id: config.organization_id.clone(),
            name: input.name.trim().to_string(),
            cuit,
            tax_condition: input.tax_condition,
            email: normalize_email(input.email)?,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
        .await?;

    info!(customer_id = %customer.id, "Customer created");
    Ok(customer)
}

pub async fn update_customer(
    db: &DbState,
    config: &ConfigState,
    id: &str,
    input: CustomerInput,
) -> Result<Customer, ApiError> {
    debug!(id = %id, "update_customer command");
    validate_name("name", &input.name, 200)?;
    let cuit = normalize_cuit(input.cuit)?;
    require_cuit_for(input.tax_condition, &cuit)?;

    let mut customer = load_customer(db, config, id).await?;

    customer.name = input.name.trim().to_string();
    customer.cuit = cuit;
    customer.tax_condition = input.tax_condition;
    customer.email = normalize_email(input.email)?;
    customer.updated_at = Utc::now();

    db.inner().customers().update(&customer).await?;
    Ok(customer)
}

pub async fn list_customers(
    db: &DbState,
    config: &ConfigState,
    query: Option<&str>,
) -> Result<Vec<Customer>, ApiError> {
    let query = optional_query(query)?;
    Ok(db
        .inner()
        .customers()
        .list(&config.organization_id, query.as_deref())
        .await?)
}

pub async fn archive_customer(db: &DbState, config: &ConfigState, id: &str) -> Result<(), ApiError> {
    debug!(id = %id, "archive_customer command");
    let customer = load_customer(db, config, id).await?;
    db.inner().customers().archive(&customer.id).await?;
    Ok(())
}

// =============================================================================
// Categories
// =============================================================================

pub async fn create_category(db: &DbState, config: &ConfigState, name: &str) -> Result<Category, ApiError> {
    debug!(name = %name, "create_category command");
    validate_name("name", name, 100)?;

    let category = db
        .inner()
        .categories()
        .insert(&Category {
            id: Uuid::new_v4().to_string(),
            organization_id: config.organization_id.clone(),
            name: name.trim().to_string(),
            is_active: true,
            created_at: Utc::now(),
        })
        .await?;
    Ok(category)
}

async fn load_category(db: &DbState, config: &ConfigState, id: &str) -> Result<Category, ApiError> {
    let row = db.inner().categories().get_by_id(id).await?;
    in_organization(row, |c: &Category| c.organization_id.as_str(), config, "Category", id)
}

pub async fn rename_category(db: &DbState, config: &ConfigState, id: &str, name: &str) -> Result<(), ApiError> {
    debug!(id = %id, name = %name, "rename_category command");
    validate_name("name", name, 100)?;
    let category = load_category(db, config, id).await?;
    db.inner().categories().rename(&category.id, name.trim()).await?;
    Ok(())
}

pub async fn list_categories(db: &DbState, config: &ConfigState) -> Result<Vec<Category>, ApiError> {
    Ok(db.inner().categories().list(&config.organization_id).await?)
}

/// Archives a category. Its products keep pointing at it.
pub async fn archive_category(db: &DbState, config: &ConfigState, id: &str) -> Result<(), ApiError> {
    debug!(id = %id, "archive_category command");
    let category = load_category(db, config, id).await?;
    db.inner().categories().archive(&category.id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_cuit_is_normalized_and_checked() {
        assert_eq!(
            normalize_cuit(Some("20123456786".to_string())).unwrap(),
            Some("20-12345678-6".to_string())
        );
        assert_eq!(normalize_cuit(Some("  ".to_string())).unwrap(), None);

        let err = normalize_cuit(Some("20-12345678-0".to_string())).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[test]
    fn test_registered_taxpayers_need_cuit() {
        assert!(require_cuit_for(TaxCondition::ResponsableInscripto, &None).is_err());
        assert!(require_cuit_for(TaxCondition::ConsumidorFinal, &None).is_ok());
        assert!(require_cuit_for(TaxCondition::Monotributo, &Some("20-12345678-6".to_string())).is_ok());
    }
}
