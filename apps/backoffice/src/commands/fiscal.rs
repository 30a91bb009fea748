//! # Fiscal Commands
//!
//! Fiscal identity, locations, points of sale and voucher numbering.
//!
//! ## Setup Order
//! ```text
//! create_location ──► create_point_of_sale ──► save_fiscal_config
//!                                               (default_point_of_sale_id)
//! ```
//! Until a fiscal configuration exists the cart still prices with the
//! default policy, but checkout is refused.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::{CartState, ConfigState, DbState};
use mostrador_core::fiscal::{select_sale_voucher, FiscalConfig, TaxCondition, VoucherNumber, VoucherType};
use mostrador_core::pricing::{PricingPolicy, TaxMode};
use mostrador_core::validation::{validate_cuit, validate_name, validate_point_of_sale_number};
use mostrador_core::{Location, PointOfSale};
use mostrador_db::Database;

// =============================================================================
// Shared lookups
// =============================================================================

/// Pricing policy of the organization, or the retail default before setup.
pub(crate) async fn pricing_policy(db: &Database, organization_id: &str) -> Result<PricingPolicy, ApiError> {
    let policy = db
        .fiscal()
        .get_config(organization_id)
        .await?
        .map(|config| config.pricing_policy())
        .unwrap_or_default();
    Ok(policy)
}

pub(crate) async fn require_fiscal_config(db: &Database, organization_id: &str) -> Result<FiscalConfig, ApiError> {
    db.fiscal()
        .get_config(organization_id)
        .await?
        .ok_or_else(|| ApiError::fiscal("Fiscal configuration is missing"))
}

/// The terminal sales are billed from.
pub(crate) async fn billing_point_of_sale(db: &Database, fiscal: &FiscalConfig) -> Result<PointOfSale, ApiError> {
    let id = fiscal
        .default_point_of_sale_id
        .as_deref()
        .ok_or_else(|| ApiError::fiscal("No default point of sale configured"))?;

    let pos = db
        .fiscal()
        .get_point_of_sale(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Point of sale", id))?;

    if !pos.is_active {
        return Err(ApiError::fiscal(format!(
            "Point of sale {:05} is inactive",
            pos.number
        )));
    }
    Ok(pos)
}

// =============================================================================
// Fiscal configuration
// =============================================================================

/// Fiscal configuration form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiscalConfigInput {
    pub legal_name: String,
    pub cuit: String,
    pub tax_condition: TaxCondition,
    pub gross_income_number: Option<String>,
    pub activity_start_date: Option<NaiveDate>,
    pub invoicing_enabled: bool,
    pub default_point_of_sale_id: Option<String>,
    pub tax_mode: TaxMode,
    pub max_global_discount_bps: u32,
}

pub async fn get_fiscal_config(db: &DbState, config: &ConfigState) -> Result<Option<FiscalConfig>, ApiError> {
    debug!("get_fiscal_config command");
    Ok(db.inner().fiscal().get_config(&config.organization_id).await?)
}

/// Validates and saves the fiscal configuration.
///
/// The CUIT is stored normalized (`XX-XXXXXXXX-X`). The default point of
/// sale must belong to the organization.
pub async fn save_fiscal_config(
    db: &DbState,
    config: &ConfigState,
    input: FiscalConfigInput,
) -> Result<FiscalConfig, ApiError> {
    debug!(tax_condition = ?input.tax_condition, "save_fiscal_config command");

    let db_inner = db.inner();

    if let Some(pos_id) = &input.default_point_of_sale_id {
        let pos = db_inner
            .fiscal()
            .get_point_of_sale(pos_id)
            .await?
            .filter(|pos| pos.organization_id == config.organization_id)
            .ok_or_else(|| ApiError::not_found("Point of sale", pos_id))?;
        debug!(number = pos.number, "Default point of sale checked");
    }

    let fiscal = FiscalConfig {
        organization_id: config.organization_id.clone(),
        legal_name: input.legal_name.trim().to_string(),
        cuit: validate_cuit(&input.cuit)?,
        tax_condition: input.tax_condition,
        gross_income_number: input.gross_income_number.filter(|s| !s.trim().is_empty()),
        activity_start_date: input.activity_start_date,
        invoicing_enabled: input.invoicing_enabled,
        default_point_of_sale_id: input.default_point_of_sale_id,
        tax_mode: input.tax_mode,
        max_global_discount_bps: input.max_global_discount_bps,
        updated_at: Utc::now(),
    };
    fiscal.validate()?;

    let saved = db_inner.fiscal().save_config(&fiscal).await?;
    info!(cuit = %saved.cuit, tax_condition = ?saved.tax_condition, "Fiscal configuration saved");
    Ok(saved)
}

// =============================================================================
// Locations & points of sale
// =============================================================================

pub async fn create_location(
    db: &DbState,
    config: &ConfigState,
    name: String,
    address: Option<String>,
) -> Result<Location, ApiError> {
    debug!(name = %name, "create_location command");
    validate_name("name", &name, 100)?;

    let location = db
        .inner()
        .fiscal()
        .insert_location(&Location {
            id: Uuid::new_v4().to_string(),
            organization_id: config.organization_id.clone(),
            name: name.trim().to_string(),
            address,
            is_active: true,
        })
        .await?;

    info!(location_id = %location.id, "Location created");
    Ok(location)
}

pub async fn list_locations(db: &DbState, config: &ConfigState) -> Result<Vec<Location>, ApiError> {
    Ok(db.inner().fiscal().list_locations(&config.organization_id).await?)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointOfSaleInput {
    pub location_id: String,
    pub number: i64,
    pub description: Option<String>,
    pub is_fiscal: bool,
}

/// Registers a billing terminal. Numbers are unique per organization.
pub async fn create_point_of_sale(
    db: &DbState,
    config: &ConfigState,
    input: PointOfSaleInput,
) -> Result<PointOfSale, ApiError> {
    debug!(number = input.number, "create_point_of_sale command");
    validate_point_of_sale_number(input.number)?;

    let pos = db
        .inner()
        .fiscal()
        .insert_point_of_sale(&PointOfSale {
            id: Uuid::new_v4().to_string(),
            organization_id: config.organization_id.clone(),
            location_id: input.location_id,
            number: input.number,
            description: input.description,
            is_fiscal: input.is_fiscal,
            is_active: true,
        })
        .await?;

    info!(point_of_sale = %format!("{:05}", pos.number), fiscal = pos.is_fiscal, "Point of sale created");
    Ok(pos)
}

pub async fn list_points_of_sale(db: &DbState, config: &ConfigState) -> Result<Vec<PointOfSale>, ApiError> {
    Ok(db.inner().fiscal().list_points_of_sale(&config.organization_id).await?)
}

// =============================================================================
// Voucher preview
// =============================================================================

/// What the next sale would be printed as.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherPreview {
    pub voucher_type: VoucherType,
    pub label: String,
    /// `PPPPP-NNNNNNNN`
    pub number: String,
    /// Factura A needs an identified customer with CUIT.
    pub requires_customer: bool,
}

/// Previews the voucher the current cart would get at checkout.
///
/// Nothing is reserved: two terminals previewing at once see the same
/// number, and only the checkout transaction assigns it.
pub async fn preview_next_voucher(
    db: &DbState,
    cart: &CartState,
    config: &ConfigState,
) -> Result<VoucherPreview, ApiError> {
    debug!("preview_next_voucher command");

    let db_inner = db.inner();
    let fiscal = require_fiscal_config(db_inner, &config.organization_id).await?;
    let pos = billing_point_of_sale(db_inner, &fiscal).await?;

    let customer_condition = match cart.with_cart(|c| c.customer_id.clone()) {
        Some(id) => db_inner.customers().get_by_id(&id).await?.map(|c| c.tax_condition),
        None => None,
    };

    let voucher_type = select_sale_voucher(&fiscal, pos.is_fiscal, customer_condition);
    let next = db_inner.sales().peek_next_number(&pos.id, voucher_type).await?;

    Ok(VoucherPreview {
        voucher_type,
        label: voucher_type.label().to_string(),
        number: VoucherNumber::new(pos.number, next).to_string(),
        requires_customer: voucher_type.letter() == 'A',
    })
}
