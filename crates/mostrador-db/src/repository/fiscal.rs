//! # Fiscal Repository
//!
//! Fiscal identity of the organization, its premises and the terminals
//! that number vouchers.
//!
//! ```text
//! fiscal_config (1 per organization)
//!       │ default_point_of_sale_id
//!       ▼
//! points_of_sale ──► locations
//!       │
//!       ▼
//! voucher_sequences (last number per terminal + voucher type)
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use mostrador_core::fiscal::{FiscalConfig, VoucherType};
use mostrador_core::{Location, PointOfSale};

const CONFIG_COLUMNS: &str = r#"
    organization_id, legal_name, cuit, tax_condition, gross_income_number,
    activity_start_date, invoicing_enabled, default_point_of_sale_id, tax_mode,
    max_global_discount_bps, updated_at
"#;

const POS_COLUMNS: &str = "id, organization_id, location_id, number, description, is_fiscal, is_active";

#[derive(Debug, Clone)]
pub struct FiscalRepository {
    pool: SqlitePool,
}

impl FiscalRepository {
    pub fn new(pool: SqlitePool) -> Self {
        FiscalRepository { pool }
    }

    /// Loads the fiscal configuration, `None` until the wizard was completed.
    pub async fn get_config(&self, organization_id: &str) -> DbResult<Option<FiscalConfig>> {
        let sql = format!("SELECT {CONFIG_COLUMNS} FROM fiscal_config WHERE organization_id = ?1");
        let config = sqlx::query_as::<_, FiscalConfig>(&sql)
            .bind(organization_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(config)
    }

    /// Inserts or replaces the fiscal configuration.
    pub async fn save_config(&self, config: &FiscalConfig) -> DbResult<FiscalConfig> {
        info!(
            organization_id = %config.organization_id,
            tax_condition = ?config.tax_condition,
            invoicing_enabled = config.invoicing_enabled,
            "Saving fiscal configuration"
        );

        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO fiscal_config (
                organization_id, legal_name, cuit, tax_condition, gross_income_number,
                activity_start_date, invoicing_enabled, default_point_of_sale_id, tax_mode,
                max_global_discount_bps, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT (organization_id) DO UPDATE SET
                legal_name = excluded.legal_name,
                cuit = excluded.cuit,
                tax_condition = excluded.tax_condition,
                gross_income_number = excluded.gross_income_number,
                activity_start_date = excluded.activity_start_date,
                invoicing_enabled = excluded.invoicing_enabled,
                default_point_of_sale_id = excluded.default_point_of_sale_id,
                tax_mode = excluded.tax_mode,
                max_global_discount_bps = excluded.max_global_discount_bps,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&config.organization_id)
        .bind(&config.legal_name)
        .bind(&config.cuit)
        .bind(config.tax_condition)
        .bind(&config.gross_income_number)
        .bind(config.activity_start_date)
        .bind(config.invoicing_enabled)
        .bind(&config.default_point_of_sale_id)
        .bind(config.tax_mode)
        .bind(config.max_global_discount_bps)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(FiscalConfig {
            updated_at: now,
            ..config.clone()
        })
    }

    // =========================================================================
    // Locations
    // =========================================================================

    pub async fn insert_location(&self, location: &Location) -> DbResult<Location> {
        debug!(name = %location.name, "Inserting location");

        sqlx::query(
            "INSERT INTO locations (id, organization_id, name, address, is_active) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&location.id)
        .bind(&location.organization_id)
        .bind(&location.name)
        .bind(&location.address)
        .bind(location.is_active)
        .execute(&self.pool)
        .await?;

        Ok(location.clone())
    }

    pub async fn list_locations(&self, organization_id: &str) -> DbResult<Vec<Location>> {
        let locations = sqlx::query_as::<_, Location>(
            r#"
            SELECT id, organization_id, name, address, is_active
            FROM locations
            WHERE organization_id = ?1 AND is_active = 1
            ORDER BY name
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(locations)
    }

    // =========================================================================
    // Points of Sale
    // =========================================================================

    /// Registers a terminal. Numbers are unique per organization.
    pub async fn insert_point_of_sale(&self, pos: &PointOfSale) -> DbResult<PointOfSale> {
        debug!(number = pos.number, "Inserting point of sale");

        sqlx::query(
            r#"
            INSERT INTO points_of_sale (id, organization_id, location_id, number, description, is_fiscal, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&pos.id)
        .bind(&pos.organization_id)
        .bind(&pos.location_id)
        .bind(pos.number)
        .bind(&pos.description)
        .bind(pos.is_fiscal)
        .bind(pos.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: format!("{:05}", pos.number),
            },
            other => other,
        })?;

        Ok(pos.clone())
    }

    pub async fn get_point_of_sale(&self, id: &str) -> DbResult<Option<PointOfSale>> {
        let sql = format!("SELECT {POS_COLUMNS} FROM points_of_sale WHERE id = ?1");
        let pos = sqlx::query_as::<_, PointOfSale>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(pos)
    }

    pub async fn list_points_of_sale(&self, organization_id: &str) -> DbResult<Vec<PointOfSale>> {
        let sql = format!(
            "SELECT {POS_COLUMNS} FROM points_of_sale WHERE organization_id = ?1 AND is_active = 1 ORDER BY number"
        );
        let list = sqlx::query_as::<_, PointOfSale>(&sql)
            .bind(organization_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(list)
    }

    /// Last number issued for a terminal and voucher type (0 if none).
    pub async fn last_voucher_number(&self, point_of_sale_id: &str, voucher_type: VoucherType) -> DbResult<i64> {
        let last: Option<i64> = sqlx::query_scalar(
            "SELECT last_number FROM voucher_sequences WHERE point_of_sale_id = ?1 AND voucher_type = ?2",
        )
        .bind(point_of_sale_id)
        .bind(voucher_type)
        .fetch_optional(&self.pool)
        .await?;

        Ok(last.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{fiscal_setup, test_db};
    use mostrador_core::fiscal::TaxCondition;
    use mostrador_core::pricing::TaxMode;
    use mostrador_core::DEFAULT_ORGANIZATION_ID;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_config_missing_until_saved() {
        let db = test_db().await;
        assert!(db.fiscal().get_config(DEFAULT_ORGANIZATION_ID).await.unwrap().is_none());

        let (config, pos) = fiscal_setup(&db).await;
        let loaded = db.fiscal().get_config(DEFAULT_ORGANIZATION_ID).await.unwrap().unwrap();
        assert_eq!(loaded.cuit, config.cuit);
        assert_eq!(loaded.tax_condition, TaxCondition::ResponsableInscripto);
        assert_eq!(loaded.default_point_of_sale_id.as_deref(), Some(pos.id.as_str()));
    }

    #[tokio::test]
    async fn test_save_config_upserts() {
        let db = test_db().await;
        let (mut config, _) = fiscal_setup(&db).await;

        config.tax_condition = TaxCondition::Monotributo;
        config.tax_mode = TaxMode::Exclusive;
        config.max_global_discount_bps = 1500;
        db.fiscal().save_config(&config).await.unwrap();

        let loaded = db.fiscal().get_config(DEFAULT_ORGANIZATION_ID).await.unwrap().unwrap();
        assert_eq!(loaded.tax_condition, TaxCondition::Monotributo);
        assert_eq!(loaded.tax_mode, TaxMode::Exclusive);
        assert_eq!(loaded.max_global_discount_bps, 1500);
    }

    #[tokio::test]
    async fn test_point_of_sale_number_unique() {
        let db = test_db().await;
        let (_, pos) = fiscal_setup(&db).await;

        let clash = PointOfSale {
            id: Uuid::new_v4().to_string(),
            ..pos.clone()
        };
        let err = db.fiscal().insert_point_of_sale(&clash).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref value, .. } if value == "00003"));

        let list = db.fiscal().list_points_of_sale(DEFAULT_ORGANIZATION_ID).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(db.fiscal().list_locations(DEFAULT_ORGANIZATION_ID).await.unwrap().len(), 1);
        assert_eq!(
            db.fiscal().last_voucher_number(&pos.id, VoucherType::FacturaB).await.unwrap(),
            0
        );
    }
}
