//! # Configuration State
//!
//! Stores application configuration loaded at startup.
//!
//! ## Configuration Sources (Priority Order)
//! 1. Environment variables (`MOSTRADOR_*`)
//! 2. Defaults (this file)
//!
//! Fiscal settings (CUIT, tax condition, tax mode, discount cap) live in
//! the database, not here, because they are edited from the back office.
//!
//! ## Thread Safety
//! Configuration is read-only after initialization, so no mutex needed.

use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use mostrador_core::validation::validate_uuid;
use mostrador_core::DEFAULT_ORGANIZATION_ID;

/// Invalid configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is invalid: {reason}")]
    InvalidValue { var: &'static str, reason: String },

    #[error("Could not determine the application data directory")]
    NoDataDirectory,
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigState {
    /// Organization the back office works on.
    pub organization_id: String,

    /// Store name (displayed on receipts)
    pub store_name: String,

    /// Currency code (ISO 4217)
    pub currency_code: String,

    /// Currency symbol (for display)
    pub currency_symbol: String,

    /// Identifier of this terminal, stamped on sales.
    pub device_id: String,

    /// SQLite file. `None` means the platform data directory.
    pub database_path: Option<PathBuf>,
}

impl Default for ConfigState {
    fn default() -> Self {
        ConfigState {
            organization_id: DEFAULT_ORGANIZATION_ID.to_string(),
            store_name: "Mi comercio".to_string(),
            currency_code: "ARS".to_string(),
            currency_symbol: "$".to_string(),
            device_id: "caja-01".to_string(),
            database_path: None,
        }
    }
}

impl ConfigState {
    /// Creates a new ConfigState from environment variables and defaults.
    ///
    /// ## Environment Variables
    /// - `MOSTRADOR_DB_PATH`: SQLite file path
    /// - `MOSTRADOR_ORGANIZATION_ID`: Organization UUID
    /// - `MOSTRADOR_STORE_NAME`: Store name on receipts
    /// - `MOSTRADOR_CURRENCY_SYMBOL`: Symbol used when formatting amounts
    /// - `MOSTRADOR_DEVICE_ID`: Terminal identifier
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an injectable source (tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = ConfigState::default();

        if let Some(path) = lookup("MOSTRADOR_DB_PATH") {
            if path.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    var: "MOSTRADOR_DB_PATH",
                    reason: "must not be empty".to_string(),
                });
            }
            config.database_path = Some(PathBuf::from(path));
        }

        if let Some(organization_id) = lookup("MOSTRADOR_ORGANIZATION_ID") {
            validate_uuid(&organization_id).map_err(|e| ConfigError::InvalidValue {
                var: "MOSTRADOR_ORGANIZATION_ID",
                reason: e.to_string(),
            })?;
            config.organization_id = organization_id;
        }

        if let Some(store_name) = lookup("MOSTRADOR_STORE_NAME") {
            config.store_name = store_name;
        }

        if let Some(symbol) = lookup("MOSTRADOR_CURRENCY_SYMBOL") {
            if symbol.is_empty() || symbol.chars().count() > 4 {
                return Err(ConfigError::InvalidValue {
                    var: "MOSTRADOR_CURRENCY_SYMBOL",
                    reason: "must be 1 to 4 characters".to_string(),
                });
            }
            config.currency_symbol = symbol;
        }

        if let Some(device_id) = lookup("MOSTRADOR_DEVICE_ID") {
            config.device_id = device_id;
        }

        Ok(config)
    }

    /// Resolves the database file, creating the data directory if needed.
    ///
    /// ## Platform-Specific Paths
    /// - **macOS**: `~/Library/Application Support/ar.mostrador.backoffice/mostrador.db`
    /// - **Windows**: `%APPDATA%\mostrador\backoffice\data\mostrador.db`
    /// - **Linux**: `~/.local/share/backoffice/mostrador.db`
    pub fn resolve_database_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }

        let dirs = ProjectDirs::from("ar", "mostrador", "backoffice").ok_or(ConfigError::NoDataDirectory)?;
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).map_err(|e| ConfigError::InvalidValue {
            var: "MOSTRADOR_DB_PATH",
            reason: format!("cannot create {}: {}", data_dir.display(), e),
        })?;

        Ok(data_dir.join("mostrador.db"))
    }

    /// Formats a cent amount the Argentine way: `$1.234,56`.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let config = ConfigState::default();
    /// assert_eq!(config.format_currency(123456), "$1.234,56");
    /// ```
    pub fn format_currency(&self, cents: i64) -> String {
        let whole = (cents / 100).unsigned_abs();
        let frac = (cents % 100).unsigned_abs();

        let digits = whole.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(c);
        }

        format!(
            "{}{}{},{:02}",
            if cents < 0 { "-" } else { "" },
            self.currency_symbol,
            grouped,
            frac
        )
    }
}
