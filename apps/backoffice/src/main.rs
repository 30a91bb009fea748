//! # Mostrador Entry Point
//!
//! Starts the back office: loads configuration, opens (and migrates) the
//! database and reports what it found.
//!
//! ## Startup Sequence
//! 1. Initialize tracing (logging)
//! 2. Load configuration from `MOSTRADOR_*` variables
//! 3. Connect to database & run migrations
//! 4. Report catalog size, fiscal setup and next voucher

use anyhow::{Context, Result};
use tracing::{info, warn};

use mostrador_backoffice::commands::fiscal;
use mostrador_backoffice::state::ConfigState;
use mostrador_backoffice::{bootstrap, init_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Mostrador back office");

    let config = ConfigState::from_env().context("loading configuration")?;
    let app = bootstrap(config).await.context("starting the back office")?;

    let db = app.db.inner();
    if !db.health_check().await {
        anyhow::bail!("database health check failed");
    }

    let products = db.products().count(&app.config.organization_id).await?;
    info!(store = %app.config.store_name, products, "Catalog loaded");

    match fiscal::preview_next_voucher(&app.db, &app.cart, &app.config).await {
        Ok(preview) => info!(
            voucher = %preview.label,
            number = %preview.number,
            "Ready to sell"
        ),
        Err(e) => warn!(error = %e, "Fiscal setup incomplete, checkout is disabled"),
    }

    db.close().await;
    Ok(())
}
