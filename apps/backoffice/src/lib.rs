//! # Mostrador Back Office
//!
//! Command layer of the back office: state, commands and startup.
//!
//! ## Module Organization
//! ```text
//! mostrador_backoffice/
//! ├── lib.rs          ◄─── You are here (logging & bootstrap)
//! ├── state/
//! │   ├── mod.rs      ◄─── State type exports
//! │   ├── db.rs       ◄─── Database state wrapper
//! │   ├── cart.rs     ◄─── Cart state management
//! │   └── config.rs   ◄─── Configuration state
//! ├── commands/       ◄─── One module per screen
//! └── error.rs        ◄─── API error type for commands
//! ```

pub mod commands;
pub mod error;
pub mod state;

use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mostrador_db::{Database, DbConfig, DbError};
use state::{CartState, ConfigError, ConfigState, DbState};

/// Startup failures.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(#[from] DbError),
}

/// Everything a command may need, created once at startup.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: DbState,
    pub cart: CartState,
    pub config: ConfigState,
}

/// Opens the database and builds the state objects.
///
/// ## Startup Sequence
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                       Application Startup                               │
/// │                                                                         │
/// │  1. Resolve Database Path ────────────────────────────────────────────► │
/// │     • MOSTRADOR_DB_PATH, or the platform data directory                 │
/// │                                                                         │
/// │  2. Connect to Database ──────────────────────────────────────────────► │
/// │     • SQLite with WAL mode, foreign keys on                             │
/// │     • Run pending migrations                                            │
/// │                                                                         │
/// │  3. Initialize State Objects ─────────────────────────────────────────► │
/// │     • DbState: Wraps Database connection                                │
/// │     • CartState: Empty cart with Mutex for thread-safe updates          │
/// │     • ConfigState: As loaded from the environment                       │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub async fn bootstrap(config: ConfigState) -> Result<AppState, BootstrapError> {
    let db_path = config.resolve_database_path()?;
    info!(?db_path, "Database path determined");

    bootstrap_with(config, DbConfig::new(db_path)).await
}

/// Same as [`bootstrap`] with an explicit pool configuration (tests use
/// `DbConfig::in_memory()`).
pub async fn bootstrap_with(config: ConfigState, db_config: DbConfig) -> Result<AppState, BootstrapError> {
    let db = Database::new(db_config).await?;
    info!(organization_id = %config.organization_id, "Database connected and migrations applied");

    Ok(AppState {
        db: DbState::new(db),
        cart: CartState::new(),
        config,
    })
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=mostrador_db=trace` - Trace the database layer only
/// - Default: INFO, DEBUG for the back office, WARN for sqlx
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mostrador_backoffice=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
