//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! nb-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `BRIDGE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! `crates/bridge/migrations/`

use sqlx::PgPool;
use thiserror::Error;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration failed to apply.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run bridge database migrations.
///
/// Only needs the database URL, so it works before the rest of the
/// service is configured.
pub async fn run() -> Result<(), MigrationError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("BRIDGE_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| MigrationError::MissingEnvVar("BRIDGE_DATABASE_URL"))?;

    tracing::info!("Connecting to bridge database...");
    let pool = PgPool::connect(&database_url).await?;

    tracing::info!("Running bridge migrations...");
    sqlx::migrate!("../bridge/migrations").run(&pool).await?;

    tracing::info!("Bridge migrations complete!");
    Ok(())
}
