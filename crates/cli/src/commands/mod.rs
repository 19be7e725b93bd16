//! CLI subcommands.

pub mod migrate;
pub mod store;
pub mod sync;
pub mod webhooks;

use std::sync::Arc;

use nube_bridge::config::{BridgeConfig, ConfigError};
use nube_bridge::db::{self, CredentialProvider, PgRecordStore, RecordStore, RepositoryError};
use nube_bridge::sync::Reconciler;
use nube_bridge::tiendanube::{ApiConnector, TiendanubeConnector, UpstreamApi, UpstreamError};
use nube_bridge_core::StoreId;
use serde::Serialize;
use thiserror::Error;

/// Errors shared by the operator commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Credential lookup failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Tiendanube API call failed.
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// No installation is stored for this store.
    #[error("No credentials stored for store {0}")]
    UnknownStore(StoreId),

    /// Report could not be rendered.
    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

/// Load configuration and open the bridge database.
async fn open() -> Result<(BridgeConfig, Arc<PgRecordStore>), CommandError> {
    let config = BridgeConfig::from_env()?;

    tracing::info!("Connecting to bridge database...");
    let pool = db::create_pool(&config.database_url).await?;
    Ok((config, Arc::new(PgRecordStore::new(pool))))
}

/// Build a reconciler over the bridge database and the live API.
async fn reconciler() -> Result<(BridgeConfig, Reconciler), CommandError> {
    let (config, store) = open().await?;
    let connector = Arc::new(TiendanubeConnector::new(&config.tiendanube)?);
    let records = Arc::clone(&store) as Arc<dyn RecordStore>;
    let reconciler = Reconciler::new(records, store, connector);
    Ok((config, reconciler))
}

/// A client bound to one store's stored token.
async fn store_client(store_id: StoreId) -> Result<Arc<dyn UpstreamApi>, CommandError> {
    let (config, store) = open().await?;
    let credentials = store
        .credentials(store_id)
        .await?
        .ok_or(CommandError::UnknownStore(store_id))?;
    let connector = TiendanubeConnector::new(&config.tiendanube)?;
    Ok(connector.connect(&credentials))
}

/// Print a JSON document to stdout.
fn print_json<T: Serialize>(value: &T) -> Result<(), CommandError> {
    let rendered = serde_json::to_string_pretty(value)?;
    #[allow(clippy::print_stdout)]
    {
        println!("{rendered}");
    }
    Ok(())
}
