//! Bulk sync commands.
//!
//! Runs the same synchronizer as `POST /api/sync` and prints the report(s)
//! as JSON. Exits non-zero when any run fails.

use nube_bridge::sync::{BulkSynchronizer, SyncReport};
use nube_bridge_core::StoreId;

use super::{CommandError, print_json, reconciler};

async fn synchronizer() -> Result<BulkSynchronizer, CommandError> {
    let (config, reconciler) = reconciler().await?;
    Ok(BulkSynchronizer::new(reconciler, config.sync.page_size))
}

fn finish(reports: &[SyncReport]) -> Result<(), Box<dyn std::error::Error>> {
    print_json(&reports)?;
    if let Some(failed) = reports.iter().find(|r| !r.is_completed()) {
        return Err(format!(
            "{} sync failed: {}",
            failed.resource,
            failed.failure.as_deref().unwrap_or("unknown error")
        )
        .into());
    }
    Ok(())
}

/// Sync the product catalog, sweeping local products missing upstream.
pub async fn products(store_id: StoreId) -> Result<(), Box<dyn std::error::Error>> {
    let synchronizer = synchronizer().await?;
    finish(&[synchronizer.sync_products(store_id).await])
}

/// Sync every order.
pub async fn orders(store_id: StoreId) -> Result<(), Box<dyn std::error::Error>> {
    let synchronizer = synchronizer().await?;
    finish(&[synchronizer.sync_orders(store_id).await])
}

/// Sync products, then orders.
pub async fn all(store_id: StoreId) -> Result<(), Box<dyn std::error::Error>> {
    let synchronizer = synchronizer().await?;
    let products = synchronizer.sync_products(store_id).await;
    let orders = synchronizer.sync_orders(store_id).await;
    finish(&[products, orders])
}
