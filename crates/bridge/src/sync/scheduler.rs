//! Periodic bulk sync for every installed store.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument};

use crate::db::CredentialProvider;

use super::BulkSynchronizer;

/// Spawn a background task that syncs products then orders for each store,
/// one store at a time, every `interval`.
///
/// The first run starts after one full interval.
pub fn spawn(
    synchronizer: BulkSynchronizer,
    credentials: Arc<dyn CredentialProvider>,
    interval: Duration,
) -> JoinHandle<()> {
    info!(interval_secs = interval.as_secs(), "Spawning scheduled sync task");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            run_once(&synchronizer, credentials.as_ref()).await;
        }
    })
}

/// Sync every store known to the credential provider once.
#[instrument(skip_all)]
pub async fn run_once(synchronizer: &BulkSynchronizer, credentials: &dyn CredentialProvider) {
    let store_ids = match credentials.list_store_ids().await {
        Ok(ids) => ids,
        Err(e) => {
            error!(error = %e, "Failed to list stores for scheduled sync");
            return;
        }
    };

    info!(stores = store_ids.len(), "Scheduled sync started");
    for store_id in store_ids {
        let products = synchronizer.sync_products(store_id).await;
        let orders = synchronizer.sync_orders(store_id).await;
        info!(
            store_id = %store_id,
            products_completed = products.is_completed(),
            orders_completed = orders.is_completed(),
            "Scheduled sync finished for store"
        );
    }
}
