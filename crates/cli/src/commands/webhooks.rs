//! Webhook registration inspection.

use nube_bridge_core::StoreId;

use super::{CommandError, print_json, store_client};

/// Print the webhooks registered upstream for a store.
pub async fn list(store_id: StoreId) -> Result<(), CommandError> {
    let api = store_client(store_id).await?;
    let webhooks = api.list_webhooks().await?;
    tracing::info!(store_id = %store_id, count = webhooks.len(), "Fetched webhooks");
    print_json(&webhooks)
}
