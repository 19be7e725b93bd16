//! Store inspection commands.

use nube_bridge_core::StoreId;
use serde_json::json;

use super::{CommandError, print_json, store_client};

/// Fetch and print the upstream store profile.
pub async fn info(store_id: StoreId) -> Result<(), CommandError> {
    let api = store_client(store_id).await?;
    let store = api.get_store().await?;

    print_json(&json!({
        "id": store.id,
        "name": store.name,
        "mainLanguage": store.main_language,
        "mainCurrency": store.main_currency,
        "email": store.email,
        "originalDomain": store.original_domain,
    }))
}
