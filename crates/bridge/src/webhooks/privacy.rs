//! LGPD privacy events.
//!
//! Handled before the idempotency ledger and never recorded in it: every
//! action here is safe to re-run.

use nube_bridge_core::{PrivacyEvent, UpstreamId};
use serde_json::Value;
use tracing::{info, instrument};

use crate::sync::normalize::optional_id;
use crate::sync::{ReconcileError, Reconciler};

use super::notification::Notification;

/// What a privacy event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrivacyOutcome {
    StoreRedacted { products_deleted: usize },
    CustomerRedacted { orders_redacted: usize },
    CustomerExported { orders_found: usize },
}

/// Order ids listed under `field` in the payload.
fn order_ids(payload: &Value, field: &str) -> Vec<UpstreamId> {
    payload
        .get(field)
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(optional_id).collect())
        .unwrap_or_default()
}

fn customer_id(payload: &Value) -> Option<UpstreamId> {
    payload
        .get("customer")
        .and_then(|c| c.get("id"))
        .and_then(optional_id)
}

/// Perform the compliance action for a privacy event.
///
/// # Errors
///
/// Returns `ReconcileError::Persistence` if the store cannot be read or
/// written.
#[instrument(skip(reconciler, notification), fields(store_id = %notification.store_id))]
pub async fn handle(
    reconciler: &Reconciler,
    event: PrivacyEvent,
    notification: &Notification,
) -> Result<PrivacyOutcome, ReconcileError> {
    let store_id = notification.store_id;
    let payload = &notification.payload;

    match event {
        PrivacyEvent::StoreRedact => {
            let products_deleted = reconciler.delete_store_products(store_id).await?;
            Ok(PrivacyOutcome::StoreRedacted { products_deleted })
        }
        PrivacyEvent::CustomersRedact => {
            let orders_redacted = reconciler
                .redact_customer(
                    store_id,
                    customer_id(payload),
                    &order_ids(payload, "orders_to_redact"),
                )
                .await?;
            Ok(PrivacyOutcome::CustomerRedacted { orders_redacted })
        }
        PrivacyEvent::CustomersDataRequest => {
            let export = reconciler
                .export_customer(
                    store_id,
                    customer_id(payload),
                    &order_ids(payload, "orders_requested"),
                )
                .await?;
            info!(
                customer_id = ?export.customer_id,
                orders = export.orders.len(),
                "Customer data request collected"
            );
            Ok(PrivacyOutcome::CustomerExported {
                orders_found: export.orders.len(),
            })
        }
    }
}
