//! Idempotency ledger.
//!
//! One append-only record per processed notification. Deduplicated topics
//! get a key that is a pure function of `(store, event, resource)`, so
//! provider redeliveries collide. Always-reprocess topics get a fresh key on
//! every delivery.

use std::sync::Arc;

use chrono::Utc;
use nube_bridge_core::{LedgerStatus, StoreId, UpstreamId, WebhookEvent};
use tracing::debug;
use uuid::Uuid;

use crate::db::{IdempotencyRecord, RecordStore, RepositoryError};

use super::notification::Notification;

/// Result of appending a ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    /// A concurrent delivery wrote the same key first.
    AlreadyRecorded,
}

/// Deterministic dedupe key for a notification.
///
/// Always-reprocess topics append a nanosecond timestamp and a random
/// suffix, so every delivery gets a distinct key.
#[must_use]
pub fn dedupe_key(
    store_id: StoreId,
    event: &WebhookEvent,
    resource_id: Option<UpstreamId>,
) -> String {
    let resource = resource_id.map_or_else(|| "none".to_string(), |id| id.to_string());
    let base = format!("{store_id}:{event}:{resource}");

    if event.is_always_reprocess() {
        let nanos = Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_else(|| Utc::now().timestamp_micros());
        format!("{base}:{nanos}:{}", Uuid::new_v4().simple())
    } else {
        base
    }
}

/// Ledger backed by the record store.
#[derive(Clone)]
pub struct IdempotencyLedger {
    store: Arc<dyn RecordStore>,
}

impl IdempotencyLedger {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Look up a prior record by key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store lookup fails.
    pub async fn lookup(&self, key: &str) -> Result<Option<IdempotencyRecord>, RepositoryError> {
        self.store.find_idempotency_record(key).await
    }

    /// Append a record for `notification` under `key`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the write fails for any reason other than
    /// the key already being present.
    pub async fn record(
        &self,
        key: &str,
        notification: &Notification,
        status: LedgerStatus,
    ) -> Result<RecordOutcome, RepositoryError> {
        let record = IdempotencyRecord {
            key: key.to_string(),
            store_id: notification.store_id,
            event: notification.event.to_string(),
            resource_id: notification.resource_id,
            payload: notification.raw_body.clone(),
            processed_at: Utc::now(),
            status,
        };

        match self.store.insert_idempotency_record(&record).await {
            Ok(()) => {
                debug!(idempotency_key = key, status = %status, "Ledger record written");
                Ok(RecordOutcome::Recorded)
            }
            Err(RepositoryError::Conflict(_)) => Ok(RecordOutcome::AlreadyRecorded),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn event(topic: &str) -> WebhookEvent {
        WebhookEvent::parse(topic).unwrap()
    }

    #[test]
    fn test_dedupe_key_is_deterministic() {
        let a = dedupe_key(StoreId::new(42), &event("product/created"), Some(UpstreamId::new(7)));
        let b = dedupe_key(StoreId::new(42), &event("product/created"), Some(UpstreamId::new(7)));

        assert_eq!(a, "42:product/created:7");
        assert_eq!(a, b);
    }

    #[test]
    fn test_dedupe_key_without_resource() {
        let key = dedupe_key(StoreId::new(42), &event("app/uninstalled"), None);
        assert_eq!(key, "42:app/uninstalled:none");
    }

    #[test]
    fn test_dedupe_key_distinguishes_inputs() {
        let base = dedupe_key(StoreId::new(1), &event("order/paid"), Some(UpstreamId::new(5)));
        assert_ne!(
            base,
            dedupe_key(StoreId::new(2), &event("order/paid"), Some(UpstreamId::new(5)))
        );
        assert_ne!(
            base,
            dedupe_key(StoreId::new(1), &event("order/packed"), Some(UpstreamId::new(5)))
        );
        assert_ne!(
            base,
            dedupe_key(StoreId::new(1), &event("order/paid"), Some(UpstreamId::new(6)))
        );
    }

    #[test]
    fn test_always_reprocess_keys_are_unique() {
        let e = event("product/updated");
        let a = dedupe_key(StoreId::new(42), &e, Some(UpstreamId::new(7)));
        let b = dedupe_key(StoreId::new(42), &e, Some(UpstreamId::new(7)));

        assert!(a.starts_with("42:product/updated:7:"));
        assert_ne!(a, b);
    }
}
