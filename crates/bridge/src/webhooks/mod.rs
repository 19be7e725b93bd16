//! Webhook ingestion pipeline.
//!
//! Stages run in a fixed order, each returning a typed result:
//!
//! 1. [`signature::check_request`] - authenticate the raw body
//! 2. [`Notification::parse`] - parse and require `store_id` / `event`
//! 3. classify - privacy events short-circuit here without touching the ledger
//! 4. dedupe - look up the [`IdempotencyLedger`] key
//! 5. dispatch - write the ledger record, then run the reconciler
//!
//! The ledger record for `product/*` and `order/*` is written before the
//! reconciler runs. Unhandled topics are recorded as the terminal step.

pub mod ledger;
pub mod notification;
pub mod privacy;
pub mod signature;

use std::sync::Arc;

use axum::http::HeaderMap;
use nube_bridge_core::{EntityAction, EventKind, LedgerStatus, UpstreamId};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::TiendanubeConfig;
use crate::db::RepositoryError;
use crate::sync::{ReconcileError, Reconciler};

pub use ledger::{IdempotencyLedger, RecordOutcome, dedupe_key};
pub use notification::{Notification, ValidationError};
pub use privacy::PrivacyOutcome;
pub use signature::{SignatureCheck, SignatureError};

/// Errors that stop a notification. Each maps to one HTTP status.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{event} requires a resource id")]
    MissingResourceId { event: String },

    #[error("idempotency ledger error: {0}")]
    Ledger(#[from] RepositoryError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

/// Entity touched by a dispatched notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Product,
    Order,
}

/// Final result of an accepted notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The dedupe key was already in the ledger; nothing ran.
    Duplicate,
    /// The reconciler ran.
    Processed {
        entity: Entity,
        action: EntityAction,
        resource_id: UpstreamId,
    },
    /// Known namespace, unknown action. Recorded as `unhandled`.
    Ignored,
    /// Unknown namespace. Recorded as `unhandled`.
    Unhandled,
    /// A privacy action ran. Not recorded.
    Privacy(PrivacyOutcome),
}

impl Outcome {
    /// JSON acknowledgment body for the provider.
    #[must_use]
    pub fn response_body(&self) -> Value {
        match self {
            Self::Duplicate => json!({"success": true, "duplicate": true}),
            Self::Processed { .. } => json!({"success": true, "processed": true}),
            Self::Ignored | Self::Unhandled => json!({"success": true, "processed": false}),
            Self::Privacy(_) => json!({"success": true}),
        }
    }
}

/// Verify, parse, and route inbound notifications.
#[derive(Clone)]
pub struct WebhookPipeline {
    config: Arc<TiendanubeConfig>,
    ledger: IdempotencyLedger,
    reconciler: Reconciler,
}

impl WebhookPipeline {
    #[must_use]
    pub fn new(config: Arc<TiendanubeConfig>, reconciler: Reconciler) -> Self {
        Self {
            config,
            ledger: IdempotencyLedger::new(Arc::clone(reconciler.store())),
            reconciler,
        }
    }

    /// Run every stage for one raw request.
    ///
    /// # Errors
    ///
    /// Returns the first `PipelineError` raised by any stage.
    pub async fn handle(&self, headers: &HeaderMap, body: &[u8]) -> Result<Outcome, PipelineError> {
        signature::check_request(headers, body, &self.config)?;
        let notification = Notification::parse(body)?;
        self.route(&notification).await
    }

    /// Classify, dedupe, and dispatch a verified notification.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError` if the ledger or the reconciler fails, or a
    /// resource event carries no id.
    #[instrument(
        skip(self, notification),
        fields(
            store_id = %notification.store_id,
            event = %notification.event,
            resource_id = ?notification.resource_id,
        )
    )]
    pub async fn route(&self, notification: &Notification) -> Result<Outcome, PipelineError> {
        let kind = notification.event.kind();

        if let EventKind::Privacy(event) = kind {
            let outcome = privacy::handle(&self.reconciler, event, notification).await?;
            info!(?outcome, "Privacy event handled");
            return Ok(Outcome::Privacy(outcome));
        }

        let target = match kind {
            EventKind::Product(action @ (EntityAction::Upsert | EntityAction::Delete)) => {
                Some((Entity::Product, action))
            }
            EventKind::Order(action @ (EntityAction::Upsert | EntityAction::Delete)) => {
                Some((Entity::Order, action))
            }
            _ => None,
        };
        let resource_id = match (target, notification.resource_id) {
            (Some(_), None) => {
                return Err(PipelineError::MissingResourceId {
                    event: notification.event.to_string(),
                });
            }
            (_, id) => id,
        };

        let key = dedupe_key(notification.store_id, &notification.event, resource_id);
        if !notification.event.is_always_reprocess()
            && self.ledger.lookup(&key).await?.is_some()
        {
            info!(idempotency_key = %key, "Duplicate notification, skipping");
            return Ok(Outcome::Duplicate);
        }

        let (Some((entity, action)), Some(resource_id)) = (target, resource_id) else {
            return self.record_unhandled(&key, notification, kind).await;
        };

        // Recorded before the side effect: a failed reconcile is not retried
        // through this key.
        if self
            .ledger
            .record(&key, notification, LedgerStatus::Processed)
            .await?
            == RecordOutcome::AlreadyRecorded
        {
            info!(idempotency_key = %key, "Concurrent duplicate notification, skipping");
            return Ok(Outcome::Duplicate);
        }

        let store_id = notification.store_id;
        match (entity, action) {
            (Entity::Product, EntityAction::Delete) => {
                self.reconciler.delete_product(store_id, resource_id).await?;
            }
            (Entity::Product, _) => {
                self.reconciler.reconcile_product(store_id, resource_id).await?;
            }
            (Entity::Order, EntityAction::Delete) => {
                self.reconciler.delete_order(store_id, resource_id).await?;
            }
            (Entity::Order, _) => {
                self.reconciler.reconcile_order(store_id, resource_id).await?;
            }
        }

        Ok(Outcome::Processed {
            entity,
            action,
            resource_id,
        })
    }

    async fn record_unhandled(
        &self,
        key: &str,
        notification: &Notification,
        kind: EventKind,
    ) -> Result<Outcome, PipelineError> {
        self.ledger
            .record(key, notification, LedgerStatus::Unhandled)
            .await?;

        if kind == EventKind::Unhandled {
            info!("Unhandled webhook event acknowledged");
            Ok(Outcome::Unhandled)
        } else {
            warn!("Unknown action for known resource, ignoring");
            Ok(Outcome::Ignored)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_response_bodies() {
        assert_eq!(
            Outcome::Duplicate.response_body(),
            json!({"success": true, "duplicate": true})
        );
        assert_eq!(
            Outcome::Processed {
                entity: Entity::Product,
                action: EntityAction::Delete,
                resource_id: UpstreamId::new(7),
            }
            .response_body(),
            json!({"success": true, "processed": true})
        );
        assert_eq!(
            Outcome::Unhandled.response_body(),
            json!({"success": true, "processed": false})
        );
        assert_eq!(
            Outcome::Privacy(PrivacyOutcome::StoreRedacted { products_deleted: 0 }).response_body(),
            json!({"success": true})
        );
    }
}
