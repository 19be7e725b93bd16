//! Reconciliation of upstream Tiendanube records into the local store.
//!
//! # Architecture
//!
//! - [`Reconciler`] fetches one authoritative record and upserts its
//!   normalized form (`products`, `orders`).
//! - [`BulkSynchronizer`] runs the same upsert over a whole upstream
//!   collection and sweeps local tombstones.
//! - [`normalize`] maps loosely-typed payload fields to canonical types.
//! - [`scheduler`] drives periodic bulk syncs for every installed store.
//!
//! Every operation resolves credentials and builds a fresh store-scoped
//! [`UpstreamApi`] through the [`ApiConnector`]; no client is shared
//! between stores.

mod bulk;
pub mod normalize;
mod orders;
mod products;
pub mod scheduler;

use std::sync::Arc;

use nube_bridge_core::{StoreId, UpsertStatus};
use thiserror::Error;

use crate::db::{CredentialProvider, RecordStore, RepositoryError, StoreCredentials};
use crate::tiendanube::{ApiConnector, UpstreamApi, UpstreamError};

pub use bulk::{BulkSynchronizer, SyncRecordError, SyncReport};
pub use normalize::NormalizeError;
pub use orders::{CustomerExport, normalize_order};
pub use products::{ImageSyncStats, normalize_image, normalize_product};

/// Errors that abort a single record's reconciliation.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// No stored token for the store.
    #[error("no credentials stored for store {0}")]
    CredentialsNotFound(StoreId),

    /// The upstream API failed or returned non-2xx.
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// The record store failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] RepositoryError),

    /// The upstream payload cannot be normalized.
    #[error("invalid upstream payload: {0}")]
    InvalidPayload(#[from] NormalizeError),
}

/// Result of an upsert: whether the record was created or patched, and the
/// stored entity.
#[derive(Debug, Clone)]
pub struct Reconciled<T> {
    pub status: UpsertStatus,
    pub entity: T,
}

/// Fetch-then-upsert reconciler for products and orders.
///
/// Cheap to clone; all collaborators are shared trait objects.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn RecordStore>,
    credentials: Arc<dyn CredentialProvider>,
    connector: Arc<dyn ApiConnector>,
}

impl Reconciler {
    /// Create a reconciler over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        credentials: Arc<dyn CredentialProvider>,
        connector: Arc<dyn ApiConnector>,
    ) -> Self {
        Self {
            store,
            credentials,
            connector,
        }
    }

    /// The record store this reconciler writes to.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Resolve credentials and build a client scoped to `store_id`.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileError::CredentialsNotFound` if the store has no
    /// stored token, `ReconcileError::Persistence` if the lookup fails.
    pub async fn connect(
        &self,
        store_id: StoreId,
    ) -> Result<(StoreCredentials, Arc<dyn UpstreamApi>), ReconcileError> {
        let credentials = self
            .credentials
            .credentials(store_id)
            .await?
            .ok_or(ReconcileError::CredentialsNotFound(store_id))?;
        let api = self.connector.connect(&credentials);
        Ok((credentials, api))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconcile_error_display() {
        let err = ReconcileError::CredentialsNotFound(StoreId::new(42));
        assert_eq!(err.to_string(), "no credentials stored for store 42");

        let err = ReconcileError::from(UpstreamError::Status {
            status_code: 503,
            body: "unavailable".to_string(),
        });
        assert_eq!(err.to_string(), "upstream error: upstream returned 503: unavailable");
    }
}
