//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::BridgeConfig;
use crate::db::{CredentialProvider, RecordStore};
use crate::sync::{BulkSynchronizer, Reconciler};
use crate::tiendanube::ApiConnector;
use crate::webhooks::WebhookPipeline;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: BridgeConfig,
    store: Arc<dyn RecordStore>,
    credentials: Arc<dyn CredentialProvider>,
    pipeline: WebhookPipeline,
    synchronizer: BulkSynchronizer,
}

impl AppState {
    /// Wire the pipeline and synchronizer over the given collaborators.
    #[must_use]
    pub fn new(
        config: BridgeConfig,
        store: Arc<dyn RecordStore>,
        credentials: Arc<dyn CredentialProvider>,
        connector: Arc<dyn ApiConnector>,
    ) -> Self {
        let reconciler = Reconciler::new(Arc::clone(&store), Arc::clone(&credentials), connector);
        let pipeline =
            WebhookPipeline::new(Arc::new(config.tiendanube.clone()), reconciler.clone());
        let synchronizer = BulkSynchronizer::new(reconciler, config.sync.page_size);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                credentials,
                pipeline,
                synchronizer,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.inner.store
    }

    #[must_use]
    pub fn credentials(&self) -> &Arc<dyn CredentialProvider> {
        &self.inner.credentials
    }

    #[must_use]
    pub fn pipeline(&self) -> &WebhookPipeline {
        &self.inner.pipeline
    }

    #[must_use]
    pub fn synchronizer(&self) -> &BulkSynchronizer {
        &self.inner.synchronizer
    }
}
