//! Full-collection synchronization.
//!
//! A run moves through `Paginating -> Reconciling -> Sweeping -> Reporting`
//! strictly in order with no retries:
//!
//! - a failed page fetch or missing credentials end the run as `failed`
//!   before any write;
//! - a failed record is recorded in `errors` and the run continues;
//! - a failed sweep step stops the sweep and marks the run `failed`, keeping
//!   the counts accumulated so far.
//!
//! Every run ends with a [`SyncReport`].

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use nube_bridge_core::{StoreId, SyncResource, SyncStatus, UpsertStatus, UpstreamId};
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::tiendanube::{Page, UpstreamResult};

use super::normalize::optional_id;
use super::{ReconcileError, Reconciler};

/// Largest page size Tiendanube accepts.
pub const MAX_PAGE_SIZE: u32 = 200;

/// A record that failed to reconcile during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecordError {
    /// Upstream id, when the payload carried a usable one.
    pub upstream_id: Option<UpstreamId>,
    pub message: String,
}

/// Summary of one bulk sync run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub run_id: Uuid,
    pub store_id: StoreId,
    pub resource: SyncResource,
    pub status: SyncStatus,
    /// Why the run failed, when `status` is `failed`.
    pub failure: Option<String>,
    pub pages: u32,
    pub added: usize,
    pub updated: usize,
    pub deleted_tombstones: usize,
    pub images_synced: usize,
    pub image_errors: usize,
    pub errors: Vec<SyncRecordError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyncReport {
    fn start(store_id: StoreId, resource: SyncResource) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            store_id,
            resource,
            status: SyncStatus::Completed,
            failure: None,
            pages: 0,
            added: 0,
            updated: 0,
            deleted_tombstones: 0,
            images_synced: 0,
            image_errors: 0,
            errors: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    fn fail(mut self, reason: String) -> Self {
        error!(run_id = %self.run_id, store_id = %self.store_id, resource = %self.resource, reason = %reason, "Sync run failed");
        self.status = SyncStatus::Failed;
        self.failure = Some(reason);
        self.finish()
    }

    fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        info!(
            run_id = %self.run_id,
            store_id = %self.store_id,
            resource = %self.resource,
            status = ?self.status,
            added = self.added,
            updated = self.updated,
            deleted = self.deleted_tombstones,
            errors = self.errors.len(),
            "Sync run finished"
        );
        self
    }

    fn count(&mut self, status: UpsertStatus) {
        match status {
            UpsertStatus::Created => self.added += 1,
            UpsertStatus::Updated => self.updated += 1,
        }
    }

    /// Whether the run reached `Reporting` without aborting.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == SyncStatus::Completed
    }
}

/// Runs full-collection syncs for one store at a time.
#[derive(Clone)]
pub struct BulkSynchronizer {
    reconciler: Reconciler,
    page_size: u32,
}

impl BulkSynchronizer {
    /// Create a synchronizer. `page_size` is clamped to `1..=200`.
    #[must_use]
    pub fn new(reconciler: Reconciler, page_size: u32) -> Self {
        Self {
            reconciler,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Page size used for collection requests.
    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Sync every product of a store, fan out to each product's images,
    /// and delete local products absent upstream.
    #[instrument(skip(self), fields(store_id = %store_id))]
    pub async fn sync_products(&self, store_id: StoreId) -> SyncReport {
        let mut report = SyncReport::start(store_id, SyncResource::Products);
        info!(run_id = %report.run_id, "Product sync started");

        let (credentials, api) = match self.reconciler.connect(store_id).await {
            Ok(connected) => connected,
            Err(e) => return report.fail(e.to_string()),
        };

        // Paginating
        let products = match self
            .fetch_all(&mut report, |page, per_page| {
                let api = Arc::clone(&api);
                async move { api.list_products(page, per_page).await }
            })
            .await
        {
            Ok(products) => products,
            Err(reason) => return report.fail(reason),
        };

        // Reconciling
        let mut seen = HashSet::new();
        for raw in &products {
            // Records that fail below still exist upstream and must survive the sweep.
            if let Some(id) = optional_id(&raw.id) {
                seen.insert(id);
            }

            let reconciled = match self.reconciler.upsert_product(&credentials, raw).await {
                Ok(reconciled) => reconciled,
                Err(e) => {
                    record_failure(&mut report, optional_id(&raw.id), &e);
                    continue;
                }
            };
            report.count(reconciled.status);

            let product = reconciled.entity;
            match api.list_product_images(product.data.upstream_id).await {
                Ok(images) => match self
                    .reconciler
                    .sync_images(&product, &credentials.metadata.main_language, &images)
                    .await
                {
                    Ok(stats) => report.images_synced += stats.upserted,
                    Err(e) => {
                        warn!(product_id = %product.data.upstream_id, error = %e, "Image reconciliation failed");
                        report.image_errors += 1;
                    }
                },
                Err(e) => {
                    warn!(product_id = %product.data.upstream_id, error = %e, "Image fetch failed");
                    report.image_errors += 1;
                }
            }
        }

        // Sweeping
        let store = self.reconciler.store();
        let local = match store.list_products(store_id).await {
            Ok(local) => local,
            Err(e) => return report.fail(format!("tombstone sweep: {e}")),
        };
        for product in local {
            if seen.contains(&product.data.upstream_id) {
                continue;
            }
            match store.delete_product(product.id).await {
                Ok(true) => report.deleted_tombstones += 1,
                Ok(false) => {}
                Err(e) => {
                    return report.fail(format!(
                        "tombstone sweep stopped at product {}: {e}",
                        product.data.upstream_id
                    ));
                }
            }
        }

        // Reporting
        report.finish()
    }

    /// Sync every order of a store. Orders are never tombstone-swept.
    #[instrument(skip(self), fields(store_id = %store_id))]
    pub async fn sync_orders(&self, store_id: StoreId) -> SyncReport {
        let mut report = SyncReport::start(store_id, SyncResource::Orders);
        info!(run_id = %report.run_id, "Order sync started");

        let (credentials, api) = match self.reconciler.connect(store_id).await {
            Ok(connected) => connected,
            Err(e) => return report.fail(e.to_string()),
        };

        let orders = match self
            .fetch_all(&mut report, |page, per_page| {
                let api = Arc::clone(&api);
                async move { api.list_orders(page, per_page).await }
            })
            .await
        {
            Ok(orders) => orders,
            Err(reason) => return report.fail(reason),
        };

        for raw in &orders {
            match self.reconciler.upsert_order(&credentials, raw).await {
                Ok(reconciled) => report.count(reconciled.status),
                Err(e) => record_failure(&mut report, optional_id(&raw.id), &e),
            }
        }

        report.finish()
    }

    /// Fetch pages until a short or empty page, or until `x-total-count`
    /// records have been collected.
    async fn fetch_all<T, F, Fut>(
        &self,
        report: &mut SyncReport,
        fetch_page: F,
    ) -> Result<Vec<T>, String>
    where
        F: Fn(u32, u32) -> Fut,
        Fut: std::future::Future<Output = UpstreamResult<Page<T>>>,
    {
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            let fetched = fetch_page(page, self.page_size)
                .await
                .map_err(|e| format!("page {page}: {e}"))?;

            if fetched.items.is_empty() {
                break;
            }
            report.pages += 1;

            let received = fetched.items.len();
            items.extend(fetched.items);

            let short_page = received < self.page_size as usize;
            let reached_total = fetched
                .total_count
                .is_some_and(|total| items.len() as u64 >= total);
            if short_page || reached_total {
                break;
            }
            page += 1;
        }

        Ok(items)
    }
}

fn record_failure(report: &mut SyncReport, upstream_id: Option<UpstreamId>, e: &ReconcileError) {
    warn!(run_id = %report.run_id, upstream_id = ?upstream_id, error = %e, "Record failed to reconcile");
    report.errors.push(SyncRecordError {
        upstream_id,
        message: e.to_string(),
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serializes_camel_case() {
        let mut report = SyncReport::start(StoreId::new(42), SyncResource::Products);
        report.count(UpsertStatus::Created);
        report.count(UpsertStatus::Updated);
        report.errors.push(SyncRecordError {
            upstream_id: Some(UpstreamId::new(9)),
            message: "boom".to_string(),
        });
        let report = report.finish();

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["storeId"], 42);
        assert_eq!(value["resource"], "products");
        assert_eq!(value["status"], "completed");
        assert_eq!(value["added"], 1);
        assert_eq!(value["updated"], 1);
        assert_eq!(value["deletedTombstones"], 0);
        assert_eq!(value["errors"][0]["upstreamId"], 9);
        assert!(value["finishedAt"].is_string());
    }

    #[test]
    fn test_failed_report_keeps_reason() {
        let report = SyncReport::start(StoreId::new(1), SyncResource::Orders)
            .fail("page 2: upstream request timed out".to_string());

        assert!(!report.is_completed());
        assert_eq!(
            report.failure.as_deref(),
            Some("page 2: upstream request timed out")
        );
        assert!(report.finished_at.is_some());
    }
}
