//! Bulk synchronizer tests and the operator sync route.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode, header::AUTHORIZATION},
};
use common::{Harness, STORE_ID, config, order, product, read_json};
use nube_bridge::db::{
    IdempotencyRecord, MemoryStore, OrderData, OrderRecord, ProductData, ProductImageData,
    ProductImageRecord, ProductRecord, RecordStore, RepositoryError, RepositoryResult,
};
use nube_bridge::sync::scheduler;
use nube_bridge_core::{
    OrderId, ProductId, ProductImageId, Provider, StoreId, SyncStatus, UpstreamId,
};
use secrecy::SecretString;
use serde_json::json;
use tower::ServiceExt;

const SYNC_TOKEN: &str = "Zt7pQ2vX9mK4rW8nB3cY6hL1sD5fG0jA";

fn store() -> StoreId {
    StoreId::new(STORE_ID)
}

async fn local_product_ids(harness: &Harness) -> Vec<i64> {
    let mut ids: Vec<i64> = harness
        .store
        .list_products(store())
        .await
        .unwrap()
        .iter()
        .map(|p| p.data.upstream_id.as_i64())
        .collect();
    ids.sort_unstable();
    ids
}

// =============================================================================
// Products
// =============================================================================

#[tokio::test]
async fn test_second_sync_patches_every_record() {
    let harness = Harness::new().await;
    harness.api.set_products(vec![
        product(1, "Remera"),
        product(2, "Buzo"),
        product(3, "Gorra"),
    ]);
    let synchronizer = harness.state.synchronizer();

    let first = synchronizer.sync_products(store()).await;
    assert_eq!(first.status, SyncStatus::Completed);
    assert_eq!(first.added, 3);
    assert_eq!(first.images_synced, 3);

    let second = synchronizer.sync_products(store()).await;
    assert_eq!(second.status, SyncStatus::Completed);
    assert_eq!(second.added, 0);
    assert_eq!(second.updated, 3);
    assert_eq!(second.deleted_tombstones, 0);
    assert!(second.errors.is_empty());
}

#[tokio::test]
async fn test_tombstone_sweep_deletes_only_missing_product() {
    let harness = Harness::new().await;
    harness.api.set_products(vec![
        product(1, "Remera"),
        product(2, "Buzo"),
        product(3, "Gorra"),
    ]);
    let synchronizer = harness.state.synchronizer();
    synchronizer.sync_products(store()).await;

    let before_a = harness
        .store
        .find_product(Provider::Tiendanube, UpstreamId::new(1))
        .await
        .unwrap()
        .unwrap();

    harness
        .api
        .set_products(vec![product(1, "Remera"), product(3, "Gorra")]);
    let report = synchronizer.sync_products(store()).await;

    assert_eq!(report.status, SyncStatus::Completed);
    assert_eq!(report.deleted_tombstones, 1);
    assert_eq!(report.updated, 2);
    assert_eq!(local_product_ids(&harness).await, vec![1, 3]);

    let after_a = harness
        .store
        .find_product(Provider::Tiendanube, UpstreamId::new(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(before_a.id, after_a.id);
    assert_eq!(before_a.data, after_a.data);
}

#[tokio::test]
async fn test_sweep_does_not_touch_other_stores() {
    let harness = Harness::new().await;
    let other = nube_bridge::sync::normalize_product(StoreId::new(7), "es", &product(50, "Ajena"))
        .unwrap();
    harness.store.insert_product(&other).await.unwrap();
    harness.api.set_products(vec![product(1, "Remera")]);

    let report = harness.state.synchronizer().sync_products(store()).await;

    assert_eq!(report.deleted_tombstones, 0);
    assert_eq!(
        harness.store.list_products(StoreId::new(7)).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_small_pages_follow_total_count() {
    let mut config = config();
    config.sync.page_size = 2;
    let harness = Harness::with_config(config).await;
    harness
        .api
        .set_products((1..=5).map(|id| product(id, "Remera")).collect());
    let synchronizer = harness.state.synchronizer();
    assert_eq!(synchronizer.page_size(), 2);

    let report = synchronizer.sync_products(store()).await;

    assert_eq!(report.pages, 3);
    assert_eq!(report.added, 5);
}

#[tokio::test]
async fn test_failed_listing_fails_run_before_writes() {
    let harness = Harness::new().await;
    harness.api.set_products(vec![product(1, "Remera")]);
    let synchronizer = harness.state.synchronizer();
    synchronizer.sync_products(store()).await;

    harness.api.listing_fails.store(true, Ordering::SeqCst);
    harness.api.set_products(Vec::new());
    let report = synchronizer.sync_products(store()).await;

    assert_eq!(report.status, SyncStatus::Failed);
    assert!(report.failure.as_deref().unwrap().starts_with("page 1"));
    assert_eq!(report.deleted_tombstones, 0);
    assert_eq!(local_product_ids(&harness).await, vec![1]);
}

#[tokio::test]
async fn test_invalid_record_reported_and_run_continues() {
    let harness = Harness::new().await;
    let mut broken = product(2, "Sin id");
    broken.id = json!(null);
    harness
        .api
        .set_products(vec![product(1, "Remera"), broken, product(3, "Gorra")]);

    let report = harness.state.synchronizer().sync_products(store()).await;

    assert_eq!(report.status, SyncStatus::Completed);
    assert_eq!(report.added, 2);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].upstream_id.is_none());
}

#[tokio::test]
async fn test_unknown_store_fails_run() {
    let harness = Harness::new().await;

    let report = harness
        .state
        .synchronizer()
        .sync_products(StoreId::new(99))
        .await;

    assert_eq!(report.status, SyncStatus::Failed);
    assert!(report.failure.unwrap().contains("99"));
}

#[tokio::test]
async fn test_image_fetch_failure_counts_and_keeps_product() {
    let harness = Harness::new().await;
    harness
        .api
        .set_products(vec![product(1, "Remera"), product(2, "Buzo")]);
    harness.api.images_fail.store(true, Ordering::SeqCst);

    let report = harness.state.synchronizer().sync_products(store()).await;

    assert_eq!(report.status, SyncStatus::Completed);
    assert_eq!(report.added, 2);
    assert_eq!(report.image_errors, 2);
    assert_eq!(report.images_synced, 0);
    assert!(report.errors.is_empty());
    assert_eq!(local_product_ids(&harness).await, vec![1, 2]);
}

/// Delegates to a [`MemoryStore`] but fails product deletes once
/// `allowed_deletes` is used up.
struct FailingDeletes {
    inner: Arc<MemoryStore>,
    allowed_deletes: AtomicUsize,
}

#[async_trait]
impl RecordStore for FailingDeletes {
    async fn find_product(
        &self,
        provider: Provider,
        upstream_id: UpstreamId,
    ) -> RepositoryResult<Option<ProductRecord>> {
        self.inner.find_product(provider, upstream_id).await
    }

    async fn insert_product(&self, data: &ProductData) -> RepositoryResult<ProductRecord> {
        self.inner.insert_product(data).await
    }

    async fn patch_product(
        &self,
        id: ProductId,
        data: &ProductData,
    ) -> RepositoryResult<ProductRecord> {
        self.inner.patch_product(id, data).await
    }

    async fn delete_product(&self, id: ProductId) -> RepositoryResult<bool> {
        let remaining = self.allowed_deletes.load(Ordering::SeqCst);
        if remaining == 0 {
            return Err(RepositoryError::DataCorruption("disk full".to_string()));
        }
        self.allowed_deletes.store(remaining - 1, Ordering::SeqCst);
        self.inner.delete_product(id).await
    }

    async fn list_products(&self, store_id: StoreId) -> RepositoryResult<Vec<ProductRecord>> {
        self.inner.list_products(store_id).await
    }

    async fn find_product_image(
        &self,
        product_id: ProductId,
        upstream_id: UpstreamId,
    ) -> RepositoryResult<Option<ProductImageRecord>> {
        self.inner.find_product_image(product_id, upstream_id).await
    }

    async fn insert_product_image(
        &self,
        data: &ProductImageData,
    ) -> RepositoryResult<ProductImageRecord> {
        self.inner.insert_product_image(data).await
    }

    async fn patch_product_image(
        &self,
        id: ProductImageId,
        data: &ProductImageData,
    ) -> RepositoryResult<ProductImageRecord> {
        self.inner.patch_product_image(id, data).await
    }

    async fn delete_product_image(&self, id: ProductImageId) -> RepositoryResult<bool> {
        self.inner.delete_product_image(id).await
    }

    async fn list_product_images(
        &self,
        product_id: ProductId,
    ) -> RepositoryResult<Vec<ProductImageRecord>> {
        self.inner.list_product_images(product_id).await
    }

    async fn find_order(
        &self,
        provider: Provider,
        upstream_id: UpstreamId,
    ) -> RepositoryResult<Option<OrderRecord>> {
        self.inner.find_order(provider, upstream_id).await
    }

    async fn insert_order(&self, data: &OrderData) -> RepositoryResult<OrderRecord> {
        self.inner.insert_order(data).await
    }

    async fn patch_order(&self, id: OrderId, data: &OrderData) -> RepositoryResult<OrderRecord> {
        self.inner.patch_order(id, data).await
    }

    async fn delete_order(&self, id: OrderId) -> RepositoryResult<bool> {
        self.inner.delete_order(id).await
    }

    async fn list_orders(&self, store_id: StoreId) -> RepositoryResult<Vec<OrderRecord>> {
        self.inner.list_orders(store_id).await
    }

    async fn find_idempotency_record(
        &self,
        key: &str,
    ) -> RepositoryResult<Option<IdempotencyRecord>> {
        self.inner.find_idempotency_record(key).await
    }

    async fn insert_idempotency_record(&self, record: &IdempotencyRecord) -> RepositoryResult<()> {
        self.inner.insert_idempotency_record(record).await
    }

    async fn health_check(&self) -> RepositoryResult<()> {
        self.inner.health_check().await
    }

    fn backend_name(&self) -> &'static str {
        "failing-deletes"
    }
}

#[tokio::test]
async fn test_sweep_failure_fails_run_and_keeps_counts() {
    let harness = Harness::with_records(config(), |inner| {
        Arc::new(FailingDeletes {
            inner,
            allowed_deletes: AtomicUsize::new(1),
        }) as Arc<dyn RecordStore>
    })
    .await;
    harness
        .api
        .set_products((1..=4).map(|id| product(id, "Remera")).collect());
    let synchronizer = harness.state.synchronizer();
    synchronizer.sync_products(store()).await;

    harness.api.set_products(vec![product(1, "Remera")]);
    let report = synchronizer.sync_products(store()).await;

    assert_eq!(report.status, SyncStatus::Failed);
    assert!(report.failure.as_deref().unwrap().starts_with("tombstone sweep"));
    assert_eq!(report.updated, 1);
    assert_eq!(report.deleted_tombstones, 1);
    assert!(report.finished_at.is_some());
    assert_eq!(local_product_ids(&harness).await, vec![1, 3, 4]);
}

// =============================================================================
// Scheduled sync
// =============================================================================

#[tokio::test]
async fn test_scheduled_run_syncs_products_and_orders() {
    let harness = Harness::new().await;
    harness
        .api
        .set_products(vec![product(1, "Remera"), product(2, "Buzo")]);
    harness.api.set_orders(vec![order(500, 9)]);

    scheduler::run_once(
        harness.state.synchronizer(),
        harness.state.credentials().as_ref(),
    )
    .await;

    assert_eq!(local_product_ids(&harness).await, vec![1, 2]);
    assert_eq!(harness.store.list_orders(store()).await.unwrap().len(), 1);
}

// =============================================================================
// Orders
// =============================================================================

#[tokio::test]
async fn test_order_sync_never_sweeps() {
    let harness = Harness::new().await;
    harness.api.set_orders(vec![order(500, 9), order(501, 9)]);
    let synchronizer = harness.state.synchronizer();

    let first = synchronizer.sync_orders(store()).await;
    assert_eq!(first.added, 2);

    harness.api.set_orders(vec![order(500, 9)]);
    let second = synchronizer.sync_orders(store()).await;

    assert_eq!(second.status, SyncStatus::Completed);
    assert_eq!(second.updated, 1);
    assert_eq!(second.deleted_tombstones, 0);
    assert_eq!(harness.store.list_orders(store()).await.unwrap().len(), 2);
}

// =============================================================================
// Operator route
// =============================================================================

fn sync_request(token: Option<&str>, body: &serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/api/sync");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

async fn harness_with_token() -> Harness {
    let mut config = config();
    config.sync.api_token = Some(SecretString::from(SYNC_TOKEN));
    Harness::with_config(config).await
}

#[tokio::test]
async fn test_sync_route_disabled_without_token() {
    let harness = Harness::new().await;

    let response = harness
        .router()
        .oneshot(sync_request(Some(SYNC_TOKEN), &json!({"store_id": STORE_ID})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sync_route_rejects_wrong_token() {
    let harness = harness_with_token().await;

    let response = harness
        .router()
        .oneshot(sync_request(Some("wrong"), &json!({"store_id": STORE_ID})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = harness
        .router()
        .oneshot(sync_request(None, &json!({"store_id": STORE_ID})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sync_route_runs_requested_resources() {
    let harness = harness_with_token().await;
    harness.api.set_products(vec![product(1, "Remera")]);
    harness.api.set_orders(vec![order(500, 9)]);

    let response = harness
        .router()
        .oneshot(sync_request(
            Some(SYNC_TOKEN),
            &json!({"store_id": STORE_ID, "resource": "all"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["reports"][0]["resource"], "products");
    assert_eq!(body["reports"][0]["added"], 1);
    assert_eq!(body["reports"][1]["resource"], "orders");
    assert_eq!(body["reports"][1]["status"], "completed");
}

#[tokio::test]
async fn test_sync_route_rejects_bad_body() {
    let harness = harness_with_token().await;

    let response = harness
        .router()
        .oneshot(sync_request(
            Some(SYNC_TOKEN),
            &json!({"store_id": STORE_ID, "resource": "customers"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
