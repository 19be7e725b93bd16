//! In-memory implementation of [`RecordStore`] and [`CredentialProvider`].
//!
//! All tables live in one `HashMap` set behind a single `tokio::sync::RwLock`,
//! so cascades and uniqueness checks happen under one write lock. Nothing is
//! durable; this backs tests and local runs without `PostgreSQL`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use nube_bridge_core::{OrderId, ProductId, ProductImageId, Provider, StoreId, UpstreamId};
use tokio::sync::RwLock;

use super::{
    CredentialProvider, RecordStore, RepositoryError, RepositoryResult,
    models::{
        IdempotencyRecord, OrderData, OrderRecord, ProductData, ProductImageData,
        ProductImageRecord, ProductRecord, StoreCredentials,
    },
};

#[derive(Default)]
struct Tables {
    next_id: i64,
    products: HashMap<ProductId, ProductRecord>,
    images: HashMap<ProductImageId, ProductImageRecord>,
    orders: HashMap<OrderId, OrderRecord>,
    ledger: HashMap<String, IdempotencyRecord>,
    credentials: HashMap<StoreId, StoreCredentials>,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory record store.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace credentials for a store.
    pub async fn insert_credentials(&self, credentials: StoreCredentials) {
        self.tables
            .write()
            .await
            .credentials
            .insert(credentials.store_id, credentials);
    }

    /// Every ledger entry, in insertion-independent order.
    pub async fn ledger_entries(&self) -> Vec<IdempotencyRecord> {
        self.tables.read().await.ledger.values().cloned().collect()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find_product(
        &self,
        provider: Provider,
        upstream_id: UpstreamId,
    ) -> RepositoryResult<Option<ProductRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .products
            .values()
            .find(|p| p.data.provider == provider && p.data.upstream_id == upstream_id)
            .cloned())
    }

    async fn insert_product(&self, data: &ProductData) -> RepositoryResult<ProductRecord> {
        let mut tables = self.tables.write().await;
        if tables
            .products
            .values()
            .any(|p| p.data.provider == data.provider && p.data.upstream_id == data.upstream_id)
        {
            return Err(RepositoryError::Conflict("product already exists".into()));
        }

        let record = ProductRecord {
            id: ProductId::new(tables.allocate_id()),
            data: data.clone(),
            synced_at: Utc::now(),
        };
        tables.products.insert(record.id, record.clone());
        Ok(record)
    }

    async fn patch_product(
        &self,
        id: ProductId,
        data: &ProductData,
    ) -> RepositoryResult<ProductRecord> {
        let mut tables = self.tables.write().await;
        let record = tables
            .products
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        // Natural key and owning store are fixed at insert.
        record.data = ProductData {
            provider: record.data.provider,
            store_id: record.data.store_id,
            upstream_id: record.data.upstream_id,
            ..data.clone()
        };
        record.synced_at = Utc::now();
        Ok(record.clone())
    }

    async fn delete_product(&self, id: ProductId) -> RepositoryResult<bool> {
        let mut tables = self.tables.write().await;
        let removed = tables.products.remove(&id).is_some();
        if removed {
            tables.images.retain(|_, image| image.data.product_id != id);
        }
        Ok(removed)
    }

    async fn list_products(&self, store_id: StoreId) -> RepositoryResult<Vec<ProductRecord>> {
        let tables = self.tables.read().await;
        let mut products: Vec<_> = tables
            .products
            .values()
            .filter(|p| p.data.store_id == store_id)
            .cloned()
            .collect();
        products.sort_by_key(|p| p.id);
        Ok(products)
    }

    async fn find_product_image(
        &self,
        product_id: ProductId,
        upstream_id: UpstreamId,
    ) -> RepositoryResult<Option<ProductImageRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .images
            .values()
            .find(|i| i.data.product_id == product_id && i.data.upstream_id == upstream_id)
            .cloned())
    }

    async fn insert_product_image(
        &self,
        data: &ProductImageData,
    ) -> RepositoryResult<ProductImageRecord> {
        let mut tables = self.tables.write().await;
        if !tables.products.contains_key(&data.product_id) {
            return Err(RepositoryError::NotFound);
        }
        if tables
            .images
            .values()
            .any(|i| i.data.product_id == data.product_id && i.data.upstream_id == data.upstream_id)
        {
            return Err(RepositoryError::Conflict(
                "product image already exists".into(),
            ));
        }

        let record = ProductImageRecord {
            id: ProductImageId::new(tables.allocate_id()),
            data: data.clone(),
            synced_at: Utc::now(),
        };
        tables.images.insert(record.id, record.clone());
        Ok(record)
    }

    async fn patch_product_image(
        &self,
        id: ProductImageId,
        data: &ProductImageData,
    ) -> RepositoryResult<ProductImageRecord> {
        let mut tables = self.tables.write().await;
        let record = tables.images.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        record.data = ProductImageData {
            product_id: record.data.product_id,
            upstream_id: record.data.upstream_id,
            ..data.clone()
        };
        record.synced_at = Utc::now();
        Ok(record.clone())
    }

    async fn delete_product_image(&self, id: ProductImageId) -> RepositoryResult<bool> {
        Ok(self.tables.write().await.images.remove(&id).is_some())
    }

    async fn list_product_images(
        &self,
        product_id: ProductId,
    ) -> RepositoryResult<Vec<ProductImageRecord>> {
        let tables = self.tables.read().await;
        let mut images: Vec<_> = tables
            .images
            .values()
            .filter(|i| i.data.product_id == product_id)
            .cloned()
            .collect();
        images.sort_by_key(|i| (i.data.position.unwrap_or(i32::MAX), i.id));
        Ok(images)
    }

    async fn find_order(
        &self,
        provider: Provider,
        upstream_id: UpstreamId,
    ) -> RepositoryResult<Option<OrderRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .values()
            .find(|o| o.data.provider == provider && o.data.upstream_id == upstream_id)
            .cloned())
    }

    async fn insert_order(&self, data: &OrderData) -> RepositoryResult<OrderRecord> {
        let mut tables = self.tables.write().await;
        if tables
            .orders
            .values()
            .any(|o| o.data.provider == data.provider && o.data.upstream_id == data.upstream_id)
        {
            return Err(RepositoryError::Conflict("order already exists".into()));
        }

        let record = OrderRecord {
            id: OrderId::new(tables.allocate_id()),
            data: data.clone(),
            synced_at: Utc::now(),
        };
        tables.orders.insert(record.id, record.clone());
        Ok(record)
    }

    async fn patch_order(&self, id: OrderId, data: &OrderData) -> RepositoryResult<OrderRecord> {
        let mut tables = self.tables.write().await;
        let record = tables.orders.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        record.data = OrderData {
            provider: record.data.provider,
            store_id: record.data.store_id,
            upstream_id: record.data.upstream_id,
            ..data.clone()
        };
        record.synced_at = Utc::now();
        Ok(record.clone())
    }

    async fn delete_order(&self, id: OrderId) -> RepositoryResult<bool> {
        Ok(self.tables.write().await.orders.remove(&id).is_some())
    }

    async fn list_orders(&self, store_id: StoreId) -> RepositoryResult<Vec<OrderRecord>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<_> = tables
            .orders
            .values()
            .filter(|o| o.data.store_id == store_id)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.id);
        Ok(orders)
    }

    async fn find_idempotency_record(
        &self,
        key: &str,
    ) -> RepositoryResult<Option<IdempotencyRecord>> {
        Ok(self.tables.read().await.ledger.get(key).cloned())
    }

    async fn insert_idempotency_record(&self, record: &IdempotencyRecord) -> RepositoryResult<()> {
        let mut tables = self.tables.write().await;
        if tables.ledger.contains_key(&record.key) {
            return Err(RepositoryError::Conflict(
                "idempotency key already exists".into(),
            ));
        }
        tables.ledger.insert(record.key.clone(), record.clone());
        Ok(())
    }

    async fn health_check(&self) -> RepositoryResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl CredentialProvider for MemoryStore {
    async fn credentials(&self, store_id: StoreId) -> RepositoryResult<Option<StoreCredentials>> {
        Ok(self.tables.read().await.credentials.get(&store_id).cloned())
    }

    async fn list_store_ids(&self) -> RepositoryResult<Vec<StoreId>> {
        let mut ids: Vec<_> = self.tables.read().await.credentials.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}
