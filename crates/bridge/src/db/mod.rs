//! Persistence for the bridge.
//!
//! # Database: `bridge` schema
//!
//! ## Tables
//!
//! - `store_credential` - Per-store API token and cached store metadata
//! - `product` - Products keyed by `(provider, upstream_id)`
//! - `product_image` - Images owned by a product (cascade on product delete)
//! - `order` - Orders keyed by `(provider, upstream_id)`
//! - `webhook_idempotency` - Append-only ledger of processed notifications
//!
//! # Backends
//!
//! The pipeline talks to [`RecordStore`] and [`CredentialProvider`] trait
//! objects. [`PgRecordStore`] is the production backend; [`MemoryStore`]
//! backs tests and local runs without a database.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/bridge/migrations/` and run via:
//! ```bash
//! cargo run -p nube-bridge-cli -- migrate
//! ```

mod memory;
pub mod models;
mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use nube_bridge_core::{OrderId, ProductId, ProductImageId, Provider, StoreId, UpstreamId};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use memory::MemoryStore;
pub use models::{
    IdempotencyRecord, LineItem, OrderData, OrderRecord, ProductData, ProductImageData,
    ProductImageRecord, ProductRecord, StoreCredentials, StoreMetadata,
};
pub use postgres::PgRecordStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate idempotency key).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Result alias for repository calls.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Storage for synced domain records and the idempotency ledger.
///
/// Every lookup is by natural key `(provider, upstream_id)`, or by
/// `(product_id, upstream_id)` for images. Writes return the stored record.
#[async_trait]
pub trait RecordStore: Send + Sync {
    // =========================================================================
    // Products
    // =========================================================================

    /// Find a product by natural key.
    async fn find_product(
        &self,
        provider: Provider,
        upstream_id: UpstreamId,
    ) -> RepositoryResult<Option<ProductRecord>>;

    /// Insert a new product.
    ///
    /// Returns `RepositoryError::Conflict` if the natural key already exists.
    async fn insert_product(&self, data: &ProductData) -> RepositoryResult<ProductRecord>;

    /// Overwrite every attribute of an existing product.
    async fn patch_product(&self, id: ProductId, data: &ProductData)
    -> RepositoryResult<ProductRecord>;

    /// Delete a product and its images. Returns `false` if it did not exist.
    async fn delete_product(&self, id: ProductId) -> RepositoryResult<bool>;

    /// All products for a store.
    async fn list_products(&self, store_id: StoreId) -> RepositoryResult<Vec<ProductRecord>>;

    // =========================================================================
    // Product images
    // =========================================================================

    /// Find an image of a product by its upstream id.
    async fn find_product_image(
        &self,
        product_id: ProductId,
        upstream_id: UpstreamId,
    ) -> RepositoryResult<Option<ProductImageRecord>>;

    /// Insert a new image.
    async fn insert_product_image(
        &self,
        data: &ProductImageData,
    ) -> RepositoryResult<ProductImageRecord>;

    /// Overwrite every attribute of an existing image.
    async fn patch_product_image(
        &self,
        id: ProductImageId,
        data: &ProductImageData,
    ) -> RepositoryResult<ProductImageRecord>;

    /// Delete one image. Returns `false` if it did not exist.
    async fn delete_product_image(&self, id: ProductImageId) -> RepositoryResult<bool>;

    /// All images of a product, ordered by position.
    async fn list_product_images(
        &self,
        product_id: ProductId,
    ) -> RepositoryResult<Vec<ProductImageRecord>>;

    // =========================================================================
    // Orders
    // =========================================================================

    /// Find an order by natural key.
    async fn find_order(
        &self,
        provider: Provider,
        upstream_id: UpstreamId,
    ) -> RepositoryResult<Option<OrderRecord>>;

    /// Insert a new order.
    async fn insert_order(&self, data: &OrderData) -> RepositoryResult<OrderRecord>;

    /// Overwrite every attribute of an existing order.
    async fn patch_order(&self, id: OrderId, data: &OrderData) -> RepositoryResult<OrderRecord>;

    /// Delete an order. Returns `false` if it did not exist.
    async fn delete_order(&self, id: OrderId) -> RepositoryResult<bool>;

    /// All orders for a store.
    async fn list_orders(&self, store_id: StoreId) -> RepositoryResult<Vec<OrderRecord>>;

    // =========================================================================
    // Idempotency ledger
    // =========================================================================

    /// Look up a ledger entry by dedupe key.
    async fn find_idempotency_record(
        &self,
        key: &str,
    ) -> RepositoryResult<Option<IdempotencyRecord>>;

    /// Append a ledger entry.
    ///
    /// Returns `RepositoryError::Conflict` if the key is already present.
    async fn insert_idempotency_record(&self, record: &IdempotencyRecord) -> RepositoryResult<()>;

    // =========================================================================
    // Operations
    // =========================================================================

    /// Verify the backend is reachable.
    async fn health_check(&self) -> RepositoryResult<()>;

    /// Short backend name for logs and health output.
    fn backend_name(&self) -> &'static str;
}

/// Source of per-store API credentials.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Credentials for a store, or `None` if the store is not installed.
    async fn credentials(&self, store_id: StoreId) -> RepositoryResult<Option<StoreCredentials>>;

    /// Every store with stored credentials.
    async fn list_store_ids(&self) -> RepositoryResult<Vec<StoreId>>;
}
