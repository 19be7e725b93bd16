//! `PostgreSQL` backend for [`RecordStore`] and [`CredentialProvider`].
//!
//! Queries are built at runtime with `query_as` so the crate builds without a
//! live database; row structs map columns and `TryFrom` converts them into
//! domain records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nube_bridge_core::{
    LedgerStatus, OrderId, ProductId, ProductImageId, Provider, StoreId, UpstreamId,
};
use secrecy::SecretString;
use serde_json::Value;
use sqlx::PgPool;
use sqlx::types::Json;

use super::{
    CredentialProvider, RecordStore, RepositoryError, RepositoryResult,
    models::{
        IdempotencyRecord, LineItem, OrderData, OrderRecord, ProductData, ProductImageData,
        ProductImageRecord, ProductRecord, StoreCredentials, StoreMetadata,
    },
};

// =============================================================================
// Internal Row Types
// =============================================================================

const PRODUCT_COLUMNS: &str = "id, provider, store_id, upstream_id, title, name, description, \
     handle, brand, tags, published, free_shipping, price, variants, upstream_created_at, \
     upstream_updated_at, synced_at";

const IMAGE_COLUMNS: &str = "id, product_id, upstream_id, src, position, alt, \
     upstream_created_at, upstream_updated_at, synced_at";

const ORDER_COLUMNS: &str = "id, provider, store_id, upstream_id, number, token, status, \
     payment_status, shipping_status, currency, subtotal, discount, shipping_cost, total, \
     customer_id, contact_name, contact_email, contact_phone, contact_identification, \
     billing_address, shipping_address, line_items, upstream_created_at, upstream_updated_at, \
     paid_at, cancelled_at, closed_at, synced_at";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i64,
    provider: String,
    store_id: i64,
    upstream_id: i64,
    title: String,
    name: Value,
    description: Option<String>,
    handle: Option<String>,
    brand: Option<String>,
    tags: Option<String>,
    published: bool,
    free_shipping: bool,
    price: Option<String>,
    variants: Value,
    upstream_created_at: Option<String>,
    upstream_updated_at: Option<String>,
    synced_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for ProductRecord {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ProductId::new(row.id),
            data: ProductData {
                provider: parse_provider(&row.provider)?,
                store_id: StoreId::new(row.store_id),
                upstream_id: UpstreamId::new(row.upstream_id),
                title: row.title,
                name: row.name,
                description: row.description,
                handle: row.handle,
                brand: row.brand,
                tags: row.tags,
                published: row.published,
                free_shipping: row.free_shipping,
                price: row.price,
                variants: row.variants,
                upstream_created_at: row.upstream_created_at,
                upstream_updated_at: row.upstream_updated_at,
            },
            synced_at: row.synced_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductImageRow {
    id: i64,
    product_id: i64,
    upstream_id: i64,
    src: String,
    position: Option<i32>,
    alt: Option<String>,
    upstream_created_at: Option<String>,
    upstream_updated_at: Option<String>,
    synced_at: DateTime<Utc>,
}

impl From<ProductImageRow> for ProductImageRecord {
    fn from(row: ProductImageRow) -> Self {
        Self {
            id: ProductImageId::new(row.id),
            data: ProductImageData {
                product_id: ProductId::new(row.product_id),
                upstream_id: UpstreamId::new(row.upstream_id),
                src: row.src,
                position: row.position,
                alt: row.alt,
                upstream_created_at: row.upstream_created_at,
                upstream_updated_at: row.upstream_updated_at,
            },
            synced_at: row.synced_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    provider: String,
    store_id: i64,
    upstream_id: i64,
    number: Option<i64>,
    token: Option<String>,
    status: Option<String>,
    payment_status: Option<String>,
    shipping_status: Option<String>,
    currency: Option<String>,
    subtotal: Option<String>,
    discount: Option<String>,
    shipping_cost: Option<String>,
    total: Option<String>,
    customer_id: Option<i64>,
    contact_name: Option<String>,
    contact_email: Option<String>,
    contact_phone: Option<String>,
    contact_identification: Option<String>,
    billing_address: Value,
    shipping_address: Value,
    line_items: Json<Vec<LineItem>>,
    upstream_created_at: Option<String>,
    upstream_updated_at: Option<String>,
    paid_at: Option<String>,
    cancelled_at: Option<String>,
    closed_at: Option<String>,
    synced_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for OrderRecord {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: OrderId::new(row.id),
            data: OrderData {
                provider: parse_provider(&row.provider)?,
                store_id: StoreId::new(row.store_id),
                upstream_id: UpstreamId::new(row.upstream_id),
                number: row.number,
                token: row.token,
                status: row.status,
                payment_status: row.payment_status,
                shipping_status: row.shipping_status,
                currency: row.currency,
                subtotal: row.subtotal,
                discount: row.discount,
                shipping_cost: row.shipping_cost,
                total: row.total,
                customer_id: row.customer_id.map(UpstreamId::new),
                contact_name: row.contact_name,
                contact_email: row.contact_email,
                contact_phone: row.contact_phone,
                contact_identification: row.contact_identification,
                billing_address: row.billing_address,
                shipping_address: row.shipping_address,
                line_items: row.line_items.0,
                upstream_created_at: row.upstream_created_at,
                upstream_updated_at: row.upstream_updated_at,
                paid_at: row.paid_at,
                cancelled_at: row.cancelled_at,
                closed_at: row.closed_at,
            },
            synced_at: row.synced_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct IdempotencyRow {
    idempotency_key: String,
    store_id: i64,
    event: String,
    resource_id: Option<i64>,
    payload: String,
    processed_at: DateTime<Utc>,
    status: String,
}

impl TryFrom<IdempotencyRow> for IdempotencyRecord {
    type Error = RepositoryError;

    fn try_from(row: IdempotencyRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<LedgerStatus>()
            .map_err(RepositoryError::DataCorruption)?;

        Ok(Self {
            key: row.idempotency_key,
            store_id: StoreId::new(row.store_id),
            event: row.event,
            resource_id: row.resource_id.map(UpstreamId::new),
            payload: row.payload,
            processed_at: row.processed_at,
            status,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    store_id: i64,
    access_token: String,
    store_name: Option<String>,
    main_language: String,
    main_currency: Option<String>,
}

impl From<CredentialRow> for StoreCredentials {
    fn from(row: CredentialRow) -> Self {
        Self {
            store_id: StoreId::new(row.store_id),
            access_token: SecretString::from(row.access_token),
            metadata: StoreMetadata {
                name: row.store_name,
                main_language: row.main_language,
                main_currency: row.main_currency,
            },
        }
    }
}

fn parse_provider(value: &str) -> Result<Provider, RepositoryError> {
    value
        .parse::<Provider>()
        .map_err(RepositoryError::DataCorruption)
}

/// Map a unique-constraint violation to `RepositoryError::Conflict`.
fn map_write_error(e: sqlx::Error, what: &str) -> RepositoryError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            RepositoryError::Conflict(format!("{what} already exists"))
        }
        _ => RepositoryError::Database(e),
    }
}

// =============================================================================
// Repository
// =============================================================================

/// `PostgreSQL`-backed record store and credential provider.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn find_product(
        &self,
        provider: Provider,
        upstream_id: UpstreamId,
    ) -> RepositoryResult<Option<ProductRecord>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM bridge.product WHERE provider = $1 AND upstream_id = $2"
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(provider.as_str())
            .bind(upstream_id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn insert_product(&self, data: &ProductData) -> RepositoryResult<ProductRecord> {
        let sql = format!(
            r"
            INSERT INTO bridge.product (
                provider, store_id, upstream_id, title, name, description, handle, brand,
                tags, published, free_shipping, price, variants, upstream_created_at,
                upstream_updated_at, synced_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, NOW())
            RETURNING {PRODUCT_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(data.provider.as_str())
            .bind(data.store_id.as_i64())
            .bind(data.upstream_id.as_i64())
            .bind(&data.title)
            .bind(&data.name)
            .bind(&data.description)
            .bind(&data.handle)
            .bind(&data.brand)
            .bind(&data.tags)
            .bind(data.published)
            .bind(data.free_shipping)
            .bind(&data.price)
            .bind(&data.variants)
            .bind(&data.upstream_created_at)
            .bind(&data.upstream_updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_write_error(e, "product"))?;

        row.try_into()
    }

    async fn patch_product(
        &self,
        id: ProductId,
        data: &ProductData,
    ) -> RepositoryResult<ProductRecord> {
        let sql = format!(
            r"
            UPDATE bridge.product
            SET title = $2, name = $3, description = $4, handle = $5, brand = $6, tags = $7,
                published = $8, free_shipping = $9, price = $10, variants = $11,
                upstream_created_at = $12, upstream_updated_at = $13, synced_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id.as_i64())
            .bind(&data.title)
            .bind(&data.name)
            .bind(&data.description)
            .bind(&data.handle)
            .bind(&data.brand)
            .bind(&data.tags)
            .bind(data.published)
            .bind(data.free_shipping)
            .bind(&data.price)
            .bind(&data.variants)
            .bind(&data.upstream_created_at)
            .bind(&data.upstream_updated_at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    async fn delete_product(&self, id: ProductId) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM bridge.product WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_products(&self, store_id: StoreId) -> RepositoryResult<Vec<ProductRecord>> {
        let sql =
            format!("SELECT {PRODUCT_COLUMNS} FROM bridge.product WHERE store_id = $1 ORDER BY id");
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(store_id.as_i64())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_product_image(
        &self,
        product_id: ProductId,
        upstream_id: UpstreamId,
    ) -> RepositoryResult<Option<ProductImageRecord>> {
        let sql = format!(
            "SELECT {IMAGE_COLUMNS} FROM bridge.product_image \
             WHERE product_id = $1 AND upstream_id = $2"
        );
        let row = sqlx::query_as::<_, ProductImageRow>(&sql)
            .bind(product_id.as_i64())
            .bind(upstream_id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn insert_product_image(
        &self,
        data: &ProductImageData,
    ) -> RepositoryResult<ProductImageRecord> {
        let sql = format!(
            r"
            INSERT INTO bridge.product_image (
                product_id, upstream_id, src, position, alt, upstream_created_at,
                upstream_updated_at, synced_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            RETURNING {IMAGE_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, ProductImageRow>(&sql)
            .bind(data.product_id.as_i64())
            .bind(data.upstream_id.as_i64())
            .bind(&data.src)
            .bind(data.position)
            .bind(&data.alt)
            .bind(&data.upstream_created_at)
            .bind(&data.upstream_updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_write_error(e, "product image"))?;

        Ok(row.into())
    }

    async fn patch_product_image(
        &self,
        id: ProductImageId,
        data: &ProductImageData,
    ) -> RepositoryResult<ProductImageRecord> {
        let sql = format!(
            r"
            UPDATE bridge.product_image
            SET src = $2, position = $3, alt = $4, upstream_created_at = $5,
                upstream_updated_at = $6, synced_at = NOW()
            WHERE id = $1
            RETURNING {IMAGE_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, ProductImageRow>(&sql)
            .bind(id.as_i64())
            .bind(&data.src)
            .bind(data.position)
            .bind(&data.alt)
            .bind(&data.upstream_created_at)
            .bind(&data.upstream_updated_at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    async fn delete_product_image(&self, id: ProductImageId) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM bridge.product_image WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_product_images(
        &self,
        product_id: ProductId,
    ) -> RepositoryResult<Vec<ProductImageRecord>> {
        let sql = format!(
            "SELECT {IMAGE_COLUMNS} FROM bridge.product_image \
             WHERE product_id = $1 ORDER BY position NULLS LAST, id"
        );
        let rows = sqlx::query_as::<_, ProductImageRow>(&sql)
            .bind(product_id.as_i64())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_order(
        &self,
        provider: Provider,
        upstream_id: UpstreamId,
    ) -> RepositoryResult<Option<OrderRecord>> {
        let sql = format!(
            r#"SELECT {ORDER_COLUMNS} FROM bridge."order" WHERE provider = $1 AND upstream_id = $2"#
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(provider.as_str())
            .bind(upstream_id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn insert_order(&self, data: &OrderData) -> RepositoryResult<OrderRecord> {
        let sql = format!(
            r#"
            INSERT INTO bridge."order" (
                provider, store_id, upstream_id, number, token, status, payment_status,
                shipping_status, currency, subtotal, discount, shipping_cost, total,
                customer_id, contact_name, contact_email, contact_phone,
                contact_identification, billing_address, shipping_address, line_items,
                upstream_created_at, upstream_updated_at, paid_at, cancelled_at, closed_at,
                synced_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, NOW())
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(data.provider.as_str())
            .bind(data.store_id.as_i64())
            .bind(data.upstream_id.as_i64())
            .bind(data.number)
            .bind(&data.token)
            .bind(&data.status)
            .bind(&data.payment_status)
            .bind(&data.shipping_status)
            .bind(&data.currency)
            .bind(&data.subtotal)
            .bind(&data.discount)
            .bind(&data.shipping_cost)
            .bind(&data.total)
            .bind(data.customer_id.map(|id| id.as_i64()))
            .bind(&data.contact_name)
            .bind(&data.contact_email)
            .bind(&data.contact_phone)
            .bind(&data.contact_identification)
            .bind(&data.billing_address)
            .bind(&data.shipping_address)
            .bind(Json(&data.line_items))
            .bind(&data.upstream_created_at)
            .bind(&data.upstream_updated_at)
            .bind(&data.paid_at)
            .bind(&data.cancelled_at)
            .bind(&data.closed_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_write_error(e, "order"))?;

        row.try_into()
    }

    async fn patch_order(&self, id: OrderId, data: &OrderData) -> RepositoryResult<OrderRecord> {
        let sql = format!(
            r#"
            UPDATE bridge."order"
            SET number = $2, token = $3, status = $4, payment_status = $5,
                shipping_status = $6, currency = $7, subtotal = $8, discount = $9,
                shipping_cost = $10, total = $11, customer_id = $12, contact_name = $13,
                contact_email = $14, contact_phone = $15, contact_identification = $16,
                billing_address = $17, shipping_address = $18, line_items = $19,
                upstream_created_at = $20, upstream_updated_at = $21, paid_at = $22,
                cancelled_at = $23, closed_at = $24, synced_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id.as_i64())
            .bind(data.number)
            .bind(&data.token)
            .bind(&data.status)
            .bind(&data.payment_status)
            .bind(&data.shipping_status)
            .bind(&data.currency)
            .bind(&data.subtotal)
            .bind(&data.discount)
            .bind(&data.shipping_cost)
            .bind(&data.total)
            .bind(data.customer_id.map(|id| id.as_i64()))
            .bind(&data.contact_name)
            .bind(&data.contact_email)
            .bind(&data.contact_phone)
            .bind(&data.contact_identification)
            .bind(&data.billing_address)
            .bind(&data.shipping_address)
            .bind(Json(&data.line_items))
            .bind(&data.upstream_created_at)
            .bind(&data.upstream_updated_at)
            .bind(&data.paid_at)
            .bind(&data.cancelled_at)
            .bind(&data.closed_at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    async fn delete_order(&self, id: OrderId) -> RepositoryResult<bool> {
        let result = sqlx::query(r#"DELETE FROM bridge."order" WHERE id = $1"#)
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_orders(&self, store_id: StoreId) -> RepositoryResult<Vec<OrderRecord>> {
        let sql = format!(
            r#"SELECT {ORDER_COLUMNS} FROM bridge."order" WHERE store_id = $1 ORDER BY id"#
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(store_id.as_i64())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_idempotency_record(
        &self,
        key: &str,
    ) -> RepositoryResult<Option<IdempotencyRecord>> {
        let row = sqlx::query_as::<_, IdempotencyRow>(
            r"
            SELECT idempotency_key, store_id, event, resource_id, payload, processed_at, status
            FROM bridge.webhook_idempotency
            WHERE idempotency_key = $1
            ",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn insert_idempotency_record(&self, record: &IdempotencyRecord) -> RepositoryResult<()> {
        sqlx::query(
            r"
            INSERT INTO bridge.webhook_idempotency (
                idempotency_key, store_id, event, resource_id, payload, processed_at, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(&record.key)
        .bind(record.store_id.as_i64())
        .bind(&record.event)
        .bind(record.resource_id.map(|id| id.as_i64()))
        .bind(&record.payload)
        .bind(record.processed_at)
        .bind(record.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "idempotency key"))?;

        Ok(())
    }

    async fn health_check(&self) -> RepositoryResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[async_trait]
impl CredentialProvider for PgRecordStore {
    async fn credentials(&self, store_id: StoreId) -> RepositoryResult<Option<StoreCredentials>> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r"
            SELECT store_id, access_token, store_name, main_language, main_currency
            FROM bridge.store_credential
            WHERE store_id = $1
            ",
        )
        .bind(store_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list_store_ids(&self) -> RepositoryResult<Vec<StoreId>> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT store_id FROM bridge.store_credential ORDER BY store_id")
                .fetch_all(&self.pool)
                .await?;

        Ok(ids.into_iter().map(StoreId::new).collect())
    }
}
