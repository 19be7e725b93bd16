//! Shared fixtures: a scripted Tiendanube API and an in-memory bridge.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, header::CONTENT_TYPE},
};
use nube_bridge::config::{BridgeConfig, SyncConfig, TiendanubeConfig};
use nube_bridge::db::{
    CredentialProvider, MemoryStore, RecordStore, StoreCredentials, StoreMetadata,
};
use nube_bridge::routes::build_router;
use nube_bridge::state::AppState;
use nube_bridge::tiendanube::{
    ApiConnector, Page, RawImage, RawOrder, RawProduct, RawStore, RawVariant, RawWebhook,
    UpstreamApi, UpstreamError, UpstreamResult,
};
use nube_bridge::webhooks::signature::sign;
use nube_bridge_core::{StoreId, UpstreamId};
use secrecy::SecretString;
use serde_json::{Value, json};

pub const SECRET: &str = "k9Qv2LmX7rT4pZ8wYc3NbF6hJd1sGe5A";
pub const SIGNATURE_HEADER: &str = "x-linkedstore-hmac-sha256";
pub const STORE_ID: i64 = 42;

// =============================================================================
// Fake Tiendanube API
// =============================================================================

/// Scripted upstream collections with call counters.
#[derive(Default)]
pub struct FakeApi {
    products: Mutex<Vec<RawProduct>>,
    orders: Mutex<Vec<RawOrder>>,
    pub product_fetches: AtomicUsize,
    pub order_fetches: AtomicUsize,
    pub listing_fails: AtomicBool,
    pub images_fail: AtomicBool,
}

impl FakeApi {
    pub fn set_products(&self, products: Vec<RawProduct>) {
        *self.products.lock().unwrap() = products;
    }

    pub fn set_orders(&self, orders: Vec<RawOrder>) {
        *self.orders.lock().unwrap() = orders;
    }

    pub fn product_fetches(&self) -> usize {
        self.product_fetches.load(Ordering::SeqCst)
    }

    pub fn order_fetches(&self) -> usize {
        self.order_fetches.load(Ordering::SeqCst)
    }
}

fn not_found() -> UpstreamError {
    UpstreamError::Status {
        status_code: 404,
        body: r#"{"code":404,"message":"Not Found"}"#.to_string(),
    }
}

fn page_of<T: Clone>(items: &[T], page: u32, per_page: u32) -> Page<T> {
    let start = (page.saturating_sub(1) * per_page) as usize;
    let items: Vec<T> = items
        .iter()
        .skip(start)
        .take(per_page as usize)
        .cloned()
        .collect();
    Page {
        items,
        total_count: None,
    }
}

fn matches_id(value: &Value, id: UpstreamId) -> bool {
    value.as_i64() == Some(id.as_i64())
}

#[async_trait]
impl UpstreamApi for FakeApi {
    async fn get_store(&self) -> UpstreamResult<RawStore> {
        Ok(RawStore {
            id: json!(STORE_ID),
            name: json!({"es": "Tienda Demo"}),
            main_language: json!("es"),
            main_currency: json!("ARS"),
            ..Default::default()
        })
    }

    async fn get_product(&self, id: UpstreamId) -> UpstreamResult<RawProduct> {
        self.product_fetches.fetch_add(1, Ordering::SeqCst);
        self.products
            .lock()
            .unwrap()
            .iter()
            .find(|p| matches_id(&p.id, id))
            .cloned()
            .ok_or_else(not_found)
    }

    async fn list_products(&self, page: u32, per_page: u32) -> UpstreamResult<Page<RawProduct>> {
        if self.listing_fails.load(Ordering::SeqCst) {
            return Err(UpstreamError::Timeout);
        }
        let products = self.products.lock().unwrap();
        let mut listed = page_of(&products, page, per_page);
        listed.total_count = Some(products.len() as u64);
        Ok(listed)
    }

    async fn list_product_images(&self, product_id: UpstreamId) -> UpstreamResult<Vec<RawImage>> {
        if self.images_fail.load(Ordering::SeqCst) {
            return Err(UpstreamError::Status {
                status_code: 500,
                body: "images unavailable".to_string(),
            });
        }
        self.products
            .lock()
            .unwrap()
            .iter()
            .find(|p| matches_id(&p.id, product_id))
            .map(|p| p.images.clone())
            .ok_or_else(not_found)
    }

    async fn get_order(&self, id: UpstreamId) -> UpstreamResult<RawOrder> {
        self.order_fetches.fetch_add(1, Ordering::SeqCst);
        self.orders
            .lock()
            .unwrap()
            .iter()
            .find(|o| matches_id(&o.id, id))
            .cloned()
            .ok_or_else(not_found)
    }

    async fn list_orders(&self, page: u32, per_page: u32) -> UpstreamResult<Page<RawOrder>> {
        if self.listing_fails.load(Ordering::SeqCst) {
            return Err(UpstreamError::Timeout);
        }
        let orders = self.orders.lock().unwrap();
        let mut listed = page_of(&orders, page, per_page);
        listed.total_count = Some(orders.len() as u64);
        Ok(listed)
    }

    async fn list_webhooks(&self) -> UpstreamResult<Vec<RawWebhook>> {
        Ok(Vec::new())
    }
}

/// Hands out the same [`FakeApi`] for every store.
pub struct FakeConnector(pub Arc<FakeApi>);

impl ApiConnector for FakeConnector {
    fn connect(&self, _credentials: &StoreCredentials) -> Arc<dyn UpstreamApi> {
        Arc::clone(&self.0) as Arc<dyn UpstreamApi>
    }
}

// =============================================================================
// Upstream payload builders
// =============================================================================

/// A product with one variant and one image (id `id * 100`).
pub fn product(id: i64, name: &str) -> RawProduct {
    RawProduct {
        id: json!(id),
        name: json!({"es": name, "pt": format!("{name} (pt)")}),
        handle: json!({"es": name.to_lowercase().replace(' ', "-")}),
        published: json!(true),
        variants: vec![RawVariant {
            id: json!(id * 10),
            price: json!("1500.00"),
            stock: json!(3),
            ..Default::default()
        }],
        images: vec![image(id * 100, 1)],
        created_at: json!("2024-03-01T12:00:00+0000"),
        updated_at: json!("2024-03-02T12:00:00+0000"),
        ..Default::default()
    }
}

pub fn image(id: i64, position: i64) -> RawImage {
    RawImage {
        id: json!(id),
        src: json!(format!("https://cdn.example.com/{id}.jpg")),
        position: json!(position),
        ..Default::default()
    }
}

/// An order placed by `customer_id`.
pub fn order(id: i64, customer_id: i64) -> RawOrder {
    RawOrder {
        id: json!(id),
        number: json!(1000 + id),
        status: json!("open"),
        payment_status: json!("paid"),
        currency: json!("ARS"),
        total: json!("1500.00"),
        customer: json!({
            "id": customer_id,
            "name": "Ana Souza",
            "email": "ana@example.com",
            "phone": "+5491100000000"
        }),
        contact_email: json!("ana@example.com"),
        billing_address: json!({"address": "Av. Siempreviva 742"}),
        shipping_address: json!({"address": "Av. Siempreviva 742"}),
        created_at: json!("2024-03-01T12:00:00+0000"),
        ..Default::default()
    }
}

// =============================================================================
// Bridge harness
// =============================================================================

pub fn config() -> BridgeConfig {
    BridgeConfig {
        database_url: SecretString::from("postgres://unused/test"),
        host: "127.0.0.1".parse().unwrap(),
        port: 3002,
        tiendanube: TiendanubeConfig {
            api_base: "http://upstream.invalid/v1".to_string(),
            user_agent: "Nube Bridge tests (ops@example.com)".to_string(),
            client_secret: Some(SecretString::from(SECRET)),
            timeout: Duration::from_secs(5),
            require_signature: false,
        },
        sync: SyncConfig::default(),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 0.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// An in-memory bridge with credentials for [`STORE_ID`].
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub api: Arc<FakeApi>,
    pub state: AppState,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(config()).await
    }

    pub async fn with_config(config: BridgeConfig) -> Self {
        Self::with_records(config, |store| store as Arc<dyn RecordStore>).await
    }

    /// Like [`Harness::with_config`], but the pipeline writes through the
    /// record store returned by `wrap`.
    pub async fn with_records(
        config: BridgeConfig,
        wrap: impl FnOnce(Arc<MemoryStore>) -> Arc<dyn RecordStore>,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_credentials(StoreCredentials {
                store_id: StoreId::new(STORE_ID),
                access_token: SecretString::from("store-access-token"),
                metadata: StoreMetadata::default(),
            })
            .await;
        let api = Arc::new(FakeApi::default());

        let records = wrap(Arc::clone(&store));
        let credentials = Arc::clone(&store) as Arc<dyn CredentialProvider>;
        let state = AppState::new(
            config,
            records,
            credentials,
            Arc::new(FakeConnector(Arc::clone(&api))),
        );

        Self { store, api, state }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }
}

// =============================================================================
// Requests
// =============================================================================

/// A webhook POST signed with [`SECRET`].
pub fn signed_webhook(body: &Value) -> Request<Body> {
    let bytes = serde_json::to_vec(body).unwrap();
    let signature = sign(&bytes, SECRET);
    Request::builder()
        .method("POST")
        .uri("/webhooks/tiendanube")
        .header(CONTENT_TYPE, "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(bytes))
        .unwrap()
}

/// A webhook POST with no signature header.
pub fn unsigned_webhook(body: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhooks/tiendanube")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_vec()))
        .unwrap()
}

pub async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}
