//! `reqwest` implementation of the Tiendanube REST API.

use std::sync::Arc;

use async_trait::async_trait;
use nube_bridge_core::{StoreId, UpstreamId};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

use crate::config::TiendanubeConfig;
use crate::db::StoreCredentials;

use super::{
    ApiConnector, Page, UpstreamApi, UpstreamError, UpstreamResult,
    types::{RawImage, RawOrder, RawProduct, RawStore, RawWebhook},
};

/// Header carrying the collection size on paginated endpoints.
const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// Tiendanube uses `Authentication`, not `Authorization`.
const AUTH_HEADER: &str = "Authentication";

/// Longest error body kept in `UpstreamError::Status`.
const MAX_ERROR_BODY: usize = 512;

/// Builds store-scoped [`TiendanubeClient`]s sharing one connection pool.
#[derive(Clone)]
pub struct TiendanubeConnector {
    http: reqwest::Client,
    api_base: Url,
}

impl TiendanubeConnector {
    /// Create a connector from configuration.
    ///
    /// The underlying `reqwest::Client` applies the configured timeout and
    /// User-Agent to every request.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError::Http` if the HTTP client cannot be built and
    /// `UpstreamError::InvalidBaseUrl` if `api_base` is not a URL.
    pub fn new(config: &TiendanubeConfig) -> Result<Self, UpstreamError> {
        let api_base = Url::parse(&config.api_base)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| UpstreamError::InvalidHeader(e.to_string()))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self { http, api_base })
    }
}

impl ApiConnector for TiendanubeConnector {
    fn connect(&self, credentials: &StoreCredentials) -> Arc<dyn UpstreamApi> {
        Arc::new(TiendanubeClient {
            http: self.http.clone(),
            api_base: self.api_base.clone(),
            store_id: credentials.store_id,
            access_token: credentials.access_token.clone(),
        })
    }
}

/// Tiendanube REST client bound to a single store.
///
/// Implements `Debug` manually to redact the access token.
pub struct TiendanubeClient {
    http: reqwest::Client,
    api_base: Url,
    store_id: StoreId,
    access_token: SecretString,
}

impl std::fmt::Debug for TiendanubeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiendanubeClient")
            .field("api_base", &self.api_base.as_str())
            .field("store_id", &self.store_id)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl TiendanubeClient {
    /// Build the URL for a store-scoped path such as `products/7`.
    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.api_base.as_str().trim_end_matches('/'),
            self.store_id,
            path
        )
    }

    /// Execute a GET request and return the successful response.
    async fn get(&self, path: &str, query: &[(&str, String)]) -> UpstreamResult<reqwest::Response> {
        let response = self
            .http
            .get(self.endpoint(path))
            .header(
                AUTH_HEADER,
                format!("bearer {}", self.access_token.expose_secret()),
            )
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();

        // Check for rate limiting
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(UpstreamError::RateLimited(retry_after));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status_code: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> UpstreamResult<T> {
        let response = self.get(path, &[]).await?;
        decode(response).await
    }

    /// Fetch one page of a collection endpoint.
    ///
    /// Tiendanube answers 404 for pages past the end; that is reported as an
    /// empty page rather than an error.
    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        page: u32,
        per_page: u32,
    ) -> UpstreamResult<Page<T>> {
        let query = [("page", page.to_string()), ("per_page", per_page.to_string())];
        let response = match self.get(path, &query).await {
            Ok(response) => response,
            Err(e) if e.is_not_found() && page > 1 => return Ok(Page::empty()),
            Err(e) => return Err(e),
        };

        let total_count = response
            .headers()
            .get(TOTAL_COUNT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok());

        let items = decode(response).await?;
        Ok(Page { items, total_count })
    }
}

#[async_trait]
impl UpstreamApi for TiendanubeClient {
    #[instrument(skip(self), fields(store_id = %self.store_id))]
    async fn get_store(&self) -> UpstreamResult<RawStore> {
        self.get_json("store").await
    }

    #[instrument(skip(self), fields(store_id = %self.store_id, product_id = %id))]
    async fn get_product(&self, id: UpstreamId) -> UpstreamResult<RawProduct> {
        self.get_json(&format!("products/{id}")).await
    }

    #[instrument(skip(self), fields(store_id = %self.store_id))]
    async fn list_products(&self, page: u32, per_page: u32) -> UpstreamResult<Page<RawProduct>> {
        self.get_page("products", page, per_page).await
    }

    #[instrument(skip(self), fields(store_id = %self.store_id, product_id = %product_id))]
    async fn list_product_images(&self, product_id: UpstreamId) -> UpstreamResult<Vec<RawImage>> {
        self.get_json(&format!("products/{product_id}/images")).await
    }

    #[instrument(skip(self), fields(store_id = %self.store_id, order_id = %id))]
    async fn get_order(&self, id: UpstreamId) -> UpstreamResult<RawOrder> {
        self.get_json(&format!("orders/{id}")).await
    }

    #[instrument(skip(self), fields(store_id = %self.store_id))]
    async fn list_orders(&self, page: u32, per_page: u32) -> UpstreamResult<Page<RawOrder>> {
        self.get_page("orders", page, per_page).await
    }

    #[instrument(skip(self), fields(store_id = %self.store_id))]
    async fn list_webhooks(&self) -> UpstreamResult<Vec<RawWebhook>> {
        self.get_json("webhooks").await
    }
}

/// Read a response body as JSON, keeping timeouts distinct from other failures.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> UpstreamResult<T> {
    let bytes = response.bytes().await.map_err(transport_error)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn transport_error(e: reqwest::Error) -> UpstreamError {
    if e.is_timeout() {
        UpstreamError::Timeout
    } else {
        UpstreamError::Http(e)
    }
}
