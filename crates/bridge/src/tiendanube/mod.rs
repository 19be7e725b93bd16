//! Tiendanube REST API client.
//!
//! # Architecture
//!
//! - [`UpstreamApi`] is the store-scoped API surface the reconcilers consume.
//! - [`ApiConnector`] builds an [`UpstreamApi`] from a store's credentials, so
//!   every reconciliation or sync run gets its own explicit client value and
//!   tests can substitute a fake.
//! - [`TiendanubeConnector`] / [`TiendanubeClient`] are the `reqwest` implementations.
//!
//! # Example
//!
//! ```rust,ignore
//! use nube_bridge::tiendanube::{ApiConnector, TiendanubeConnector};
//!
//! let connector = TiendanubeConnector::new(&config.tiendanube)?;
//! let api = connector.connect(&credentials);
//!
//! let product = api.get_product(UpstreamId::new(7)).await?;
//! let page = api.list_orders(1, 200).await?;
//! ```

mod client;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use nube_bridge_core::UpstreamId;
use thiserror::Error;

use crate::db::StoreCredentials;

pub use client::{TiendanubeClient, TiendanubeConnector};
pub use types::{RawImage, RawLineItem, RawOrder, RawProduct, RawStore, RawVariant, RawWebhook};

/// Errors that can occur when calling the Tiendanube API.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// HTTP transport failed (connection, TLS, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The request did not complete within the configured timeout.
    #[error("upstream request timed out")]
    Timeout,

    /// Non-2xx response.
    #[error("upstream returned {status_code}: {body}")]
    Status {
        /// HTTP status code.
        status_code: u16,
        /// Response body (truncated).
        body: String,
    },

    /// Rate limited by Tiendanube.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Configured API base is not a valid URL.
    #[error("invalid API base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    /// Configured header value cannot be sent.
    #[error("invalid header value: {0}")]
    InvalidHeader(String),
}

impl UpstreamError {
    /// The HTTP status code behind this error, if any.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status_code, .. } => Some(*status_code),
            Self::RateLimited(_) => Some(429),
            _ => None,
        }
    }

    /// Whether the upstream said the resource does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.status_code(), Some(404))
    }
}

/// Result alias for upstream calls.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// One page of a paginated collection.
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// Records on this page.
    pub items: Vec<T>,
    /// Value of the `x-total-count` header, when sent.
    pub total_count: Option<u64>,
}

impl<T> Page<T> {
    /// An empty page, used when a page past the end is requested.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_count: None,
        }
    }
}

/// Store-scoped Tiendanube API surface.
#[async_trait]
pub trait UpstreamApi: Send + Sync {
    /// `GET /{store}/store`
    async fn get_store(&self) -> UpstreamResult<RawStore>;

    /// `GET /{store}/products/{id}`
    async fn get_product(&self, id: UpstreamId) -> UpstreamResult<RawProduct>;

    /// `GET /{store}/products?page=&per_page=`
    async fn list_products(&self, page: u32, per_page: u32) -> UpstreamResult<Page<RawProduct>>;

    /// `GET /{store}/products/{id}/images`
    async fn list_product_images(&self, product_id: UpstreamId) -> UpstreamResult<Vec<RawImage>>;

    /// `GET /{store}/orders/{id}`
    async fn get_order(&self, id: UpstreamId) -> UpstreamResult<RawOrder>;

    /// `GET /{store}/orders?page=&per_page=`
    async fn list_orders(&self, page: u32, per_page: u32) -> UpstreamResult<Page<RawOrder>>;

    /// `GET /{store}/webhooks`
    async fn list_webhooks(&self) -> UpstreamResult<Vec<RawWebhook>>;
}

/// Builds a store-scoped [`UpstreamApi`] from stored credentials.
pub trait ApiConnector: Send + Sync {
    /// Create a client bound to one store's token.
    fn connect(&self, credentials: &StoreCredentials) -> Arc<dyn UpstreamApi>;
}
