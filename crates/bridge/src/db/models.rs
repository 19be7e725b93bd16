//! Domain records persisted by the bridge.
//!
//! `*Data` structs hold the normalized attributes written on every
//! reconciliation; `*Record` structs add the local row id and sync time.

use chrono::{DateTime, Utc};
use nube_bridge_core::{
    LedgerStatus, OrderId, ProductId, ProductImageId, Provider, StoreId, UpstreamId,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Credentials
// =============================================================================

/// Cached store metadata stored alongside the API token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMetadata {
    /// Store display name in its main language.
    pub name: Option<String>,
    /// Main storefront language (e.g., "es", "pt"); used to pick product titles.
    pub main_language: String,
    /// Main currency code (e.g., "ARS", "BRL").
    pub main_currency: Option<String>,
}

impl Default for StoreMetadata {
    fn default() -> Self {
        Self {
            name: None,
            main_language: "es".to_string(),
            main_currency: None,
        }
    }
}

/// Decrypted API credentials for one store.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct StoreCredentials {
    /// Tiendanube store id.
    pub store_id: StoreId,
    /// API access token (redacted in debug output).
    pub access_token: SecretString,
    /// Cached store metadata.
    pub metadata: StoreMetadata,
}

impl std::fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreCredentials")
            .field("store_id", &self.store_id)
            .field("access_token", &"[REDACTED]")
            .field("metadata", &self.metadata)
            .finish()
    }
}

// =============================================================================
// Products
// =============================================================================

/// Normalized product attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductData {
    pub provider: Provider,
    pub store_id: StoreId,
    pub upstream_id: UpstreamId,
    /// Name in the store's main language.
    pub title: String,
    /// Multilingual name object as sent upstream.
    pub name: Value,
    pub description: Option<String>,
    pub handle: Option<String>,
    pub brand: Option<String>,
    pub tags: Option<String>,
    pub published: bool,
    pub free_shipping: bool,
    /// Price of the first variant, as a decimal string.
    pub price: Option<String>,
    /// Normalized variants array.
    pub variants: Value,
    pub upstream_created_at: Option<String>,
    pub upstream_updated_at: Option<String>,
}

/// A stored product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    #[serde(flatten)]
    pub data: ProductData,
    pub synced_at: DateTime<Utc>,
}

/// Normalized product image attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImageData {
    /// Local owning product.
    pub product_id: ProductId,
    pub upstream_id: UpstreamId,
    pub src: String,
    pub position: Option<i32>,
    pub alt: Option<String>,
    pub upstream_created_at: Option<String>,
    pub upstream_updated_at: Option<String>,
}

/// A stored product image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImageRecord {
    pub id: ProductImageId,
    #[serde(flatten)]
    pub data: ProductImageData,
    pub synced_at: DateTime<Utc>,
}

// =============================================================================
// Orders
// =============================================================================

/// Snapshot of an order line at order time (not a live product reference).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: Option<UpstreamId>,
    pub variant_id: Option<UpstreamId>,
    pub name: Option<String>,
    pub sku: Option<String>,
    pub price: Option<String>,
    pub quantity: i64,
}

/// Normalized order attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderData {
    pub provider: Provider,
    pub store_id: StoreId,
    pub upstream_id: UpstreamId,
    pub number: Option<i64>,
    pub token: Option<String>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub shipping_status: Option<String>,
    pub currency: Option<String>,
    pub subtotal: Option<String>,
    pub discount: Option<String>,
    pub shipping_cost: Option<String>,
    pub total: Option<String>,
    pub customer_id: Option<UpstreamId>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_identification: Option<String>,
    pub billing_address: Value,
    pub shipping_address: Value,
    pub line_items: Vec<LineItem>,
    pub upstream_created_at: Option<String>,
    pub upstream_updated_at: Option<String>,
    pub paid_at: Option<String>,
    pub cancelled_at: Option<String>,
    pub closed_at: Option<String>,
}

impl OrderData {
    /// Strip customer personal data from this order.
    pub fn redact_customer(&mut self) {
        self.contact_name = None;
        self.contact_email = None;
        self.contact_phone = None;
        self.contact_identification = None;
        self.billing_address = Value::Null;
        self.shipping_address = Value::Null;
    }
}

/// A stored order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    #[serde(flatten)]
    pub data: OrderData,
    pub synced_at: DateTime<Utc>,
}

// =============================================================================
// Idempotency ledger
// =============================================================================

/// Append-only audit entry for one processed notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdempotencyRecord {
    #[serde(rename = "idempotencyKey")]
    pub key: String,
    pub store_id: StoreId,
    pub event: String,
    pub resource_id: Option<UpstreamId>,
    /// Raw JSON body, kept for audit only.
    pub payload: String,
    pub processed_at: DateTime<Utc>,
    pub status: LedgerStatus,
}
