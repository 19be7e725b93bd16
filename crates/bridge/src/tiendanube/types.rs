//! Raw Tiendanube REST payloads.
//!
//! Field types follow what the API actually sends rather than what it
//! documents: ids may arrive as numbers or strings, dates as strings or
//! serialized PHP `DateTime` objects, names as multilingual objects. Loose
//! fields are kept as [`serde_json::Value`] here and mapped to one canonical
//! type by [`crate::sync::normalize`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `GET /{store}/store`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawStore {
    pub id: Value,
    pub name: Value,
    pub main_language: Value,
    pub main_currency: Value,
    pub email: Value,
    pub original_domain: Value,
}

/// A product as returned by `GET /{store}/products/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawProduct {
    pub id: Value,
    pub name: Value,
    pub description: Value,
    pub handle: Value,
    pub brand: Value,
    pub tags: Value,
    pub published: Value,
    pub free_shipping: Value,
    pub variants: Vec<RawVariant>,
    pub images: Vec<RawImage>,
    pub created_at: Value,
    pub updated_at: Value,
}

/// A product variant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawVariant {
    pub id: Value,
    pub product_id: Value,
    pub position: Value,
    pub price: Value,
    pub compare_at_price: Value,
    pub promotional_price: Value,
    pub stock: Value,
    pub sku: Value,
    pub values: Value,
    pub created_at: Value,
    pub updated_at: Value,
}

/// A product image, embedded in products or from `GET /{store}/products/{id}/images`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawImage {
    pub id: Value,
    pub product_id: Value,
    pub src: Value,
    pub position: Value,
    pub alt: Value,
    pub created_at: Value,
    pub updated_at: Value,
}

/// An order as returned by `GET /{store}/orders/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawOrder {
    pub id: Value,
    pub number: Value,
    pub token: Value,
    pub status: Value,
    pub payment_status: Value,
    pub shipping_status: Value,
    pub currency: Value,
    pub subtotal: Value,
    pub discount: Value,
    pub shipping_cost_customer: Value,
    pub total: Value,
    pub customer: Value,
    pub contact_name: Value,
    pub contact_email: Value,
    pub contact_phone: Value,
    pub contact_identification: Value,
    pub billing_address: Value,
    pub shipping_address: Value,
    pub products: Vec<RawLineItem>,
    pub created_at: Value,
    pub updated_at: Value,
    pub paid_at: Value,
    pub cancelled_at: Value,
    pub closed_at: Value,
}

/// A line item inside an order (`products` array).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawLineItem {
    pub id: Value,
    pub product_id: Value,
    pub variant_id: Value,
    pub name: Value,
    pub sku: Value,
    pub price: Value,
    pub quantity: Value,
}

/// A registered webhook from `GET /{store}/webhooks`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawWebhook {
    pub id: Value,
    pub event: Value,
    pub url: Value,
    pub created_at: Value,
    pub updated_at: Value,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_product_tolerates_missing_and_odd_fields() {
        let product: RawProduct = serde_json::from_value(json!({
            "id": "1234",
            "name": {"es": "Remera", "pt": "Camiseta"},
            "created_at": {"date": "2024-01-01 10:00:00.000000", "timezone_type": 3, "timezone": "UTC"},
            "unexpected": true
        }))
        .unwrap();

        assert_eq!(product.id, json!("1234"));
        assert!(product.variants.is_empty());
        assert!(product.updated_at.is_null());
        assert!(product.created_at.is_object());
    }

    #[test]
    fn test_order_line_items_parse() {
        let order: RawOrder = serde_json::from_value(json!({
            "id": 99,
            "products": [{"product_id": 7, "variant_id": 70, "quantity": "2", "price": "10.00"}]
        }))
        .unwrap();

        assert_eq!(order.products.len(), 1);
        assert_eq!(order.products[0].quantity, json!("2"));
    }
}
