//! Product and product image reconciliation.

use std::collections::HashSet;

use nube_bridge_core::{ProductId, Provider, StoreId, UpsertStatus, UpstreamId};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::db::{ProductData, ProductImageData, ProductRecord, RepositoryError, StoreCredentials};
use crate::tiendanube::{RawImage, RawProduct, RawVariant};

use super::normalize::{
    NormalizeError, bool_field, date_field, integer_field, localized, money_field, optional_id,
    optional_text, required_id,
};
use super::{ReconcileError, Reconciled, Reconciler};

/// Counts from reconciling one product's image collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageSyncStats {
    /// Images inserted or patched.
    pub upserted: usize,
    /// Local images no longer present upstream.
    pub removed: usize,
    /// Upstream images skipped because they could not be normalized.
    pub skipped: usize,
}

// =============================================================================
// Normalization
// =============================================================================

/// Map a raw product to its stored attributes.
///
/// `language` selects the title from the multilingual name.
///
/// # Errors
///
/// Returns `NormalizeError::InvalidId` if the product has no usable id.
pub fn normalize_product(
    store_id: StoreId,
    language: &str,
    raw: &RawProduct,
) -> Result<ProductData, NormalizeError> {
    let upstream_id = required_id(&raw.id, "id")?;

    Ok(ProductData {
        provider: Provider::Tiendanube,
        store_id,
        upstream_id,
        title: localized(&raw.name, language).unwrap_or_default(),
        name: raw.name.clone(),
        description: localized(&raw.description, language),
        handle: localized(&raw.handle, language),
        brand: optional_text(&raw.brand),
        tags: optional_text(&raw.tags),
        published: bool_field(&raw.published),
        free_shipping: bool_field(&raw.free_shipping),
        price: raw.variants.first().and_then(|v| money_field(&v.price)),
        variants: Value::Array(raw.variants.iter().map(normalize_variant).collect()),
        upstream_created_at: date_field(&raw.created_at),
        upstream_updated_at: date_field(&raw.updated_at),
    })
}

fn normalize_variant(raw: &RawVariant) -> Value {
    json!({
        "id": optional_id(&raw.id),
        "position": integer_field(&raw.position),
        "price": money_field(&raw.price),
        "compare_at_price": money_field(&raw.compare_at_price),
        "promotional_price": money_field(&raw.promotional_price),
        "stock": integer_field(&raw.stock),
        "sku": optional_text(&raw.sku),
        "values": raw.values,
        "created_at": date_field(&raw.created_at),
        "updated_at": date_field(&raw.updated_at),
    })
}

/// Map a raw image to its stored attributes under a local product.
///
/// `language` selects the alt text from its translations.
///
/// # Errors
///
/// Returns `NormalizeError` if the image has no id or no `src`.
pub fn normalize_image(
    product_id: ProductId,
    language: &str,
    raw: &RawImage,
) -> Result<ProductImageData, NormalizeError> {
    Ok(ProductImageData {
        product_id,
        upstream_id: required_id(&raw.id, "image.id")?,
        src: optional_text(&raw.src).ok_or(NormalizeError::MissingField("image.src"))?,
        position: integer_field(&raw.position).and_then(|p| i32::try_from(p).ok()),
        alt: localized(&raw.alt, language),
        upstream_created_at: date_field(&raw.created_at),
        upstream_updated_at: date_field(&raw.updated_at),
    })
}

// =============================================================================
// Reconciliation
// =============================================================================

impl Reconciler {
    /// Fetch a product from upstream and upsert it with its embedded images.
    ///
    /// Image failures are logged and do not fail the product.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileError` if credentials are missing, the fetch fails,
    /// or the product write fails. A fetch failure happens before any write.
    #[instrument(skip(self), fields(store_id = %store_id, product_id = %upstream_id))]
    pub async fn reconcile_product(
        &self,
        store_id: StoreId,
        upstream_id: UpstreamId,
    ) -> Result<Reconciled<ProductRecord>, ReconcileError> {
        let (credentials, api) = self.connect(store_id).await?;
        let raw = api.get_product(upstream_id).await?;

        let reconciled = self.upsert_product(&credentials, &raw).await?;

        match self
            .sync_images(&reconciled.entity, &credentials.metadata.main_language, &raw.images)
            .await
        {
            Ok(stats) => debug!(
                upserted = stats.upserted,
                removed = stats.removed,
                "Product images reconciled"
            ),
            Err(e) => warn!(error = %e, "Failed to reconcile product images"),
        }

        info!(status = ?reconciled.status, "Product reconciled");
        Ok(reconciled)
    }

    /// Normalize and upsert a product by `(provider, upstream_id)`.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileError::InvalidPayload` if the product has no id,
    /// `ReconcileError::Persistence` if the write fails.
    pub async fn upsert_product(
        &self,
        credentials: &StoreCredentials,
        raw: &RawProduct,
    ) -> Result<Reconciled<ProductRecord>, ReconcileError> {
        let data = normalize_product(
            credentials.store_id,
            &credentials.metadata.main_language,
            raw,
        )?;

        if let Some(existing) = self
            .store
            .find_product(data.provider, data.upstream_id)
            .await?
        {
            let entity = self.store.patch_product(existing.id, &data).await?;
            return Ok(Reconciled {
                status: UpsertStatus::Updated,
                entity,
            });
        }

        match self.store.insert_product(&data).await {
            Ok(entity) => Ok(Reconciled {
                status: UpsertStatus::Created,
                entity,
            }),
            // A concurrent delivery inserted it first; last write wins.
            Err(RepositoryError::Conflict(_)) => {
                let existing = self
                    .store
                    .find_product(data.provider, data.upstream_id)
                    .await?
                    .ok_or(RepositoryError::NotFound)?;
                let entity = self.store.patch_product(existing.id, &data).await?;
                Ok(Reconciled {
                    status: UpsertStatus::Updated,
                    entity,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Upsert a product's images and prune local images not in `images`.
    ///
    /// `language` is the store's main language.
    /// # Errors
    ///
    /// Returns `ReconcileError::Persistence` on the first failed write.
    pub async fn sync_images(
        &self,
        product: &ProductRecord,
        language: &str,
        images: &[RawImage],
    ) -> Result<ImageSyncStats, ReconcileError> {
        let mut stats = ImageSyncStats::default();
        let mut seen = HashSet::new();

        for raw in images {
            let data = match normalize_image(product.id, language, raw) {
                Ok(data) => data,
                Err(e) => {
                    warn!(product_id = %product.data.upstream_id, error = %e, "Skipping image");
                    stats.skipped += 1;
                    continue;
                }
            };
            seen.insert(data.upstream_id);

            match self
                .store
                .find_product_image(product.id, data.upstream_id)
                .await?
            {
                Some(existing) => {
                    self.store.patch_product_image(existing.id, &data).await?;
                }
                None => {
                    self.store.insert_product_image(&data).await?;
                }
            }
            stats.upserted += 1;
        }

        for local in self.store.list_product_images(product.id).await? {
            if !seen.contains(&local.data.upstream_id)
                && self.store.delete_product_image(local.id).await?
            {
                stats.removed += 1;
            }
        }

        Ok(stats)
    }

    /// Delete a product (and its images) by upstream id.
    ///
    /// A product that does not exist locally is not an error.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileError::Persistence` if the lookup or delete fails.
    #[instrument(skip(self), fields(store_id = %store_id, product_id = %upstream_id))]
    pub async fn delete_product(
        &self,
        store_id: StoreId,
        upstream_id: UpstreamId,
    ) -> Result<bool, ReconcileError> {
        let Some(existing) = self
            .store
            .find_product(Provider::Tiendanube, upstream_id)
            .await?
        else {
            debug!("Product not stored locally, nothing to delete");
            return Ok(false);
        };

        let deleted = self.store.delete_product(existing.id).await?;
        info!(deleted, "Product deleted");
        Ok(deleted)
    }

    /// Delete every product stored for a store.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileError::Persistence` on the first failed delete.
    #[instrument(skip(self), fields(store_id = %store_id))]
    pub async fn delete_store_products(&self, store_id: StoreId) -> Result<usize, ReconcileError> {
        let mut deleted = 0;
        for product in self.store.list_products(store_id).await? {
            if self.store.delete_product(product.id).await? {
                deleted += 1;
            }
        }
        info!(deleted, "Store products deleted");
        Ok(deleted)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn raw_product() -> RawProduct {
        serde_json::from_value(json!({
            "id": 7,
            "name": {"es": "Remera", "pt": "Camiseta"},
            "description": {"es": "<p>Algodón</p>"},
            "handle": {"es": "remera"},
            "published": true,
            "free_shipping": "0",
            "variants": [
                {"id": "70", "price": "1500.00", "stock": 3},
                {"id": 71, "price": 1600}
            ],
            "images": [{"id": 700, "src": "https://cdn.example.com/1.jpg", "position": 1}],
            "created_at": {"date": "2024-01-01 10:00:00.000000", "timezone": "UTC"},
            "updated_at": "2024-02-01T10:00:00+0000"
        }))
        .unwrap()
    }

    #[test]
    fn test_normalize_product_uses_main_language() {
        let data = normalize_product(StoreId::new(42), "pt", &raw_product()).unwrap();

        assert_eq!(data.upstream_id, UpstreamId::new(7));
        assert_eq!(data.title, "Camiseta");
        assert_eq!(data.handle.as_deref(), Some("remera"));
        assert!(data.published);
        assert!(!data.free_shipping);
        assert_eq!(data.price.as_deref(), Some("1500.00"));
    }

    #[test]
    fn test_normalize_product_coerces_variants() {
        let data = normalize_product(StoreId::new(42), "es", &raw_product()).unwrap();

        assert_eq!(data.variants[0]["id"], json!(70));
        assert_eq!(data.variants[1]["price"], json!("1600.00"));
        assert_eq!(data.variants[1]["stock"], Value::Null);
    }

    #[test]
    fn test_normalize_product_stringifies_structured_dates() {
        let data = normalize_product(StoreId::new(42), "es", &raw_product()).unwrap();

        let created = data.upstream_created_at.unwrap();
        assert!(created.contains("2024-01-01 10:00:00.000000"));
        assert_eq!(
            data.upstream_updated_at.as_deref(),
            Some("2024-02-01T10:00:00+0000")
        );
    }

    #[test]
    fn test_normalize_product_requires_id() {
        let raw = RawProduct::default();
        assert_eq!(
            normalize_product(StoreId::new(1), "es", &raw).unwrap_err(),
            NormalizeError::InvalidId("id")
        );
    }

    #[test]
    fn test_normalize_image_requires_src() {
        let raw: RawImage = serde_json::from_value(json!({"id": 1})).unwrap();
        assert_eq!(
            normalize_image(ProductId::new(1), "es", &raw).unwrap_err(),
            NormalizeError::MissingField("image.src")
        );
    }

    #[test]
    fn test_normalize_image_uses_store_language() {
        let raw: RawImage = serde_json::from_value(json!({
            "id": 5,
            "src": "https://cdn.example.com/5.jpg",
            "alt": {"es": "Remera roja", "pt": "Camiseta vermelha"}
        }))
        .unwrap();

        let data = normalize_image(ProductId::new(1), "pt", &raw).unwrap();
        assert_eq!(data.alt.as_deref(), Some("Camiseta vermelha"));
    }
}
