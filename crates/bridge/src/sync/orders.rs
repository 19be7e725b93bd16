//! Order reconciliation and customer privacy actions.

use nube_bridge_core::{Provider, StoreId, UpsertStatus, UpstreamId};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::db::{LineItem, OrderData, OrderRecord, RepositoryError, StoreCredentials};
use crate::tiendanube::{RawLineItem, RawOrder};

use super::normalize::{
    NormalizeError, date_field, integer_field, money_field, optional_id, optional_text,
    required_id,
};
use super::{ReconcileError, Reconciled, Reconciler};

/// Local orders collected for a customer data request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerExport {
    pub store_id: StoreId,
    pub customer_id: Option<UpstreamId>,
    pub orders: Vec<OrderRecord>,
}

// =============================================================================
// Normalization
// =============================================================================

/// Map a raw order to its stored attributes.
///
/// Contact fields fall back to the embedded `customer` object when the
/// order-level copies are absent.
///
/// # Errors
///
/// Returns `NormalizeError::InvalidId` if the order has no usable id.
pub fn normalize_order(store_id: StoreId, raw: &RawOrder) -> Result<OrderData, NormalizeError> {
    let upstream_id = required_id(&raw.id, "id")?;
    let customer = |field: &str| raw.customer.get(field).unwrap_or(&Value::Null);

    Ok(OrderData {
        provider: Provider::Tiendanube,
        store_id,
        upstream_id,
        number: integer_field(&raw.number),
        token: optional_text(&raw.token),
        status: optional_text(&raw.status),
        payment_status: optional_text(&raw.payment_status),
        shipping_status: optional_text(&raw.shipping_status),
        currency: optional_text(&raw.currency),
        subtotal: money_field(&raw.subtotal),
        discount: money_field(&raw.discount),
        shipping_cost: money_field(&raw.shipping_cost_customer),
        total: money_field(&raw.total),
        customer_id: optional_id(customer("id")),
        contact_name: optional_text(&raw.contact_name).or_else(|| optional_text(customer("name"))),
        contact_email: optional_text(&raw.contact_email)
            .or_else(|| optional_text(customer("email"))),
        contact_phone: optional_text(&raw.contact_phone)
            .or_else(|| optional_text(customer("phone"))),
        contact_identification: optional_text(&raw.contact_identification)
            .or_else(|| optional_text(customer("identification"))),
        billing_address: raw.billing_address.clone(),
        shipping_address: raw.shipping_address.clone(),
        line_items: raw.products.iter().map(normalize_line_item).collect(),
        upstream_created_at: date_field(&raw.created_at),
        upstream_updated_at: date_field(&raw.updated_at),
        paid_at: date_field(&raw.paid_at),
        cancelled_at: date_field(&raw.cancelled_at),
        closed_at: date_field(&raw.closed_at),
    })
}

fn normalize_line_item(raw: &RawLineItem) -> LineItem {
    LineItem {
        product_id: optional_id(&raw.product_id),
        variant_id: optional_id(&raw.variant_id),
        name: optional_text(&raw.name),
        sku: optional_text(&raw.sku),
        price: money_field(&raw.price),
        quantity: integer_field(&raw.quantity).unwrap_or(0),
    }
}

// =============================================================================
// Reconciliation
// =============================================================================

impl Reconciler {
    /// Fetch an order from upstream and upsert it.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileError` if credentials are missing, the fetch fails,
    /// or the write fails. A fetch failure happens before any write.
    #[instrument(skip(self), fields(store_id = %store_id, order_id = %upstream_id))]
    pub async fn reconcile_order(
        &self,
        store_id: StoreId,
        upstream_id: UpstreamId,
    ) -> Result<Reconciled<OrderRecord>, ReconcileError> {
        let (credentials, api) = self.connect(store_id).await?;
        let raw = api.get_order(upstream_id).await?;

        let reconciled = self.upsert_order(&credentials, &raw).await?;
        info!(status = ?reconciled.status, "Order reconciled");
        Ok(reconciled)
    }

    /// Normalize and upsert an order by `(provider, upstream_id)`.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileError::InvalidPayload` if the order has no id,
    /// `ReconcileError::Persistence` if the write fails.
    pub async fn upsert_order(
        &self,
        credentials: &StoreCredentials,
        raw: &RawOrder,
    ) -> Result<Reconciled<OrderRecord>, ReconcileError> {
        let data = normalize_order(credentials.store_id, raw)?;

        if let Some(existing) = self.store.find_order(data.provider, data.upstream_id).await? {
            let entity = self.store.patch_order(existing.id, &data).await?;
            return Ok(Reconciled {
                status: UpsertStatus::Updated,
                entity,
            });
        }

        match self.store.insert_order(&data).await {
            Ok(entity) => Ok(Reconciled {
                status: UpsertStatus::Created,
                entity,
            }),
            // A concurrent delivery inserted it first; last write wins.
            Err(RepositoryError::Conflict(_)) => {
                let existing = self
                    .store
                    .find_order(data.provider, data.upstream_id)
                    .await?
                    .ok_or(RepositoryError::NotFound)?;
                let entity = self.store.patch_order(existing.id, &data).await?;
                Ok(Reconciled {
                    status: UpsertStatus::Updated,
                    entity,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete an order by upstream id. Missing orders are not an error.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileError::Persistence` if the lookup or delete fails.
    #[instrument(skip(self), fields(store_id = %store_id, order_id = %upstream_id))]
    pub async fn delete_order(
        &self,
        store_id: StoreId,
        upstream_id: UpstreamId,
    ) -> Result<bool, ReconcileError> {
        let Some(existing) = self
            .store
            .find_order(Provider::Tiendanube, upstream_id)
            .await?
        else {
            debug!("Order not stored locally, nothing to delete");
            return Ok(false);
        };

        let deleted = self.store.delete_order(existing.id).await?;
        info!(deleted, "Order deleted");
        Ok(deleted)
    }

    /// Orders of `store_id` that belong to a customer: listed explicitly in
    /// `order_ids` or carrying `customer_id`.
    async fn customer_orders(
        &self,
        store_id: StoreId,
        customer_id: Option<UpstreamId>,
        order_ids: &[UpstreamId],
    ) -> Result<Vec<OrderRecord>, ReconcileError> {
        Ok(self
            .store
            .list_orders(store_id)
            .await?
            .into_iter()
            .filter(|order| {
                order_ids.contains(&order.data.upstream_id)
                    || (customer_id.is_some() && order.data.customer_id == customer_id)
            })
            .collect())
    }

    /// Strip personal data from a customer's orders. Safe to re-run.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileError::Persistence` on the first failed write.
    #[instrument(skip(self, order_ids), fields(store_id = %store_id, orders = order_ids.len()))]
    pub async fn redact_customer(
        &self,
        store_id: StoreId,
        customer_id: Option<UpstreamId>,
        order_ids: &[UpstreamId],
    ) -> Result<usize, ReconcileError> {
        let orders = self.customer_orders(store_id, customer_id, order_ids).await?;
        let count = orders.len();

        for order in orders {
            let mut data = order.data;
            data.redact_customer();
            self.store.patch_order(order.id, &data).await?;
        }

        info!(redacted = count, "Customer data redacted");
        Ok(count)
    }

    /// Collect a customer's local orders for a data request.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileError::Persistence` if the orders cannot be read.
    #[instrument(skip(self, order_ids), fields(store_id = %store_id))]
    pub async fn export_customer(
        &self,
        store_id: StoreId,
        customer_id: Option<UpstreamId>,
        order_ids: &[UpstreamId],
    ) -> Result<CustomerExport, ReconcileError> {
        let orders = self.customer_orders(store_id, customer_id, order_ids).await?;
        Ok(CustomerExport {
            store_id,
            customer_id,
            orders,
        })
    }
}
