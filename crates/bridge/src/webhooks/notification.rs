//! Inbound notification envelope.

use nube_bridge_core::{StoreId, UpstreamId, WebhookEvent};
use serde_json::Value;
use thiserror::Error;

use crate::sync::normalize::optional_id;

/// Malformed notification body. Maps to `400 Bad Request`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid JSON body: {0}")]
    InvalidJson(String),

    #[error("body must be a JSON object")]
    NotAnObject,

    #[error("missing or invalid store_id")]
    MissingStoreId,

    #[error("missing or empty event")]
    MissingEvent,
}

/// A parsed webhook notification, consumed within one request.
#[derive(Debug, Clone)]
pub struct Notification {
    pub store_id: StoreId,
    pub event: WebhookEvent,
    /// Absent for store-level events.
    pub resource_id: Option<UpstreamId>,
    /// Parsed body, for privacy events that carry extra fields.
    pub payload: Value,
    /// Raw body text, stored in the ledger for audit.
    pub raw_body: String,
}

impl Notification {
    /// Parse and validate a raw request body.
    ///
    /// `store_id` and `id` may be numbers or numeric strings.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the body is not a JSON object or lacks
    /// `store_id` or `event`.
    pub fn parse(body: &[u8]) -> Result<Self, ValidationError> {
        let payload: Value =
            serde_json::from_slice(body).map_err(|e| ValidationError::InvalidJson(e.to_string()))?;
        if !payload.is_object() {
            return Err(ValidationError::NotAnObject);
        }

        let store_id = optional_id(&payload["store_id"])
            .map(|id| StoreId::new(id.as_i64()))
            .ok_or(ValidationError::MissingStoreId)?;

        let event = payload["event"]
            .as_str()
            .and_then(|topic| WebhookEvent::parse(topic).ok())
            .ok_or(ValidationError::MissingEvent)?;

        let resource_id = optional_id(&payload["id"]);

        Ok(Self {
            store_id,
            event,
            resource_id,
            payload,
            raw_body: String::from_utf8_lossy(body).into_owned(),
        })
    }
}
