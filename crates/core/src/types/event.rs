//! Webhook event topics and their classification.
//!
//! Tiendanube names every notification with a `"<resource>/<action>"` topic,
//! e.g. `product/updated` or `customers/redact`. [`WebhookEvent`] keeps the
//! raw topic and [`EventKind`] is the routing decision derived from it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Topics that must be re-fetched on every delivery, even redeliveries.
const ALWAYS_REPROCESS: &[&str] = &["product/updated", "order/updated"];

/// Order actions that trigger a fresh fetch and upsert.
const ORDER_UPSERT_ACTIONS: &[&str] = &[
    "created",
    "updated",
    "paid",
    "packed",
    "fulfilled",
    "cancelled",
    "edited",
    "pending",
    "voided",
];

/// Errors raised when parsing an event topic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("event topic is empty")]
    Empty,
}

/// A namespaced webhook topic such as `product/created`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WebhookEvent(String);

/// Privacy and compliance events (LGPD).
///
/// These bypass the idempotency ledger: erasure is naturally idempotent and
/// must never be deduplicated away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyEvent {
    /// `store/redact` - erase all data held for a store.
    StoreRedact,
    /// `customers/redact` - erase a customer's personal data.
    CustomersRedact,
    /// `customers/data_request` - a customer asked for an export of their data.
    CustomersDataRequest,
}

/// What to do with an entity after a `product/*` or `order/*` notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityAction {
    /// Fetch the full record upstream and insert or patch it locally.
    Upsert,
    /// Remove the local record if it exists.
    Delete,
    /// Recognised namespace, unrecognised action. Logged and ignored.
    Unknown,
}

/// Routing decision for a verified notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Privacy(PrivacyEvent),
    Product(EntityAction),
    Order(EntityAction),
    /// Any other namespace (`category/*`, `app/*`, non-privacy `store/*`, ...).
    Unhandled,
}

impl WebhookEvent {
    /// Parse a topic string.
    ///
    /// # Errors
    ///
    /// Returns `EventError::Empty` if the topic is blank.
    pub fn parse(topic: &str) -> Result<Self, EventError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(EventError::Empty);
        }
        Ok(Self(topic.to_string()))
    }

    /// The full topic string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The namespace before the first `/` (the whole topic if there is none).
    #[must_use]
    pub fn resource(&self) -> &str {
        self.0.split_once('/').map_or(self.0.as_str(), |(r, _)| r)
    }

    /// The action after the first `/` (empty if there is none).
    #[must_use]
    pub fn action(&self) -> &str {
        self.0.split_once('/').map_or("", |(_, a)| a)
    }

    /// Whether this topic is exempt from deduplication.
    #[must_use]
    pub fn is_always_reprocess(&self) -> bool {
        ALWAYS_REPROCESS.contains(&self.0.as_str())
    }

    /// The privacy event this topic names, if any.
    #[must_use]
    pub fn privacy(&self) -> Option<PrivacyEvent> {
        match self.0.as_str() {
            "store/redact" => Some(PrivacyEvent::StoreRedact),
            "customers/redact" => Some(PrivacyEvent::CustomersRedact),
            "customers/data_request" => Some(PrivacyEvent::CustomersDataRequest),
            _ => None,
        }
    }

    /// Classify this topic into a routing decision.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        if let Some(privacy) = self.privacy() {
            return EventKind::Privacy(privacy);
        }

        let action = self.action();
        match self.resource() {
            "product" => EventKind::Product(match action {
                "created" | "updated" => EntityAction::Upsert,
                "deleted" => EntityAction::Delete,
                _ => EntityAction::Unknown,
            }),
            "order" => EventKind::Order(match action {
                "deleted" => EntityAction::Delete,
                a if ORDER_UPSERT_ACTIONS.contains(&a) => EntityAction::Upsert,
                _ => EntityAction::Unknown,
            }),
            _ => EventKind::Unhandled,
        }
    }
}

impl std::fmt::Display for WebhookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for WebhookEvent {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PrivacyEvent {
    /// The topic string for this event.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::StoreRedact => "store/redact",
            Self::CustomersRedact => "customers/redact",
            Self::CustomersDataRequest => "customers/data_request",
        }
    }
}
