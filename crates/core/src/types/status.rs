//! Status enums for various entities.

use serde::{Deserialize, Serialize};

/// Upstream e-commerce provider a record came from.
///
/// Part of every domain record's natural key `(provider, upstream_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    #[default]
    Tiendanube,
}

impl Provider {
    /// Stable string form used in storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tiendanube => "tiendanube",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tiendanube" => Ok(Self::Tiendanube),
            _ => Err(format!("invalid provider: {s}")),
        }
    }
}

/// Outcome recorded in the idempotency ledger for a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    /// Dispatched to a reconciler.
    Processed,
    /// No reconciler for this topic; acknowledged and audited only.
    Unhandled,
}

impl LedgerStatus {
    /// Stable string form used in storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Unhandled => "unhandled",
        }
    }
}

impl std::fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LedgerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processed" => Ok(Self::Processed),
            "unhandled" => Ok(Self::Unhandled),
            _ => Err(format!("invalid ledger status: {s}")),
        }
    }
}

/// Whether a reconciliation created a new local record or patched one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertStatus {
    Created,
    Updated,
}

/// Terminal state of a bulk sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// All phases ran; individual records may still have failed.
    Completed,
    /// A page fetch, credential lookup, or sweep step aborted the run.
    Failed,
}

/// Collection a bulk sync run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncResource {
    Products,
    Orders,
}

impl std::fmt::Display for SyncResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Products => write!(f, "products"),
            Self::Orders => write!(f, "orders"),
        }
    }
}
