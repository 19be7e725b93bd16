//! Field normalization for raw Tiendanube payloads.
//!
//! Each function maps one family of loosely-typed upstream fields to a single
//! canonical type. Normalization is stable: feeding an already-normalized
//! value back through the same function returns it unchanged.

use std::str::FromStr;

use nube_bridge_core::UpstreamId;
use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;

/// A required field is missing or unusable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("missing or invalid id in field `{0}`")]
    InvalidId(&'static str),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),
}

/// Date-like field: strings are kept verbatim, structured values are
/// serialized to their JSON text, `null` stays absent.
#[must_use]
pub fn date_field(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(_) | Value::Array(_) => Some(value.to_string()),
    }
}

/// Monetary field as a decimal string.
///
/// Numbers are rendered with two decimal places; strings are trimmed and
/// otherwise left as the upstream formatted them.
#[must_use]
pub fn money_field(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .ok()
            .map(|d| format!("{:.2}", d.round_dp(2))),
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        _ => None,
    }
}

/// Identifier sent as a number or a numeric string.
#[must_use]
pub fn optional_id(value: &Value) -> Option<UpstreamId> {
    match value {
        Value::Number(n) => n.as_i64().map(UpstreamId::new),
        Value::String(s) => s.trim().parse::<i64>().ok().map(UpstreamId::new),
        _ => None,
    }
}

/// Like [`optional_id`] but the id must be present.
///
/// # Errors
///
/// Returns `NormalizeError::InvalidId` naming `field` when no id can be read.
pub fn required_id(value: &Value, field: &'static str) -> Result<UpstreamId, NormalizeError> {
    optional_id(value).ok_or(NormalizeError::InvalidId(field))
}

/// Integer sent as a number or a numeric string.
#[must_use]
pub fn integer_field(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Plain text field; empty strings count as absent.
#[must_use]
pub fn optional_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Multilingual field such as `{"es": "Remera", "pt": "Camiseta"}`.
///
/// Picks the requested language, falling back to the first non-empty
/// translation. Plain strings are returned as-is.
#[must_use]
pub fn localized(value: &Value, language: &str) -> Option<String> {
    match value {
        Value::Object(translations) => translations
            .get(language)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .or_else(|| {
                translations
                    .values()
                    .filter_map(Value::as_str)
                    .find(|s| !s.is_empty())
            })
            .map(str::to_string),
        other => optional_text(other),
    }
}

/// Boolean flag; accepts `true`/`false`, `"true"`/`"1"`, and numbers.
#[must_use]
pub fn bool_field(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.trim(), "true" | "1"),
        Value::Number(n) => n.as_i64().is_some_and(|i| i != 0),
        _ => false,
    }
}
