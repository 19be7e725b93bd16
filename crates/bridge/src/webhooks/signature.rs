//! Webhook signature verification.
//!
//! Tiendanube signs the raw body with HMAC-SHA256 keyed by the app's client
//! secret and sends the lowercase hex digest in a header.

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::TiendanubeConfig;

type HmacSha256 = Hmac<Sha256>;

/// Accepted signature headers, checked in order; the first non-empty wins.
pub const SIGNATURE_HEADERS: [&str; 2] =
    ["x-linkedstore-hmac-sha256", "http_x_linkedstore_hmac_sha256"];

/// Signature check failures. All map to `401 Unauthorized`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("webhook signature mismatch")]
    Mismatch,

    #[error("webhook is signed but no client secret is configured")]
    SecretNotConfigured,

    #[error("webhook signature header is required")]
    Missing,
}

/// Outcome of a successful signature check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    /// Header present and digest matched.
    Verified,
    /// No header sent and signatures are not required.
    Skipped,
}

/// Hex-encoded HMAC-SHA256 of `body` under `secret`.
#[must_use]
pub fn sign(body: &[u8], secret: &str) -> String {
    // HMAC accepts keys of any length.
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify `signature` against the HMAC of `body`.
#[must_use]
pub fn verify(body: &[u8], signature: &str, secret: &str) -> bool {
    let expected = sign(body, secret);
    !expected.is_empty() && constant_time_compare(&expected, signature.trim())
}

/// First non-empty signature header value.
#[must_use]
pub fn signature_header(headers: &HeaderMap) -> Option<&str> {
    SIGNATURE_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    })
}

/// Authenticate an inbound webhook request.
///
/// A missing header is allowed (and logged) unless
/// `config.require_signature` is set. A present header with no configured
/// secret fails closed.
///
/// # Errors
///
/// Returns `SignatureError` when the request must be rejected.
pub fn check_request(
    headers: &HeaderMap,
    body: &[u8],
    config: &TiendanubeConfig,
) -> Result<SignatureCheck, SignatureError> {
    let Some(signature) = signature_header(headers) else {
        if config.require_signature {
            return Err(SignatureError::Missing);
        }
        warn!("Webhook received without signature header, verification skipped");
        return Ok(SignatureCheck::Skipped);
    };

    let Some(secret) = &config.client_secret else {
        return Err(SignatureError::SecretNotConfigured);
    };

    if verify(body, signature, secret.expose_secret()) {
        debug!("Webhook signature verified");
        Ok(SignatureCheck::Verified)
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Constant-time string comparison to prevent timing attacks.
#[must_use]
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use axum::http::HeaderValue;
    use secrecy::SecretString;

    use super::*;

    const SECRET: &str = "test-client-secret";
    const BODY: &[u8] = br#"{"store_id":42,"event":"product/created","id":7}"#;

    fn config(secret: Option<&str>, require_signature: bool) -> TiendanubeConfig {
        TiendanubeConfig {
            api_base: "https://api.tiendanube.com/v1".to_string(),
            user_agent: "Nube Bridge (ops@pistachiohq.com)".to_string(),
            client_secret: secret.map(SecretString::from),
            timeout: Duration::from_secs(5),
            require_signature,
        }
    }

    fn headers(name: &'static str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(constant_time_compare("", ""));
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hell"));
    }

    #[test]
    fn test_verify_accepts_matching_digest() {
        let signature = sign(BODY, SECRET);
        assert_eq!(signature.len(), 64);
        assert!(verify(BODY, &signature, SECRET));
    }

    #[test]
    fn test_verify_rejects_any_changed_byte() {
        let signature = sign(BODY, SECRET);
        for i in 0..BODY.len() {
            let mut tampered = BODY.to_vec();
            tampered[i] ^= 0x01;
            assert!(!verify(&tampered, &signature, SECRET), "byte {i} not covered");
        }
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let signature = sign(BODY, "other-secret");
        assert!(!verify(BODY, &signature, SECRET));
    }

    #[test]
    fn test_missing_header_is_skipped_by_default() {
        let result = check_request(&HeaderMap::new(), BODY, &config(Some(SECRET), false));
        assert_eq!(result, Ok(SignatureCheck::Skipped));
    }

    #[test]
    fn test_missing_header_rejected_when_required() {
        let result = check_request(&HeaderMap::new(), BODY, &config(Some(SECRET), true));
        assert_eq!(result, Err(SignatureError::Missing));
    }

    #[test]
    fn test_present_header_without_secret_fails_closed() {
        let headers = headers(SIGNATURE_HEADERS[0], &sign(BODY, SECRET));
        let result = check_request(&headers, BODY, &config(None, false));
        assert_eq!(result, Err(SignatureError::SecretNotConfigured));
    }

    #[test]
    fn test_alternate_header_name_is_accepted() {
        let headers = headers(SIGNATURE_HEADERS[1], &sign(BODY, SECRET));
        let result = check_request(&headers, BODY, &config(Some(SECRET), false));
        assert_eq!(result, Ok(SignatureCheck::Verified));
    }

    #[test]
    fn test_empty_first_header_falls_through_to_second() {
        let mut headers = headers(SIGNATURE_HEADERS[0], "");
        headers.insert(
            SIGNATURE_HEADERS[1],
            HeaderValue::from_str(&sign(BODY, SECRET)).unwrap(),
        );
        assert_eq!(
            check_request(&headers, BODY, &config(Some(SECRET), false)),
            Ok(SignatureCheck::Verified)
        );
    }

    #[test]
    fn test_mismatch_is_rejected() {
        let headers = headers(SIGNATURE_HEADERS[0], &sign(b"other body", SECRET));
        let result = check_request(&headers, BODY, &config(Some(SECRET), false));
        assert_eq!(result, Err(SignatureError::Mismatch));
    }
}
