//! Bridge configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BRIDGE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `TIENDANUBE_USER_AGENT` - User-Agent sent upstream (app name + contact, required by Tiendanube)
//!
//! ## Optional
//! - `BRIDGE_HOST` - Bind address (default: 127.0.0.1)
//! - `BRIDGE_PORT` - Listen port (default: 3002)
//! - `TIENDANUBE_API_BASE` - REST API base URL (default: <https://api.tiendanube.com/v1>)
//! - `TIENDANUBE_CLIENT_SECRET` - App secret used to sign webhooks. When unset, any
//!   request carrying a signature header is rejected.
//! - `UPSTREAM_TIMEOUT_SECS` - Per-request upstream timeout (default: 15)
//! - `REQUIRE_WEBHOOK_SIGNATURE` - Reject unsigned webhooks instead of skipping
//!   verification (default: false)
//! - `SYNC_PAGE_SIZE` - Page size for bulk syncs (default: 200, max: 200)
//! - `SYNC_API_TOKEN` - Bearer token enabling `POST /api/sync`
//! - `SYNC_INTERVAL_SECS` - Enables scheduled syncs of every known store
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const DEFAULT_API_BASE: &str = "https://api.tiendanube.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 15;
const MAX_PAGE_SIZE: u32 = 200;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Bridge application configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Tiendanube API and webhook configuration
    pub tiendanube: TiendanubeConfig,
    /// Bulk sync configuration
    pub sync: SyncConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Tiendanube API configuration.
///
/// Implements `Debug` manually to redact the webhook signing secret.
#[derive(Clone)]
pub struct TiendanubeConfig {
    /// REST API base URL, without trailing slash
    pub api_base: String,
    /// User-Agent header sent on every request
    pub user_agent: String,
    /// App client secret used as the webhook HMAC key
    pub client_secret: Option<SecretString>,
    /// Per-request timeout for upstream calls
    pub timeout: Duration,
    /// Reject webhooks with no signature header
    pub require_signature: bool,
}

impl std::fmt::Debug for TiendanubeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiendanubeConfig")
            .field("api_base", &self.api_base)
            .field("user_agent", &self.user_agent)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout", &self.timeout)
            .field("require_signature", &self.require_signature)
            .finish()
    }
}

/// Bulk synchronization configuration.
///
/// Implements `Debug` manually to redact the operator token.
#[derive(Clone)]
pub struct SyncConfig {
    /// Records requested per upstream page
    pub page_size: u32,
    /// Bearer token for the operator sync route (route disabled when unset)
    pub api_token: Option<SecretString>,
    /// Interval for scheduled syncs (disabled when unset)
    pub interval: Option<Duration>,
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("page_size", &self.page_size)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("interval", &self.interval)
            .finish()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            api_token: None,
            interval: None,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("BRIDGE_DATABASE_URL")?;
        let host = get_env_or_default("BRIDGE_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("BRIDGE_HOST".to_string(), e.to_string()))?;
        let port = parse_env("BRIDGE_PORT", "3002")?;

        let tiendanube = TiendanubeConfig::from_env()?;
        let sync = SyncConfig::from_env()?;

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            database_url,
            host,
            port,
            tiendanube,
            sync,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl TiendanubeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let client_secret = get_optional_env("TIENDANUBE_CLIENT_SECRET").map(SecretString::from);

        let timeout_secs: u64 =
            parse_env("UPSTREAM_TIMEOUT_SECS", &DEFAULT_TIMEOUT_SECS.to_string())?;

        Ok(Self {
            api_base: get_env_or_default("TIENDANUBE_API_BASE", DEFAULT_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            user_agent: get_required_env("TIENDANUBE_USER_AGENT")?,
            client_secret,
            timeout: Duration::from_secs(timeout_secs),
            require_signature: parse_env("REQUIRE_WEBHOOK_SIGNATURE", "false")?,
        })
    }

    /// Why the configured client secret looks weak, if it does.
    ///
    /// App secrets are issued by Tiendanube, so a weak one is reported
    /// rather than rejected.
    #[must_use]
    pub fn weak_client_secret(&self) -> Option<ConfigError> {
        let secret = self.client_secret.as_ref()?;
        validate_secret_strength(secret.expose_secret(), "TIENDANUBE_CLIENT_SECRET").err()
    }
}

impl SyncConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let page_size: u32 = parse_env("SYNC_PAGE_SIZE", &MAX_PAGE_SIZE.to_string())?;
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidEnvVar(
                "SYNC_PAGE_SIZE".to_string(),
                format!("must be between 1 and {MAX_PAGE_SIZE}"),
            ));
        }

        let api_token = get_optional_env("SYNC_API_TOKEN")
            .map(|token| {
                validate_secret_strength(&token, "SYNC_API_TOKEN")?;
                Ok(SecretString::from(token))
            })
            .transpose()?;

        let interval = get_optional_env("SYNC_INTERVAL_SECS")
            .map(|raw| {
                raw.parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs)
                    .ok_or_else(|| {
                        ConfigError::InvalidEnvVar(
                            "SYNC_INTERVAL_SECS".to_string(),
                            "must be a positive integer".to_string(),
                        )
                    })
            })
            .transpose()?;

        Ok(Self {
            page_size,
            api_token,
            interval,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    // Try primary key first (e.g., BRIDGE_DATABASE_URL)
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    // Fallback to generic DATABASE_URL (set by Fly.io postgres attach)
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real secrets like API keys have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_sync_config_default_uses_max_page_size() {
        let config = SyncConfig::default();
        assert_eq!(config.page_size, 200);
        assert!(config.api_token.is_none());
        assert!(config.interval.is_none());
    }

    #[test]
    fn test_socket_addr() {
        let config = BridgeConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3002,
            tiendanube: TiendanubeConfig {
                api_base: DEFAULT_API_BASE.to_string(),
                user_agent: "Nube Bridge (ops@pistachiohq.com)".to_string(),
                client_secret: None,
                timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
                require_signature: false,
            },
            sync: SyncConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3002);
    }

    #[test]
    fn test_tiendanube_config_debug_redacts_secrets() {
        let config = TiendanubeConfig {
            api_base: DEFAULT_API_BASE.to_string(),
            user_agent: "Nube Bridge (ops@pistachiohq.com)".to_string(),
            client_secret: Some(SecretString::from("super_secret_client_secret")),
            timeout: Duration::from_secs(5),
            require_signature: true,
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("api.tiendanube.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_client_secret"));
    }

    #[test]
    fn test_weak_client_secret_is_reported() {
        let mut config = TiendanubeConfig {
            api_base: DEFAULT_API_BASE.to_string(),
            user_agent: "Nube Bridge (ops@pistachiohq.com)".to_string(),
            client_secret: None,
            timeout: Duration::from_secs(5),
            require_signature: false,
        };
        assert!(config.weak_client_secret().is_none());

        config.client_secret = Some(SecretString::from("changeme"));
        assert!(matches!(
            config.weak_client_secret(),
            Some(ConfigError::InsecureSecret(_, _))
        ));

        config.client_secret = Some(SecretString::from("k9Qv2LmX7rT4pZ8wYc3NbF6hJd1sGe5A"));
        assert!(config.weak_client_secret().is_none());
    }

    #[test]
    fn test_sync_config_debug_redacts_token() {
        let config = SyncConfig {
            page_size: 50,
            api_token: Some(SecretString::from("operator-token-value")),
            interval: None,
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("50"));
        assert!(!debug_output.contains("operator-token-value"));
    }
}
