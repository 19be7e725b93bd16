//! Integration tests for Nube Bridge.
//!
//! # Running Tests
//!
//! ```bash
//! # Router and synchronizer tests (in-memory store, fake Tiendanube API)
//! cargo test -p nube-bridge-integration-tests
//!
//! # Smoke test against a running server
//! BRIDGE_URL=http://127.0.0.1:3002 cargo test -p nube-bridge-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `webhooks` - Webhook pipeline through the HTTP router
//! - `bulk_sync` - Bulk synchronizer and the operator sync route
//! - `smoke` - Live server checks (ignored by default)
