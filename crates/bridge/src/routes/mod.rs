//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness
//! GET  /health/ready           - Readiness (record store reachable)
//!
//! # Webhooks
//! POST /webhooks/tiendanube    - Receive a Tiendanube notification
//! GET  /webhooks/tiendanube    - Capability payload for health checks
//!
//! # Operator
//! POST /api/sync               - Run a bulk sync (bearer SYNC_API_TOKEN)
//! ```

pub mod health;
pub mod sync;
pub mod webhooks;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Build the application router with state applied.
///
/// Tracing and Sentry layers are added by the binary.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        // Webhooks
        .route(
            "/webhooks/tiendanube",
            post(webhooks::receive).get(webhooks::capabilities),
        )
        // Operator
        .route("/api/sync", post(sync::trigger))
        .with_state(state)
}
