//! Health check endpoints.

use axum::extract::State;

use crate::error::AppError;
use crate::state::AppState;

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the record store is not reachable.
pub async fn readiness(State(state): State<AppState>) -> Result<&'static str, AppError> {
    state.store().health_check().await.map_err(|e| {
        AppError::Unavailable(format!("{} backend: {e}", state.store().backend_name()))
    })?;
    Ok("ok")
}
