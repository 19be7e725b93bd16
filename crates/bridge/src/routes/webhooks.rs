//! Tiendanube webhook receiver.

use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use serde_json::{Value, json};
use tracing::instrument;

use crate::error::AppError;
use crate::state::AppState;

/// Receive one notification and acknowledge it.
///
/// The pipeline runs on its own task so a client disconnect cannot abort a
/// reconciliation whose ledger record is already written.
#[instrument(skip_all)]
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let pipeline = state.pipeline().clone();

    let outcome = tokio::spawn(async move { pipeline.handle(&headers, &body).await })
        .await
        .map_err(|e| AppError::Internal(format!("webhook task failed: {e}")))??;

    Ok(Json(outcome.response_body()))
}

/// Static capability payload.
pub async fn capabilities(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "provider": "tiendanube",
        "events": [
            "product/created",
            "product/updated",
            "product/deleted",
            "order/*",
            "store/redact",
            "customers/redact",
            "customers/data_request"
        ],
        "signatureRequired": state.config().tiendanube.require_signature,
    }))
}
