//! Operator-triggered bulk sync.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, header::AUTHORIZATION},
};
use nube_bridge_core::StoreId;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::state::AppState;
use crate::sync::SyncReport;
use crate::webhooks::signature::constant_time_compare;

/// Which collections to sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncTarget {
    Products,
    Orders,
    #[default]
    All,
}

/// `POST /api/sync` body.
#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    pub store_id: StoreId,
    #[serde(default)]
    pub resource: SyncTarget,
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(expected) = &state.config().sync.api_token else {
        return Err(AppError::NotFound("sync API is disabled".to_string()));
    };

    let provided = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default();

    if provided.is_empty() || !constant_time_compare(provided, expected.expose_secret()) {
        return Err(AppError::Unauthorized("invalid sync token".to_string()));
    }
    Ok(())
}

/// Run a bulk sync and return its report(s).
#[instrument(skip_all)]
pub async fn trigger(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    authorize(&state, &headers)?;

    let request: SyncRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid sync request: {e}")))?;
    info!(store_id = %request.store_id, resource = ?request.resource, "Sync requested");

    let synchronizer = state.synchronizer().clone();
    let reports: Vec<SyncReport> = tokio::spawn(async move {
        let mut reports = Vec::new();
        if matches!(request.resource, SyncTarget::Products | SyncTarget::All) {
            reports.push(synchronizer.sync_products(request.store_id).await);
        }
        if matches!(request.resource, SyncTarget::Orders | SyncTarget::All) {
            reports.push(synchronizer.sync_orders(request.store_id).await);
        }
        reports
    })
    .await
    .map_err(|e| AppError::Internal(format!("sync task failed: {e}")))?;

    let success = reports.iter().all(SyncReport::is_completed);
    Ok(Json(json!({"success": success, "reports": reports})))
}
