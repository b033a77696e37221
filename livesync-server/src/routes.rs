//! HTTP endpoint handlers
//!
//! Thin shells over [`SyncService`]: decode the request, delegate, map
//! the result onto the wire contract.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use livesync_core::cmsd::CMSD_DYNAMIC_HEADER;
use livesync_core::{SyncError, SyncService};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Build the router over a shared service instance.
pub fn router(service: Arc<SyncService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sync", get(sync))
        .route("/update-latency", post(update_latency))
        .route("/get-latency", get(get_latency))
        .route("/player-data", get(player_data))
        .route("/clear-player-data", get(clear_player_data))
        .with_state(service)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Query parameters accepted by `/sync`.
#[derive(Debug, Deserialize)]
struct SyncQuery {
    #[serde(rename = "CMCD")]
    cmcd: Option<String>,
}

async fn sync(
    State(service): State<Arc<SyncService>>,
    Query(query): Query<SyncQuery>,
) -> Response {
    match service.handle_sync(query.cmcd.as_deref()) {
        Ok(header) => (StatusCode::OK, [(CMSD_DYNAMIC_HEADER, header)]).into_response(),
        Err(err) => error_response(StatusCode::BAD_REQUEST, &err),
    }
}

/// Request body for `/update-latency`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateLatencyRequest {
    latency_target: Option<f64>,
    latency_targets: Option<Vec<f64>>,
    disable_clock_sync: Option<bool>,
}

/// Target state as reported by the latency endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LatencyState {
    latency: f64,
    latency_targets: Vec<f64>,
    clock_sync_enabled: bool,
}

impl From<livesync_core::SyncTarget> for LatencyState {
    fn from(target: livesync_core::SyncTarget) -> Self {
        Self {
            latency: target.target_latency_secs,
            latency_targets: target.latency_targets,
            clock_sync_enabled: target.clock_sync_enabled,
        }
    }
}

async fn update_latency(
    State(service): State<Arc<SyncService>>,
    Json(body): Json<UpdateLatencyRequest>,
) -> Response {
    let (Some(latency), Some(targets)) = (body.latency_target, body.latency_targets) else {
        return error_response(StatusCode::BAD_REQUEST, &SyncError::MissingTargetFields);
    };

    let updated = service.update_target(latency, targets, body.disable_clock_sync);
    Json(json!({
        "message": "latencyTarget and latencyTargets updated",
        "latency": updated.target_latency_secs,
        "latencyTargets": updated.latency_targets,
        "clockSyncEnabled": updated.clock_sync_enabled,
    }))
    .into_response()
}

async fn get_latency(State(service): State<Arc<SyncService>>) -> Json<LatencyState> {
    Json(LatencyState::from(service.current_target()))
}

async fn player_data(State(service): State<Arc<SyncService>>) -> Response {
    Json(service.player_data()).into_response()
}

async fn clear_player_data(State(service): State<Arc<SyncService>>) -> StatusCode {
    service.clear_player_data();
    StatusCode::OK
}

fn error_response(status: StatusCode, err: &SyncError) -> Response {
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}
