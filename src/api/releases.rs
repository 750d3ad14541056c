//! Release polling endpoints
//!
//! The host pipeline's result channel: each GET runs one poll cycle and
//! returns the current batch, served from cache whenever the cache is
//! still valid. The clear endpoint is the operator's reconfiguration
//! hook.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::info;

use crate::error::ApiResult;
use crate::types::ReleaseCandidate;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

/// GET /api/v1/releases
///
/// Run one poll cycle and return the ordered candidate batch. Always
/// 200; upstream trouble shows up as a shorter (possibly empty) list.
pub async fn get_releases(State(state): State<AppState>) -> ApiResult<Json<Vec<ReleaseCandidate>>> {
    let releases = state.engine.run_cycle().await;
    Ok(Json(releases))
}

/// POST /api/v1/cache/clear
///
/// Drop the cached batch so the next poll cycle fetches fresh data.
pub async fn clear_cache(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    state.cache.clear().await;
    info!("Cache cleared by operator request");
    Ok(Json(StatusResponse {
        status: "cleared".to_string(),
    }))
}

/// Build release polling routes
pub fn release_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/releases", get(get_releases))
        .route("/api/v1/cache/clear", post(clear_cache))
}
