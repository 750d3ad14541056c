//! freshet library interface
//!
//! Exposes the polling pipeline and HTTP surface for integration testing.

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod types;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::services::poll_engine::PollEngine;
use crate::services::release_cache::ReleaseCache;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Poll cycle executor
    pub engine: Arc<PollEngine>,
    /// Release cache, exposed for the clear endpoint and health snapshot
    pub cache: Arc<ReleaseCache>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(engine: Arc<PollEngine>, cache: Arc<ReleaseCache>) -> Self {
        Self {
            engine,
            cache,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::release_routes())
        .merge(api::health_routes())
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
        .with_state(state)
}
