//! Health check endpoint.

use crate::state::AppState;
use axum::{Json, extract::State};
use serde::Serialize;

/// Health response body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"healthy"` while the process serves requests.
    pub status: &'static str,
    /// Orders currently in the cache.
    pub cached_orders: usize,
}

/// Liveness plus cache size.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// { "status": "healthy", "cached_orders": 1000 }
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        cached_orders: state.cache.len(),
    })
}
