//! Router assembly.

use crate::handlers::{get_order, health_check};
use crate::state::AppState;
use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

/// Build the HTTP router.
///
/// ```text
/// GET /order?id=<order_uid>
/// GET /health
/// ```
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/order", get(get_order))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
