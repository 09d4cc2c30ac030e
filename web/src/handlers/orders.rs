//! Order lookup endpoint.

use crate::WebResult;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Query, State},
};
use orderstream_core::model::Order;
use serde::Deserialize;
use std::sync::Arc;

/// Query string of `GET /order`.
#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    /// Order id to look up.
    pub id: Option<String>,
}

/// Look up one order in the cache.
///
/// # Endpoint
///
/// ```text
/// GET /order?id=b563feb7b2b84b6test
/// ```
///
/// # Errors
///
/// - 400 if `id` is missing or empty
/// - 404 if no order with that id is cached
#[allow(clippy::unused_async)]
pub async fn get_order(
    State(state): State<AppState>,
    Query(query): Query<OrderQuery>,
) -> WebResult<Json<Arc<Order>>> {
    let id = query
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::bad_request("Missing order ID"))?;

    state
        .cache
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::not_found("Order not found"))
}
