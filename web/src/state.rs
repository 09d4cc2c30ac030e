//! Shared state for handlers.

use orderstream_projections::OrderCache;
use std::sync::Arc;

/// State shared by every handler: the order cache the pipeline writes to.
#[derive(Clone)]
pub struct AppState {
    /// Order lookup cache.
    pub cache: Arc<OrderCache>,
}

impl AppState {
    /// Wrap a shared cache.
    #[must_use]
    pub const fn new(cache: Arc<OrderCache>) -> Self {
        Self { cache }
    }
}
