//! Concurrent in-memory index of orders by `order_uid`.

use orderstream_core::model::Order;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Order lookup cache shared between the ingestion pipeline and request
/// handlers.
///
/// Reads take the shared lock, writes the exclusive one, and each critical
/// section is a single map operation. Entries are `Arc<Order>`, so a reader
/// sees either the old aggregate or the new one, never a mix.
///
/// Construct one at startup and share it as `Arc<OrderCache>`. The cache is
/// unbounded and has no eviction.
///
/// # Example
///
/// ```
/// use orderstream_projections::OrderCache;
/// use orderstream_core::Order;
///
/// let cache = OrderCache::new();
/// cache.set(Order { order_uid: "order_abc".to_string(), ..Order::default() });
/// assert!(cache.get("order_abc").is_some());
/// assert!(cache.get("order_xyz").is_none());
/// ```
#[derive(Debug, Default)]
pub struct OrderCache {
    orders: RwLock<HashMap<String, Arc<Order>>>,
}

impl OrderCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an order.
    #[must_use]
    pub fn get(&self, order_uid: &str) -> Option<Arc<Order>> {
        self.orders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(order_uid)
            .cloned()
    }

    /// Insert or replace the entry for `order.order_uid`.
    pub fn set(&self, order: Order) {
        let key = order.order_uid.clone();
        let order = Arc::new(order);
        self.orders
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, order);
    }

    /// Insert many orders under one write lock. Later entries win on repeated ids.
    ///
    /// Returns the number of entries in the cache afterwards.
    pub fn load_many(&self, orders: impl IntoIterator<Item = Order>) -> usize {
        let entries: Vec<(String, Arc<Order>)> = orders
            .into_iter()
            .map(|order| (order.order_uid.clone(), Arc::new(order)))
            .collect();

        let mut map = self.orders.write().unwrap_or_else(PoisonError::into_inner);
        map.reserve(entries.len());
        map.extend(entries);
        map.len()
    }

    /// Number of cached orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
