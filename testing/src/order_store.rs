#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use orderstream_core::model::Order;
use orderstream_core::order_store::{OrderStore, OrderStoreError};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// In-memory order store for fast, deterministic tests.
///
/// Behaves like the Postgres store where it matters to callers: a second save
/// of the same `order_uid` fails with [`OrderStoreError::DuplicateOrder`] and
/// leaves the first in place, and `load_all` returns orders sorted by id.
///
/// # Example
///
/// ```
/// use orderstream_core::OrderStore;
/// use orderstream_testing::{InMemoryOrderStore, fixtures::valid_order};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryOrderStore::new();
/// store.save(&valid_order("order_abc")).await?;
/// assert_eq!(store.save_calls(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<BTreeMap<String, Order>>>,
    save_calls: Arc<AtomicUsize>,
    failure: Arc<Mutex<Option<OrderStoreError>>>,
}

impl InMemoryOrderStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `orders`.
    #[must_use]
    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let store = Self::new();
        {
            let mut map = store.orders.write().unwrap();
            for order in orders {
                map.insert(order.order_uid.clone(), order);
            }
        }
        store
    }

    /// Make every following `save` and `load_all` fail with `error`.
    pub fn fail_with(&self, error: OrderStoreError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    /// Undo [`fail_with`](Self::fail_with).
    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }

    /// Number of `save` calls made, successful or not.
    #[must_use]
    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    /// Number of stored orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.read().unwrap().len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.read().unwrap().is_empty()
    }

    /// Stored copy of an order.
    #[must_use]
    pub fn get(&self, order_uid: &str) -> Option<Order> {
        self.orders.read().unwrap().get(order_uid).cloned()
    }

    fn injected_failure(&self) -> Option<OrderStoreError> {
        self.failure.lock().unwrap().clone()
    }
}

impl OrderStore for InMemoryOrderStore {
    fn save<'a>(
        &'a self,
        order: &'a Order,
    ) -> Pin<Box<dyn Future<Output = Result<(), OrderStoreError>> + Send + 'a>> {
        Box::pin(async move {
            self.save_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(error) = self.injected_failure() {
                return Err(error);
            }

            let mut orders = self.orders.write().unwrap();
            if orders.contains_key(&order.order_uid) {
                return Err(OrderStoreError::DuplicateOrder(order.order_uid.clone()));
            }
            orders.insert(order.order_uid.clone(), order.clone());
            Ok(())
        })
    }

    fn load_all(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Order>, OrderStoreError>> + Send + '_>> {
        Box::pin(async move {
            if let Some(error) = self.injected_failure() {
                return Err(error);
            }
            Ok(self.orders.read().unwrap().values().cloned().collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::valid_order;

    #[tokio::test]
    async fn duplicate_save_keeps_first() {
        let store = InMemoryOrderStore::new();
        let first = valid_order("order_1");
        let mut second = valid_order("order_1");
        second.locale = "ru".to_string();

        store.save(&first).await.unwrap();
        let result = store.save(&second).await;

        assert_eq!(result, Err(OrderStoreError::DuplicateOrder("order_1".to_string())));
        assert_eq!(store.get("order_1"), Some(first));
        assert_eq!(store.save_calls(), 2);
    }

    #[tokio::test]
    async fn injected_failure_applies_until_recovered() {
        let store = InMemoryOrderStore::new();
        store.fail_with(OrderStoreError::DatabaseError("connection reset".to_string()));

        assert!(store.save(&valid_order("order_1")).await.is_err());
        assert!(store.load_all().await.is_err());
        assert!(store.is_empty());

        store.recover();
        store.save(&valid_order("order_1")).await.unwrap();
        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }
}
