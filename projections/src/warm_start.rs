//! Rebuild the cache from durable storage.

use crate::cache::OrderCache;
use orderstream_core::order_store::{OrderStore, OrderStoreError};

/// Load every stored order into `cache`.
///
/// Call once at startup, before anything reads the cache. Calling it again is
/// harmless: ids already cached are overwritten with the stored copy.
///
/// Returns the number of orders read from the store.
///
/// # Errors
///
/// Propagates the store's error; the cache is left untouched in that case.
pub async fn warm_start(store: &dyn OrderStore, cache: &OrderCache) -> Result<usize, OrderStoreError> {
    let orders = store.load_all().await?;
    let loaded = orders.len();
    let cached = cache.load_many(orders);

    tracing::info!(loaded, cached, "cache warm-start complete");
    Ok(loaded)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use orderstream_testing::InMemoryOrderStore;
    use orderstream_testing::fixtures::valid_order;

    #[tokio::test]
    async fn every_stored_order_is_retrievable() {
        let store = InMemoryOrderStore::with_orders((0..1_000).map(|n| valid_order(&format!("order_{n}"))));
        let cache = OrderCache::new();

        let loaded = warm_start(&store, &cache).await.unwrap();

        assert_eq!(loaded, 1_000);
        assert_eq!(cache.len(), 1_000);
        for n in 0..1_000 {
            assert!(cache.get(&format!("order_{n}")).is_some());
        }
    }

    #[tokio::test]
    async fn repeated_warm_start_does_not_duplicate() {
        let store = InMemoryOrderStore::with_orders([valid_order("a"), valid_order("b")]);
        let cache = OrderCache::new();

        warm_start(&store, &cache).await.unwrap();
        warm_start(&store, &cache).await.unwrap();

        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn store_failure_leaves_cache_empty() {
        let store = InMemoryOrderStore::new();
        store.fail_with(OrderStoreError::DatabaseError("down".to_string()));
        let cache = OrderCache::new();

        assert!(warm_start(&store, &cache).await.is_err());
        assert!(cache.is_empty());
    }
}
