//! End-to-end pipeline behaviour over the in-memory bus and store.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use orderstream_core::message_bus::{BusError, MessageBus, MessageStream, OutboundMessage};
use orderstream_core::order_store::OrderStore;
use orderstream_projections::{OrderCache, warm_start};
use orderstream_runtime::{IngestionPipeline, PipelineState, PipelineStats};
use orderstream_testing::fixtures::{OrderBuilder, valid_order};
use orderstream_testing::{InMemoryMessageBus, InMemoryOrderStore};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;

const TOPIC: &str = "orders";

struct Service {
    bus: InMemoryMessageBus,
    store: InMemoryOrderStore,
    cache: Arc<OrderCache>,
    shutdown: broadcast::Sender<()>,
    handle: tokio::task::JoinHandle<PipelineStats>,
}

fn start(bus: InMemoryMessageBus, store: InMemoryOrderStore, cache: Arc<OrderCache>) -> Service {
    let (shutdown, rx) = broadcast::channel(1);
    let handle = IngestionPipeline::new(
        "orders",
        TOPIC,
        Arc::new(bus.clone()),
        Arc::new(store.clone()),
        Arc::clone(&cache),
        rx,
    )
    .with_retry_delay(Duration::from_millis(10))
    .spawn();

    Service {
        bus,
        store,
        cache,
        shutdown,
        handle,
    }
}

async fn stop(service: Service) -> PipelineStats {
    service.shutdown.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), service.handle)
        .await
        .expect("pipeline did not stop")
        .unwrap()
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached");
}

#[tokio::test]
async fn valid_order_becomes_queryable() {
    let service = start(InMemoryMessageBus::new(), InMemoryOrderStore::new(), Arc::new(OrderCache::new()));
    let order = valid_order("order_abc");

    service.bus.publish_order(TOPIC, &order).await.unwrap();
    eventually(|| service.cache.get("order_abc").is_some()).await;

    assert_eq!(service.cache.get("order_abc").as_deref(), Some(&order));
    assert_eq!(service.store.get("order_abc"), Some(order));

    let stats = stop(service).await;
    assert_eq!(stats.stored, 1);
}

#[tokio::test]
async fn every_failure_kind_is_skipped_and_the_loop_continues() {
    let service = start(InMemoryMessageBus::new(), InMemoryOrderStore::new(), Arc::new(OrderCache::new()));

    service.bus.publish_raw(TOPIC, Some(b"not json".to_vec()));
    service.bus.publish_raw(TOPIC, None);
    service
        .bus
        .publish_order(TOPIC, &OrderBuilder::new("order_empty").items(0).build())
        .await
        .unwrap();
    service
        .bus
        .publish_order(TOPIC, &OrderBuilder::new("order_mail").email("not-an-email").build())
        .await
        .unwrap();
    service.bus.publish_order(TOPIC, &valid_order("order_dup")).await.unwrap();
    service.bus.publish_order(TOPIC, &valid_order("order_dup")).await.unwrap();
    service.bus.publish_order(TOPIC, &valid_order("order_last")).await.unwrap();

    eventually(|| service.cache.get("order_last").is_some()).await;

    assert!(service.cache.get("order_empty").is_none());
    assert!(service.cache.get("order_mail").is_none());
    assert!(service.cache.get("order_dup").is_some());
    assert_eq!(service.cache.len(), 2);
    // Rejected orders never reach the store; both duplicates do.
    assert_eq!(service.store.save_calls(), 3);

    let stats = stop(service).await;
    assert_eq!(
        stats,
        PipelineStats {
            stored: 2,
            undecodable: 2,
            rejected: 2,
            persist_failed: 1,
        }
    );
}

#[tokio::test]
async fn warm_start_serves_stored_orders_before_first_message() {
    let store = InMemoryOrderStore::with_orders((0..1_000).map(|n| valid_order(&format!("order_{n}"))));
    let cache = Arc::new(OrderCache::new());
    warm_start(&store, &cache).await.unwrap();

    assert_eq!(cache.len(), 1_000);
    assert_eq!(store.load_all().await.unwrap().len(), cache.len());

    let service = start(InMemoryMessageBus::new(), store, cache);
    for n in 0..1_000 {
        assert!(service.cache.get(&format!("order_{n}")).is_some());
    }

    let stats = stop(service).await;
    assert_eq!(stats.total(), 0);
}

#[tokio::test]
async fn shutdown_releases_the_stream_reader() {
    let service = start(InMemoryMessageBus::new(), InMemoryOrderStore::new(), Arc::new(OrderCache::new()));
    let bus = service.bus.clone();
    eventually(|| bus.subscriber_count(TOPIC) == 1).await;

    stop(service).await;

    assert_eq!(bus.subscriber_count(TOPIC), 0);
}

#[tokio::test]
async fn shutdown_with_a_backlog_commits_only_processed_messages() {
    let bus = InMemoryMessageBus::new();
    for n in 0..200 {
        bus.publish_order(TOPIC, &valid_order(&format!("order_{n}"))).await.unwrap();
    }
    let service = start(bus.clone(), InMemoryOrderStore::new(), Arc::new(OrderCache::new()));
    let store = service.store.clone();
    eventually(|| !store.is_empty()).await;

    let stats = stop(service).await;

    // Whatever was still queued is uncommitted and would be redelivered.
    assert_eq!(bus.committed(TOPIC), usize::try_from(stats.total()).unwrap());
    assert_eq!(store.len(), usize::try_from(stats.stored).unwrap());
    assert!(stats.stored >= 1);
}

#[tokio::test]
async fn dropping_the_shutdown_sender_stops_the_pipeline() {
    let (shutdown, rx) = broadcast::channel::<()>(1);
    let mut pipeline = IngestionPipeline::new(
        "orders",
        TOPIC,
        Arc::new(InMemoryMessageBus::new()),
        Arc::new(InMemoryOrderStore::new()),
        Arc::new(OrderCache::new()),
        rx,
    );
    drop(shutdown);

    let stats = tokio::time::timeout(Duration::from_secs(5), pipeline.run())
        .await
        .expect("pipeline did not stop");

    assert_eq!(stats, PipelineStats::default());
    assert_eq!(pipeline.state(), PipelineState::Stopped);
}

/// Refuses the first `failures` subscriptions, then delegates.
struct FlakyBus {
    inner: InMemoryMessageBus,
    failures: usize,
    attempts: AtomicUsize,
}

impl MessageBus for FlakyBus {
    fn publish<'a>(
        &'a self,
        message: &'a OutboundMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), BusError>> + Send + 'a>> {
        self.inner.publish(message)
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<MessageStream, BusError>> + Send + '_>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            let topics = topics.iter().map(|t| (*t).to_string()).collect();
            return Box::pin(async move {
                Err(BusError::SubscriptionFailed {
                    topics,
                    reason: "broker unavailable".to_string(),
                })
            });
        }
        self.inner.subscribe(topics)
    }
}

#[tokio::test]
async fn subscription_failures_are_retried() {
    let inner = InMemoryMessageBus::new();
    inner.publish_order(TOPIC, &valid_order("order_abc")).await.unwrap();
    let bus = Arc::new(FlakyBus {
        inner,
        failures: 3,
        attempts: AtomicUsize::new(0),
    });
    let cache = Arc::new(OrderCache::new());
    let (shutdown, rx) = broadcast::channel(1);

    let handle = IngestionPipeline::new(
        "orders",
        TOPIC,
        Arc::clone(&bus) as Arc<dyn MessageBus>,
        Arc::new(InMemoryOrderStore::new()),
        Arc::clone(&cache),
        rx,
    )
    .with_retry_delay(Duration::from_millis(10))
    .spawn();

    eventually(|| cache.get("order_abc").is_some()).await;
    assert_eq!(bus.attempts.load(Ordering::SeqCst), 4);

    shutdown.send(()).unwrap();
    handle.await.unwrap();
}
