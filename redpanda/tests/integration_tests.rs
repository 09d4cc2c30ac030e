//! Integration tests for [`RedpandaMessageBus`] against a real broker.
//!
//! # Running These Tests
//!
//! Ignored by default: they need Docker and take a while to start Kafka.
//!
//! ```bash
//! cargo test -p orderstream-redpanda --test integration_tests -- --ignored
//! ```

#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use futures::StreamExt;
use orderstream_core::message_bus::{InboundMessage, MessageBus, MessageStream, OutboundMessage};
use orderstream_core::model::Order;
use orderstream_redpanda::RedpandaMessageBus;
use orderstream_testing::fixtures::{order_payload, valid_order};
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::kafka::{KAFKA_PORT, Kafka};

const WARMUP_KEY: &str = "warmup";

async fn start_kafka() -> (ContainerAsync<Kafka>, String) {
    let kafka = Kafka::default()
        .with_env_var("KAFKA_AUTO_CREATE_TOPICS_ENABLE", "true")
        .start()
        .await
        .expect("Failed to start Kafka container");

    let host = kafka.get_host().await.expect("Failed to get host");
    let port = kafka
        .get_host_port_ipv4(KAFKA_PORT)
        .await
        .expect("Failed to get port");
    (kafka, format!("{host}:{port}"))
}

fn bus(brokers: &str, group: &str) -> RedpandaMessageBus {
    RedpandaMessageBus::builder()
        .brokers(brokers)
        .consumer_group(group)
        .auto_offset_reset("earliest")
        .build()
        .expect("Failed to create message bus")
}

/// Publish a warmup message until the broker accepts it, creating the topic.
async fn ensure_topic_exists(bus: &RedpandaMessageBus, topic: &str) {
    let warmup = OutboundMessage::new(topic, WARMUP_KEY, b"{}".to_vec());
    for attempt in 1..=60 {
        if bus.publish(&warmup).await.is_ok() {
            tokio::time::sleep(Duration::from_secs(2)).await;
            return;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(attempt != 60, "Failed to create topic {topic}");
    }
}

/// Read `count` non-warmup messages within 20 seconds.
async fn receive(stream: &mut MessageStream, count: usize) -> Vec<InboundMessage> {
    let mut received = Vec::new();
    tokio::time::timeout(Duration::from_secs(20), async {
        while received.len() < count {
            let Some(result) = stream.next().await else { break };
            let message = result.expect("Failed to receive message");
            if message.key_str() != Some(WARMUP_KEY) {
                received.push(message);
            }
        }
    })
    .await
    .expect("Timeout waiting for messages");
    received
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_order_round_trip_keeps_key_and_payload() {
    let (_kafka, brokers) = start_kafka().await;
    let bus = bus(&brokers, "round-trip");
    ensure_topic_exists(&bus, "orders").await;

    let order = valid_order("order_abc");
    bus.publish(&OutboundMessage::new("orders", "order_abc", order_payload(&order)))
        .await
        .expect("Failed to publish");

    let mut stream = bus.subscribe(&["orders"]).await.expect("Failed to subscribe");
    let received = receive(&mut stream, 1).await;

    assert_eq!(received[0].key_str(), Some("order_abc"));
    let decoded: Order = serde_json::from_slice(received[0].payload.as_deref().expect("payload"))
        .expect("Failed to decode order");
    assert_eq!(decoded, order);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_handed_off_messages_are_not_redelivered() {
    let (_kafka, brokers) = start_kafka().await;
    let bus = bus(&brokers, "at-most-once");
    ensure_topic_exists(&bus, "orders").await;

    for n in 0..3 {
        let uid = format!("order_{n}");
        bus.publish(&OutboundMessage::new("orders", uid.clone(), order_payload(&valid_order(&uid))))
            .await
            .expect("Failed to publish");
    }

    let mut stream = bus.subscribe(&["orders"]).await.expect("Failed to subscribe");
    let first = receive(&mut stream, 3).await;
    assert_eq!(first.len(), 3);
    drop(stream);
    // Let the async commits and the consumer shutdown settle.
    tokio::time::sleep(Duration::from_secs(3)).await;

    bus.publish(&OutboundMessage::new("orders", "order_late", order_payload(&valid_order("order_late"))))
        .await
        .expect("Failed to publish");

    let mut stream = bus.subscribe(&["orders"]).await.expect("Failed to resubscribe");
    let second = receive(&mut stream, 1).await;
    assert_eq!(second[0].key_str(), Some("order_late"));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_buffered_messages_not_taken_are_redelivered() {
    let (_kafka, brokers) = start_kafka().await;
    let bus = bus(&brokers, "prefetch");
    ensure_topic_exists(&bus, "orders").await;

    for n in 0..3 {
        let uid = format!("order_{n}");
        bus.publish(&OutboundMessage::new("orders", uid.clone(), order_payload(&valid_order(&uid))))
            .await
            .expect("Failed to publish");
    }

    let mut stream = bus.subscribe(&["orders"]).await.expect("Failed to subscribe");
    let taken = receive(&mut stream, 1).await;
    assert_eq!(taken[0].key_str(), Some("order_0"));
    // Give the consumer task time to prefetch the rest into the buffer.
    tokio::time::sleep(Duration::from_secs(1)).await;
    drop(stream);
    tokio::time::sleep(Duration::from_secs(3)).await;

    let mut stream = bus.subscribe(&["orders"]).await.expect("Failed to resubscribe");
    let redelivered = receive(&mut stream, 2).await;
    let keys: Vec<_> = redelivered.iter().map(InboundMessage::key_str).collect();
    assert_eq!(keys, vec![Some("order_1"), Some("order_2")]);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_same_key_preserves_publish_order() {
    let (_kafka, brokers) = start_kafka().await;
    let bus = bus(&brokers, "ordering");
    ensure_topic_exists(&bus, "orders").await;

    for n in 0..10u8 {
        bus.publish(&OutboundMessage::new("orders", "order_same", vec![n]))
            .await
            .expect("Failed to publish");
    }

    let mut stream = bus.subscribe(&["orders"]).await.expect("Failed to subscribe");
    let received = receive(&mut stream, 10).await;
    let payloads: Vec<u8> = received
        .iter()
        .map(|m| m.payload.as_deref().expect("payload")[0])
        .collect();
    assert_eq!(payloads, (0..10).collect::<Vec<u8>>());
}
