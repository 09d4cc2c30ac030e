#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use orderstream_core::message_bus::{
    BusError, InboundMessage, MessageBus, MessageStream, OutboundMessage,
};
use orderstream_core::model::Order;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Debug, Default)]
struct Topic {
    log: Vec<InboundMessage>,
    committed: usize,
    subscribers: Vec<mpsc::UnboundedSender<InboundMessage>>,
}

/// In-memory message bus.
///
/// Each topic keeps a log of everything published to it. A new subscriber
/// first receives the whole log (like a consumer group reading from the
/// earliest offset) and then every message published afterwards.
///
/// The returned stream never ends on its own, matching a live consumer; drop
/// it to unsubscribe.
///
/// Like the Kafka bus, a message counts as committed when the subscriber
/// takes it from the stream; messages still queued when the stream is
/// dropped are not.
#[derive(Clone, Debug, Default)]
pub struct InMemoryMessageBus {
    topics: Arc<Mutex<HashMap<String, Topic>>>,
}

impl InMemoryMessageBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `order` as JSON, keyed by its `order_uid`.
    ///
    /// # Errors
    ///
    /// Never fails; the `Result` mirrors [`MessageBus::publish`].
    pub async fn publish_order(&self, topic: &str, order: &Order) -> Result<(), BusError> {
        let payload = crate::fixtures::order_payload(order);
        self.publish(&OutboundMessage::new(topic, order.order_uid.clone(), payload))
            .await
    }

    /// Publish an arbitrary payload with no key.
    pub fn publish_raw(&self, topic: &str, payload: Option<Vec<u8>>) {
        self.append(topic, None, payload);
    }

    /// Number of messages ever published to `topic`.
    #[must_use]
    pub fn published(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .unwrap()
            .get(topic)
            .map_or(0, |t| t.log.len())
    }

    /// Number of messages taken from subscriber streams on `topic`.
    #[must_use]
    pub fn committed(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .unwrap()
            .get(topic)
            .map_or(0, |t| t.committed)
    }

    /// Number of live subscribers on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        let mut topics = self.topics.lock().unwrap();
        topics.get_mut(topic).map_or(0, |t| {
            t.subscribers.retain(|tx| !tx.is_closed());
            t.subscribers.len()
        })
    }

    fn append(&self, topic: &str, key: Option<Vec<u8>>, payload: Option<Vec<u8>>) {
        let mut topics = self.topics.lock().unwrap();
        let entry = topics.entry(topic.to_string()).or_default();

        let message = InboundMessage {
            topic: topic.to_string(),
            partition: 0,
            offset: i64::try_from(entry.log.len()).unwrap_or(i64::MAX),
            key,
            payload,
        };
        entry.subscribers.retain(|tx| tx.send(message.clone()).is_ok());
        entry.log.push(message);
    }
}

impl MessageBus for InMemoryMessageBus {
    fn publish<'a>(
        &'a self,
        message: &'a OutboundMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), BusError>> + Send + 'a>> {
        Box::pin(async move {
            self.append(
                &message.topic,
                message.key.as_ref().map(|k| k.clone().into_bytes()),
                Some(message.payload.clone()),
            );
            Ok(())
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<MessageStream, BusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|&t| t.to_string()).collect();

        Box::pin(async move {
            let (tx, mut rx) = mpsc::unbounded_channel();
            {
                let mut registry = self.topics.lock().unwrap();
                for topic in &topics {
                    let entry = registry.entry(topic.clone()).or_default();
                    for message in &entry.log {
                        let _ = tx.send(message.clone());
                    }
                    entry.subscribers.push(tx.clone());
                }
            }

            let registry = Arc::clone(&self.topics);
            let stream = async_stream::stream! {
                while let Some(message) = rx.recv().await {
                    if let Some(topic) = registry.lock().unwrap().get_mut(&message.topic) {
                        topic.committed += 1;
                    }
                    yield Ok(message);
                }
            };
            Ok(Box::pin(stream) as MessageStream)
        })
    }
}
