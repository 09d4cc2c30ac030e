//! Stream seam: publish and subscribe to raw order messages.
//!
//! The bus moves bytes. Decoding a payload into an [`Order`](crate::Order) is
//! the ingestion pipeline's job, so a malformed payload reaches the pipeline
//! as an ordinary [`InboundMessage`] and is skipped there.
//!
//! ```text
//! producer ──publish──▶ topic "orders" ──subscribe──▶ MessageStream ──▶ pipeline
//! ```
//!
//! # Delivery
//!
//! Subscriptions are at-most-once: an implementation acknowledges a message
//! once it has been handed to the stream, not once it has been processed.
//! Dropping the [`MessageStream`] releases the underlying reader.

use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during message bus operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Failed to connect to the brokers.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish a message to a topic.
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to subscribe to topics.
    #[error("Subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe
        topics: Vec<String>,
        /// The reason for failure
        reason: String,
    },

    /// Network or transport error while reading.
    #[error("Transport error: {0}")]
    TransportError(String),
}

/// A message read from a topic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the message was read from.
    pub topic: String,
    /// Partition within the topic.
    pub partition: i32,
    /// Offset within the partition.
    pub offset: i64,
    /// Message key, conventionally the `order_uid`.
    pub key: Option<Vec<u8>>,
    /// Message value. `None` for tombstones.
    pub payload: Option<Vec<u8>>,
}

impl InboundMessage {
    /// Key as UTF-8, if present and valid.
    #[must_use]
    pub fn key_str(&self) -> Option<&str> {
        self.key.as_deref().and_then(|k| std::str::from_utf8(k).ok())
    }
}

/// A message to publish.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Destination topic.
    pub topic: String,
    /// Partitioning key.
    pub key: Option<String>,
    /// Message value.
    pub payload: Vec<u8>,
}

impl OutboundMessage {
    /// Build a keyed message.
    #[must_use]
    pub fn new(topic: impl Into<String>, key: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            key: Some(key.into()),
            payload,
        }
    }
}

/// Stream of messages from a subscription.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<InboundMessage, BusError>> + Send>>;

/// Publish/subscribe transport.
///
/// Dyn-compatible so the runtime can hold an `Arc<dyn MessageBus>`.
pub trait MessageBus: Send + Sync {
    /// Publish one message.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::PublishFailed`] if the broker does not accept it.
    fn publish<'a>(
        &'a self,
        message: &'a OutboundMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), BusError>> + Send + 'a>>;

    /// Subscribe to one or more topics.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::SubscriptionFailed`] if the subscription cannot be
    /// established.
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<MessageStream, BusError>> + Send + '_>>;
}
