//! Redpanda message bus for orderstream.
//!
//! [`RedpandaMessageBus`] implements [`MessageBus`] with rdkafka, so it works
//! against Redpanda or any Kafka-compatible broker.
//!
//! # Delivery Semantics
//!
//! **At-most-once** with manual offset commits:
//! - an offset is committed when the subscriber takes the message from the
//!   stream, before the subscriber has processed it
//! - messages prefetched into the stream's buffer but never taken are not
//!   committed, so they are redelivered to the group after a restart
//! - a message whose processing fails is not redelivered
//! - ordering is preserved within a partition; producers key messages by
//!   `order_uid`, so all messages for one order land on one partition
//!
//! Dropping the [`MessageStream`] returned by `subscribe` stops the consumer
//! task and closes the Kafka consumer.
//!
//! # Example
//!
//! ```no_run
//! use orderstream_redpanda::RedpandaMessageBus;
//! use orderstream_core::message_bus::{MessageBus, OutboundMessage};
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = RedpandaMessageBus::new("localhost:9092")?;
//!
//! bus.publish(&OutboundMessage::new("orders", "order_abc", b"{}".to_vec())).await?;
//!
//! let mut stream = bus.subscribe(&["orders"]).await?;
//! while let Some(result) = stream.next().await {
//!     match result {
//!         Ok(message) => println!("offset {}", message.offset),
//!         Err(e) => eprintln!("Error: {e}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use orderstream_core::message_bus::{
    BusError, InboundMessage, MessageBus, MessageStream, OutboundMessage,
};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::{Offset, TopicPartitionList};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Consumer group used when none is configured.
pub const DEFAULT_CONSUMER_GROUP: &str = "order-service";

const DEFAULT_BUFFER_SIZE: usize = 100;
const DEFAULT_OFFSET_RESET: &str = "earliest";
const DEFAULT_ACKS: &str = "all";

/// Redpanda-backed [`MessageBus`].
///
/// # Example
///
/// ```no_run
/// use orderstream_redpanda::RedpandaMessageBus;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let bus = RedpandaMessageBus::builder()
///     .brokers("localhost:9092,localhost:9093")
///     .consumer_group("order-service")
///     .auto_offset_reset("earliest")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RedpandaMessageBus {
    producer: FutureProducer,
    brokers: String,
    timeout: Duration,
    consumer_group: String,
    buffer_size: usize,
    auto_offset_reset: String,
}

impl RedpandaMessageBus {
    /// Create a bus with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ConnectionFailed`] if the producer cannot be created.
    pub fn new(brokers: &str) -> Result<Self, BusError> {
        Self::builder().brokers(brokers).build()
    }

    /// Start configuring a bus.
    #[must_use]
    pub fn builder() -> RedpandaMessageBusBuilder {
        RedpandaMessageBusBuilder::default()
    }

    /// Broker list this bus connects to.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }

    /// Consumer group used by `subscribe`.
    #[must_use]
    pub fn consumer_group(&self) -> &str {
        &self.consumer_group
    }
}

/// Builder for [`RedpandaMessageBus`].
#[derive(Default)]
pub struct RedpandaMessageBusBuilder {
    brokers: Option<String>,
    producer_acks: Option<String>,
    timeout: Option<Duration>,
    consumer_group: Option<String>,
    buffer_size: Option<usize>,
    auto_offset_reset: Option<String>,
}

impl RedpandaMessageBusBuilder {
    /// Comma-separated broker addresses, e.g. `localhost:9092`.
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Producer acknowledgment mode: `"0"`, `"1"` or `"all"`. Default: `"all"`.
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Producer send timeout. Default: 5 seconds.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Consumer group for subscriptions. Default: [`DEFAULT_CONSUMER_GROUP`].
    #[must_use]
    pub fn consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = Some(consumer_group.into());
        self
    }

    /// Messages buffered between the Kafka consumer and the subscriber.
    /// Default: 100. Zero is treated as one.
    ///
    /// Every buffered message has already been committed, so a small buffer
    /// bounds how much a crash can lose.
    #[must_use]
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = Some(buffer_size.max(1));
        self
    }

    /// Where a new consumer group starts reading: `"earliest"`, `"latest"`
    /// or `"error"`. Default: `"earliest"`.
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Build the bus.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ConnectionFailed`] if brokers are not set or the
    /// producer cannot be created.
    pub fn build(self) -> Result<RedpandaMessageBus, BusError> {
        let brokers = self
            .brokers
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| BusError::ConnectionFailed("Brokers not configured".to_string()))?;
        let timeout = self.timeout.unwrap_or(Duration::from_secs(5));
        let acks = self.producer_acks.as_deref().unwrap_or(DEFAULT_ACKS);

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", timeout.as_millis().to_string())
            .set("acks", acks)
            .create()
            .map_err(|e| BusError::ConnectionFailed(format!("Failed to create producer: {e}")))?;

        let bus = RedpandaMessageBus {
            producer,
            timeout,
            consumer_group: self
                .consumer_group
                .unwrap_or_else(|| DEFAULT_CONSUMER_GROUP.to_string()),
            buffer_size: self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE),
            auto_offset_reset: self
                .auto_offset_reset
                .unwrap_or_else(|| DEFAULT_OFFSET_RESET.to_string()),
            brokers,
        };

        tracing::info!(
            brokers = %bus.brokers,
            acks,
            consumer_group = %bus.consumer_group,
            buffer_size = bus.buffer_size,
            auto_offset_reset = %bus.auto_offset_reset,
            "RedpandaMessageBus created"
        );
        Ok(bus)
    }
}

impl MessageBus for RedpandaMessageBus {
    fn publish<'a>(
        &'a self,
        message: &'a OutboundMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), BusError>> + Send + 'a>> {
        Box::pin(async move {
            let mut record = FutureRecord::<str, [u8]>::to(&message.topic).payload(&message.payload);
            if let Some(key) = &message.key {
                record = record.key(key.as_str());
            }

            match self.producer.send(record, Timeout::After(self.timeout)).await {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        topic = %message.topic,
                        key = ?message.key,
                        partition,
                        offset,
                        "Message published"
                    );
                    Ok(())
                }
                Err((kafka_error, _)) => {
                    tracing::error!(topic = %message.topic, error = %kafka_error, "Failed to publish message");
                    Err(BusError::PublishFailed {
                        topic: message.topic.clone(),
                        reason: kafka_error.to_string(),
                    })
                }
            }
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<MessageStream, BusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|s| (*s).to_string()).collect();

        Box::pin(async move {
            let consumer: StreamConsumer = ClientConfig::new()
                .set("bootstrap.servers", &self.brokers)
                .set("group.id", &self.consumer_group)
                .set("enable.auto.commit", "false")
                .set("auto.offset.reset", &self.auto_offset_reset)
                .set("session.timeout.ms", "6000")
                .set("enable.partition.eof", "false")
                .create()
                .map_err(|e| BusError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("Failed to create consumer: {e}"),
                })?;

            let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
            consumer
                .subscribe(&topic_refs)
                .map_err(|e| BusError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("Failed to subscribe to topics: {e}"),
                })?;

            tracing::info!(
                topics = ?topics,
                consumer_group = %self.consumer_group,
                auto_offset_reset = %self.auto_offset_reset,
                "Subscribed to topics"
            );

            let consumer = Arc::new(consumer);
            let (tx, mut rx) = tokio::sync::mpsc::channel(self.buffer_size);

            // The task and the stream share the consumer; it closes once both
            // are gone, which happens when the receiving stream is dropped.
            let reader = Arc::clone(&consumer);
            tokio::spawn(async move {
                use futures::StreamExt;

                let mut stream = reader.stream();
                loop {
                    let next = tokio::select! {
                        () = tx.closed() => break,
                        next = stream.next() => next,
                    };
                    let Some(result) = next else { break };

                    let item = result
                        .map(|message| to_inbound(&message))
                        .map_err(|e| BusError::TransportError(format!("Failed to receive message: {e}")));
                    if tx.send(item).await.is_err() {
                        break;
                    }
                }

                tracing::debug!("Consumer task exiting");
            });

            // Commit on hand-off: only the message being yielded is committed,
            // anything still buffered in `rx` is left for redelivery.
            let stream = async_stream::stream! {
                while let Some(result) = rx.recv().await {
                    if let Ok(message) = &result {
                        commit_handed_off(&consumer, message);
                    }
                    yield result;
                }
            };

            Ok(Box::pin(stream) as MessageStream)
        })
    }
}

fn commit_handed_off(consumer: &StreamConsumer, message: &InboundMessage) {
    let result = next_offset(message)
        .and_then(|positions| consumer.commit(&positions, CommitMode::Async));
    if let Err(e) = result {
        tracing::warn!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            error = %e,
            "Failed to commit offset"
        );
    }
}

/// Position to commit once `message` is consumed: the offset after it.
fn next_offset(message: &InboundMessage) -> rdkafka::error::KafkaResult<TopicPartitionList> {
    let mut positions = TopicPartitionList::new();
    positions.add_partition_offset(
        &message.topic,
        message.partition,
        Offset::Offset(message.offset + 1),
    )?;
    Ok(positions)
}

fn to_inbound(message: &BorrowedMessage<'_>) -> InboundMessage {
    InboundMessage {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        key: message.key().map(<[u8]>::to_vec),
        payload: message.payload().map(<[u8]>::to_vec),
    }
}
