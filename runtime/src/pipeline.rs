//! Order ingestion pipeline.
//!
//! ```text
//! loop {
//!     wait for next message  (or shutdown → stop)
//!     decode  ── fails ──▶ log, skip
//!     validate ─ fails ──▶ log, skip
//!     save    ── fails ──▶ log, skip
//!     cache.set, log
//! }
//! ```
//!
//! Messages are processed strictly one at a time, so cache publication order
//! matches storage commit order. Nothing is retried: the bus has already
//! committed the offset when a message reaches the pipeline, and a message
//! that fails at any stage is gone from the read model. Every skip is logged
//! with the stream position and the order id (when known) so it can be
//! replayed by hand.
//!
//! Shutdown only races the wait for the next message. A message that is
//! already being processed finishes, including its save.
//!
//! # Example
//!
//! ```rust,ignore
//! let pipeline = IngestionPipeline::new("orders", "orders", bus, store, cache, shutdown_rx);
//! let handle = pipeline.spawn();
//!
//! // later
//! shutdown_tx.send(())?;
//! let stats = handle.await?;
//! ```

use crate::metrics;
use futures::StreamExt;
use orderstream_core::message_bus::{InboundMessage, MessageBus, MessageStream};
use orderstream_core::model::Order;
use orderstream_core::order_store::{OrderStore, OrderStoreError};
use orderstream_core::validation::ValidationError;
use orderstream_projections::OrderCache;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Lifecycle of a pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    /// Constructed, not yet consuming.
    Idle,
    /// Consuming from the stream.
    Running,
    /// Stream reader released; will not consume again.
    Stopped,
}

/// What happened to one message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Persisted and published to the cache.
    Stored {
        /// Id of the stored order.
        order_uid: String,
    },
    /// Payload missing or not an order.
    Undecodable {
        /// Decoder message.
        reason: String,
    },
    /// Decoded but refused admission.
    Rejected {
        /// Id of the rejected order (may be empty).
        order_uid: String,
        /// First rule that failed.
        reason: ValidationError,
    },
    /// Admitted but the store refused it.
    PersistFailed {
        /// Id of the order.
        order_uid: String,
        /// Store error.
        reason: OrderStoreError,
    },
}

impl Outcome {
    /// Short label, used as the metrics `outcome` label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Stored { .. } => "stored",
            Self::Undecodable { .. } => "undecodable",
            Self::Rejected { .. } => "rejected",
            Self::PersistFailed { .. } => "persist_failed",
        }
    }
}

/// Per-outcome message counts for one pipeline run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Orders persisted and cached.
    pub stored: u64,
    /// Messages that did not decode.
    pub undecodable: u64,
    /// Orders refused by validation.
    pub rejected: u64,
    /// Orders the store refused.
    pub persist_failed: u64,
}

impl PipelineStats {
    fn record(&mut self, outcome: &Outcome) {
        let counter = match outcome {
            Outcome::Stored { .. } => &mut self.stored,
            Outcome::Undecodable { .. } => &mut self.undecodable,
            Outcome::Rejected { .. } => &mut self.rejected,
            Outcome::PersistFailed { .. } => &mut self.persist_failed,
        };
        *counter += 1;
    }

    /// Total messages processed.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.stored + self.undecodable + self.rejected + self.persist_failed
    }
}

/// Single-task consumer that turns stream messages into stored, cached orders.
pub struct IngestionPipeline {
    name: String,
    topic: String,
    bus: Arc<dyn MessageBus>,
    store: Arc<dyn OrderStore>,
    cache: Arc<OrderCache>,
    shutdown: broadcast::Receiver<()>,
    retry_delay: Duration,
    state: PipelineState,
    stats: PipelineStats,
}

impl IngestionPipeline {
    /// Create a pipeline with a 5 second reconnect delay.
    ///
    /// Any value sent on (or the closing of) the `shutdown` channel stops it.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        topic: impl Into<String>,
        bus: Arc<dyn MessageBus>,
        store: Arc<dyn OrderStore>,
        cache: Arc<OrderCache>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            name: name.into(),
            topic: topic.into(),
            bus,
            store,
            cache,
            shutdown,
            retry_delay: Duration::from_secs(5),
            state: PipelineState::Idle,
            stats: PipelineStats::default(),
        }
    }

    /// Set how long to wait before resubscribing after a failure.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> PipelineState {
        self.state
    }

    /// Counts so far.
    #[must_use]
    pub const fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Run on a background task; the handle yields the final counts.
    #[must_use]
    pub fn spawn(mut self) -> tokio::task::JoinHandle<PipelineStats> {
        tokio::spawn(async move { self.run().await })
    }

    /// Consume until shutdown, then release the stream reader.
    ///
    /// The stream reader lives only inside this call and is dropped, closing
    /// the consumer, before it returns.
    pub async fn run(&mut self) -> PipelineStats {
        if self.state == PipelineState::Stopped {
            return self.stats;
        }
        self.state = PipelineState::Running;
        info!(pipeline = %self.name, topic = %self.topic, "Ingestion pipeline started");

        let mut stream: Option<MessageStream> = None;
        loop {
            if stream.is_none() {
                stream = self.subscribe().await;
            }
            let Some(active) = stream.as_mut() else {
                break;
            };

            let next = tokio::select! {
                _ = self.shutdown.recv() => break,
                next = active.next() => next,
            };

            match next {
                Some(Ok(message)) => {
                    let outcome = self.process_message(&message).await;
                    self.stats.record(&outcome);
                }
                Some(Err(e)) => {
                    error!(pipeline = %self.name, error = %e, "Error receiving message from stream");
                }
                None => {
                    warn!(
                        pipeline = %self.name,
                        "Message stream ended, resubscribing in {:?}",
                        self.retry_delay
                    );
                    stream = None;
                    if self.wait_before_retry().await {
                        break;
                    }
                }
            }
        }

        info!(pipeline = %self.name, "Ingestion pipeline received shutdown signal");
        drop(stream);
        self.close();
        self.stats
    }

    /// Subscribe, retrying until it works. `None` means shutdown arrived first.
    async fn subscribe(&mut self) -> Option<MessageStream> {
        loop {
            let topics = [self.topic.as_str()];
            let result = tokio::select! {
                _ = self.shutdown.recv() => return None,
                result = self.bus.subscribe(&topics) => result,
            };

            match result {
                Ok(stream) => {
                    info!(pipeline = %self.name, topic = %self.topic, "Subscribed to topic");
                    return Some(stream);
                }
                Err(e) => {
                    error!(
                        pipeline = %self.name,
                        error = %e,
                        "Failed to subscribe, retrying in {:?}",
                        self.retry_delay
                    );
                    if self.wait_before_retry().await {
                        return None;
                    }
                }
            }
        }
    }

    /// Mark the pipeline stopped. Safe to call more than once; a stopped
    /// pipeline's `run` returns immediately.
    pub fn close(&mut self) {
        if self.state == PipelineState::Stopped {
            return;
        }
        self.state = PipelineState::Stopped;

        let stats = self.stats;
        info!(
            pipeline = %self.name,
            stored = stats.stored,
            undecodable = stats.undecodable,
            rejected = stats.rejected,
            persist_failed = stats.persist_failed,
            "Ingestion pipeline stopped"
        );
    }

    /// Decode, validate, persist and cache one message.
    ///
    /// Never fails: every problem is logged and reported as an [`Outcome`].
    pub async fn process_message(&self, message: &InboundMessage) -> Outcome {
        let outcome = self.ingest(message).await;
        metrics::record_outcome(outcome.label());
        outcome
    }

    async fn ingest(&self, message: &InboundMessage) -> Outcome {
        let order = match decode(message) {
            Ok(order) => order,
            Err(reason) => {
                warn!(
                    pipeline = %self.name,
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    key = ?message.key_str(),
                    reason = %reason,
                    "Skipping undecodable message"
                );
                return Outcome::Undecodable { reason };
            }
        };

        if let Err(reason) = order.validate() {
            warn!(
                pipeline = %self.name,
                order_uid = %order.order_uid,
                partition = message.partition,
                offset = message.offset,
                reason = %reason,
                "Order rejected"
            );
            return Outcome::Rejected {
                order_uid: order.order_uid,
                reason,
            };
        }

        let started = Instant::now();
        let saved = self.store.save(&order).await;
        metrics::record_save_duration(started.elapsed());

        if let Err(reason) = saved {
            error!(
                pipeline = %self.name,
                order_uid = %order.order_uid,
                partition = message.partition,
                offset = message.offset,
                error = %reason,
                "Failed to persist order, message dropped"
            );
            return Outcome::PersistFailed {
                order_uid: order.order_uid,
                reason,
            };
        }

        let order_uid = order.order_uid.clone();
        let items = order.items.len();
        self.cache.set(order);
        metrics::set_cached_orders(self.cache.len());

        info!(
            pipeline = %self.name,
            order_uid = %order_uid,
            items,
            offset = message.offset,
            "Order stored and cached"
        );
        Outcome::Stored { order_uid }
    }

    /// Returns `true` if shutdown arrived while waiting.
    async fn wait_before_retry(&mut self) -> bool {
        tokio::select! {
            _ = self.shutdown.recv() => true,
            () = tokio::time::sleep(self.retry_delay) => false,
        }
    }
}

fn decode(message: &InboundMessage) -> Result<Order, String> {
    let payload = message
        .payload
        .as_deref()
        .ok_or_else(|| "message has no payload".to_string())?;
    serde_json::from_slice(payload).map_err(|e| e.to_string())
}
