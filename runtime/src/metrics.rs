//! Prometheus metrics for the ingestion service.
//!
//! # Example
//!
//! ```rust,no_run
//! use orderstream_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Serve metrics on port 9090
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Messages processed, labelled by `outcome`.
pub const MESSAGES_TOTAL: &str = "orderstream_messages_total";
/// Time spent in `OrderStore::save`.
pub const SAVE_DURATION: &str = "orderstream_save_duration_seconds";
/// Orders currently cached.
pub const CACHED_ORDERS: &str = "orderstream_cached_orders";
/// Orders loaded by warm-start.
pub const WARM_START_ORDERS: &str = "orderstream_warm_start_orders_total";

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus exporter with its own HTTP listener.
pub struct MetricsServer {
    addr: SocketAddr,
    started: bool,
}

impl MetricsServer {
    /// Create a server that will listen on `addr`.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            started: false,
        }
    }

    /// Install the global recorder and start serving `/metrics`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the exporter cannot be built or installed. A
    /// recorder that is already installed is logged and tolerated.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install() {
            Ok(()) => {
                self.started = true;
                tracing::info!(addr = %self.addr, "Metrics available at http://{}/metrics", self.addr);
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Whether this instance installed the exporter.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.started
    }
}

fn register_metrics() {
    describe_counter!(MESSAGES_TOTAL, "Stream messages processed, by outcome");
    describe_histogram!(SAVE_DURATION, "Time taken to persist one order");
    describe_gauge!(CACHED_ORDERS, "Orders currently held in the lookup cache");
    describe_counter!(WARM_START_ORDERS, "Orders loaded into the cache at startup");
}

/// Count one processed message.
pub fn record_outcome(outcome: &'static str) {
    metrics::counter!(MESSAGES_TOTAL, "outcome" => outcome).increment(1);
}

/// Record how long a save took.
pub fn record_save_duration(elapsed: Duration) {
    metrics::histogram!(SAVE_DURATION).record(elapsed.as_secs_f64());
}

/// Publish the current cache size.
#[allow(clippy::cast_precision_loss)]
pub fn set_cached_orders(count: usize) {
    metrics::gauge!(CACHED_ORDERS).set(count as f64);
}

/// Count orders loaded by warm-start.
pub fn record_warm_start(count: usize) {
    metrics::counter!(WARM_START_ORDERS).increment(u64::try_from(count).unwrap_or(u64::MAX));
}
