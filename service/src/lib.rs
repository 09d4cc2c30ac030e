//! # orderstream
//!
//! Order ingestion service: consumes orders from a Kafka topic, persists
//! them to `PostgreSQL`, and serves them from an in-memory cache over HTTP.
//!
//! ```text
//!   Kafka ──▶ IngestionPipeline ──▶ PostgresOrderStore
//!                    │
//!                    ▼
//!               OrderCache ◀── GET /order?id=
//! ```
//!
//! The library side holds [`config`] and the [`lifecycle`] that wires the
//! framework crates together; `order-service` and `publish-orders` are thin
//! binaries on top.

pub mod config;
pub mod lifecycle;
pub mod sample;

pub use config::{Config, ConfigError};
pub use lifecycle::Application;

/// Install the `tracing` subscriber used by both binaries.
///
/// `RUST_LOG` takes precedence over the built-in filter.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,orderstream=debug,sqlx=warn,rdkafka=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
