//! Publish randomized test orders.
//!
//! Sends `ORDER_COUNT` (default 3) orders named `test_order_<n>` to the
//! configured topic, keyed by `order_uid`.
//!
//! # Usage
//!
//! ```bash
//! ORDER_COUNT=10 cargo run --bin publish-orders
//! ```

use anyhow::Context;
use orderstream::{Config, config, init_tracing, sample::sample_order};
use orderstream_core::{MessageBus, OutboundMessage};
use orderstream_redpanda::RedpandaMessageBus;

const DEFAULT_ORDER_COUNT: usize = 3;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = Config::load(config::config_path().as_deref()).context("failed to load configuration")?;
    let count = match std::env::var("ORDER_COUNT") {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid ORDER_COUNT: {raw:?}"))?,
        Err(_) => DEFAULT_ORDER_COUNT,
    };

    let bus = RedpandaMessageBus::builder()
        .brokers(config.kafka.bootstrap_servers())
        .build()
        .context("failed to create producer")?;

    let mut rng = rand::thread_rng();
    for n in 1..=count {
        let order = sample_order(n, &mut rng);
        let payload = serde_json::to_vec(&order).context("failed to encode order")?;
        let message = OutboundMessage::new(config.kafka.topic.as_str(), order.order_uid.as_str(), payload);

        bus.publish(&message)
            .await
            .with_context(|| format!("failed to publish {}", order.order_uid))?;
        tracing::info!(order_uid = %order.order_uid, items = order.item_count(), "Order published");
    }

    tracing::info!(count, topic = %config.kafka.topic, "Done");
    Ok(())
}
