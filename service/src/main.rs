//! Order Service
//!
//! Runs the ingestion pipeline and the lookup endpoint until Ctrl+C or
//! SIGTERM.
//!
//! # Usage
//!
//! ```bash
//! cp config.example.json config.json
//! cargo run --bin order-service
//! ```

use anyhow::Context;
use orderstream::{Application, Config, config, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    init_tracing();
    tracing::info!("Starting order service...");

    let path = config::config_path();
    let config = Config::load(path.as_deref()).context("failed to load configuration")?;
    tracing::info!(
        config_file = ?path,
        brokers = %config.kafka.bootstrap_servers(),
        topic = %config.kafka.topic,
        http = %config.server.http_addr(),
        "Configuration loaded"
    );

    let app = Application::bootstrap(config).await?;
    tracing::info!(cached_orders = app.cache().len(), "Order service initialized");

    let stats = app.run().await?;
    tracing::info!(
        stored = stats.stored,
        rejected = stats.rejected,
        undecodable = stats.undecodable,
        persist_failed = stats.persist_failed,
        "Order service stopped"
    );
    Ok(())
}
