//! Application lifecycle management and graceful shutdown.
//!
//! # Startup
//!
//! 1. Connect to `PostgreSQL` and create the schema if needed
//! 2. Warm the cache from every stored order
//! 3. Connect the message bus
//! 4. Bind the HTTP listener and install the metrics exporter
//!
//! Any failure aborts startup; the service never serves a cold cache.
//!
//! # Graceful Shutdown
//!
//! When a shutdown signal is received (Ctrl+C or SIGTERM):
//! 1. HTTP server stops accepting new connections
//! 2. Shutdown signal broadcast to the ingestion pipeline
//! 3. Each step gets `shutdown_timeout` to finish, then is abandoned
//! 4. The pipeline's stream reader is dropped, closing the consumer
//!
//! # Example
//!
//! ```rust,ignore
//! let app = Application::bootstrap(config).await?;
//! app.run().await?;
//! ```

use crate::config::Config;
use anyhow::Context;
use orderstream_core::{MessageBus, OrderStore};
use orderstream_postgres::PostgresOrderStore;
use orderstream_projections::{OrderCache, warm_start};
use orderstream_redpanda::RedpandaMessageBus;
use orderstream_runtime::metrics::{self, MetricsServer};
use orderstream_runtime::{IngestionPipeline, PipelineStats};
use orderstream_web::{AppState, build_router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// A fully started, not yet running service.
pub struct Application {
    listener: TcpListener,
    router: axum::Router,
    pipeline: IngestionPipeline,
    shutdown_tx: broadcast::Sender<()>,
    cache: Arc<OrderCache>,
    shutdown_timeout: Duration,
}

impl Application {
    /// Connect every dependency and warm the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the database, the broker, the listener or the
    /// metrics exporter cannot be set up, or if warm-start fails.
    pub async fn bootstrap(config: Config) -> anyhow::Result<Self> {
        info!(url = %redact(&config.postgres.url), "Connecting to PostgreSQL");
        let store = PostgresOrderStore::connect_with(&config.postgres.url, config.postgres.max_connections)
            .await
            .context("failed to connect to PostgreSQL")?;
        store
            .ensure_schema()
            .await
            .context("failed to prepare order schema")?;
        let store: Arc<dyn OrderStore> = Arc::new(store);

        let cache = Arc::new(OrderCache::new());
        let loaded = warm_start(store.as_ref(), &cache)
            .await
            .context("failed to warm the order cache")?;
        metrics::record_warm_start(loaded);
        metrics::set_cached_orders(cache.len());

        info!(brokers = %config.kafka.bootstrap_servers(), "Connecting to message bus");
        let bus: Arc<dyn MessageBus> = Arc::new(
            RedpandaMessageBus::builder()
                .brokers(config.kafka.bootstrap_servers())
                .consumer_group(config.kafka.consumer_group.clone())
                .build()
                .context("failed to create message bus")?,
        );

        let listener = TcpListener::bind(config.server.http_addr())
            .await
            .with_context(|| format!("failed to bind {}", config.server.http_addr()))?;

        MetricsServer::new(config.server.metrics_addr())
            .start()
            .context("failed to start metrics exporter")?;

        Ok(Self::new(&config, listener, bus, store, cache))
    }

    /// Assemble from already connected parts. The cache should be warm.
    #[must_use]
    pub fn new(
        config: &Config,
        listener: TcpListener,
        bus: Arc<dyn MessageBus>,
        store: Arc<dyn OrderStore>,
        cache: Arc<OrderCache>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let pipeline = IngestionPipeline::new(
            "order-ingestion",
            config.kafka.topic.clone(),
            bus,
            store,
            Arc::clone(&cache),
            shutdown_rx,
        );
        let router = build_router(AppState::new(Arc::clone(&cache)));

        Self {
            listener,
            router,
            pipeline,
            shutdown_tx,
            cache,
            shutdown_timeout: config.server.shutdown_timeout(),
        }
    }

    /// Address the HTTP server is bound to.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The cache shared by the pipeline and the lookup endpoint.
    #[must_use]
    pub fn cache(&self) -> Arc<OrderCache> {
        Arc::clone(&self.cache)
    }

    /// Run until Ctrl+C or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP server fails.
    pub async fn run(self) -> anyhow::Result<PipelineStats> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `signal` completes, then shut down in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP server fails.
    pub async fn run_until(
        self,
        signal: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<PipelineStats> {
        let Self {
            listener,
            router,
            pipeline,
            shutdown_tx,
            cache: _,
            shutdown_timeout,
        } = self;

        info!(address = %listener.local_addr().context("listener has no address")?, "Starting HTTP server");
        let mut pipeline = pipeline.spawn();

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = stop_rx.await;
                })
                .await
        });

        let server_result = tokio::select! {
            () = signal => None,
            result = &mut server => Some(result),
        };

        let outcome = match server_result {
            None => {
                info!("HTTP server stopping, initiating graceful shutdown...");
                let _ = stop_tx.send(());
                drain_server(&mut server, shutdown_timeout).await;
                Ok(())
            }
            Some(Ok(Ok(()))) => Ok(()),
            Some(Ok(Err(e))) => Err(anyhow::Error::new(e).context("HTTP server failed")),
            Some(Err(e)) => Err(anyhow::Error::new(e).context("HTTP server task failed")),
        };

        let _ = shutdown_tx.send(());
        let stats = stop_pipeline(&mut pipeline, shutdown_timeout).await;

        info!("Graceful shutdown complete");
        outcome.map(|()| stats)
    }
}

async fn drain_server(server: &mut JoinHandle<std::io::Result<()>>, timeout: Duration) {
    match tokio::time::timeout(timeout, &mut *server).await {
        Ok(Ok(Ok(()))) => info!("HTTP server stopped gracefully"),
        Ok(Ok(Err(e))) => warn!(error = %e, "HTTP server failed while draining"),
        Ok(Err(e)) => warn!(error = %e, "HTTP server task failed"),
        Err(_) => {
            warn!("HTTP server shutdown timed out");
            server.abort();
        }
    }
}

async fn stop_pipeline(pipeline: &mut JoinHandle<PipelineStats>, timeout: Duration) -> PipelineStats {
    match tokio::time::timeout(timeout, &mut *pipeline).await {
        Ok(Ok(stats)) => {
            info!(stored = stats.stored, total = stats.total(), "Pipeline stopped gracefully");
            stats
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Pipeline task failed");
            PipelineStats::default()
        }
        Err(_) => {
            // Aborting drops the task, and with it the stream reader.
            warn!("Pipeline shutdown timed out");
            pipeline.abort();
            PipelineStats::default()
        }
    }
}

/// Strip the password from a connection URL before logging it.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme), Some(at)) if at > scheme => {
            let credentials = &url[scheme + 3..at];
            match credentials.find(':') {
                Some(colon) => format!("{}{}:***{}", &url[..scheme + 3], &credentials[..colon], &url[at..]),
                None => url.to_string(),
            }
        }
        _ => url.to_string(),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// If a handler cannot be installed it is logged and that signal is ignored.
pub async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
