use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    collector::Collector, config::Config, handlers, signals::setup_signal_handlers,
    store::EventStore,
};

/// Largest accepted ingest body
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Start the collector server
///
/// This function:
/// 1. Opens the event store and starts the collector runtime
/// 2. Sets up signal handlers for graceful shutdown
/// 3. Serves HTTP until a shutdown signal arrives
/// 4. Closes the runtime, draining queued events within the shutdown timeout
pub async fn start_server(config: Config) -> Result<()> {
    tracing::info!("Event collector starting...");

    tracing::info!(database = %config.db_path, "Opening event store");
    let store = EventStore::open(&config.db_path)
        .await
        .with_context(|| format!("Failed to open event store at {}", config.db_path))?;

    let collector = Collector::start(Arc::new(config.clone()), store);

    // Setup signal handlers (SIGTERM, SIGINT)
    let (shutdown_tx, signal_handle) = setup_signal_handlers();
    let mut shutdown_rx = shutdown_tx.subscribe();

    let app = create_router(collector.clone());

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;
    info!("Listening on {}", listener.local_addr()?);
    info!(
        "Configuration: retention {}h / {} rows, flush every {}ms in batches of {}, queue capacity {}",
        config.retention_hours,
        config.max_rows,
        config.flush_interval_ms,
        config.flush_batch_size,
        config.max_queue_size
    );

    let serving = collector.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            // Ingest answers 503 from here on while connections drain
            serving.begin_shutdown();
            info!("Shutdown signal received, draining connections...");
        })
        .await;

    // Close even if serving failed so queued events get their final flush
    let report = collector.close().await;
    info!(
        flushed = report.flushed_during_close,
        discarded = report.discarded,
        "Collector closed"
    );

    signal_handle.abort();
    served?;
    info!("Server stopped gracefully");

    Ok(())
}

/// Create the Axum router with all routes and middleware
pub fn create_router(collector: Arc<Collector>) -> Router {
    Router::new()
        .route("/ingest", post(handlers::ingest::ingest))
        .route("/health", get(handlers::health::health_check))
        .with_state(collector)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
}
