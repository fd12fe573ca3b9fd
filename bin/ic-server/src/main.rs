//! Item Catalog Server
//!
//! Serves the item REST API and the batch processing trigger.
//!
//! Startup:
//! - Load `.env`, CLI args, TOML config and `IC_*` overrides
//! - Select the item store backend (memory, SQLite, PostgreSQL)
//! - Create the shared worker pool once and inject it into the processor
//! - Install the Prometheus recorder and serve `/metrics` next to the API
//!
//! On SIGINT/SIGTERM the cancellation signal fires (tasks still pausing fail
//! as cancelled), the pool stops admitting work and the server drains.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::routing::get;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::SqlitePoolOptions;
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use ic_api::{create_router, AppState};
use ic_common::init_tracing;
use ic_config::{AppConfig, StoreBackend, StoreSettings};
use ic_processor::{BatchProcessor, BatchSettings, CancellationToken, WorkerPool};
use ic_store::{InMemoryItemStore, ItemStore, PostgresItemStore, SqliteItemStore};

/// Item Catalog Server
#[derive(Parser, Debug)]
#[command(name = "ic-server")]
#[command(about = "Item Catalog Server - item REST API with batch processing")]
struct Args {
    /// Path to a TOML config file (defaults plus IC_* env vars if omitted)
    #[arg(long, env = "IC_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP port, overrides the config file
    #[arg(long)]
    port: Option<u16>,

    /// Worker pool capacity, overrides the config file
    #[arg(long)]
    pool_concurrency: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::from_env()?,
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(concurrency) = args.pool_concurrency {
        config.pool.concurrency = concurrency;
    }
    config.validate()?;

    init_tracing(&config.logging.level, config.logging.format);

    info!("Starting Item Catalog Server");
    info!(
        port = config.server.port,
        backend = ?config.store.backend,
        pool_concurrency = config.pool.concurrency,
        "Configuration loaded"
    );

    // 1. Item store
    let store = create_store(&config.store).await?;

    // 2. Worker pool, created once and shared by every batch run
    let pool = Arc::new(WorkerPool::new(config.pool.name.clone(), config.pool.concurrency));

    // 3. Batch processor with the process-wide shutdown signal
    let cancellation = CancellationToken::new();
    let settings = BatchSettings {
        processing_delay: config.batch.processing_delay(),
        jitter: config.batch.jitter(),
    };
    let processor = Arc::new(
        BatchProcessor::new(store.clone(), pool.clone(), settings)
            .with_cancellation(cancellation.clone()),
    );

    // 4. Metrics recorder
    let prometheus = PrometheusBuilder::new().install_recorder()?;

    // 5. Router
    let app = create_router(AppState::new(store, processor))
        .route("/metrics", get(move || {
            let prometheus = prometheus.clone();
            async move { prometheus.render() }
        }))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let addr = config.server.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("Item Catalog Server listening on http://{}", addr);
    info!("Swagger UI available at http://{}/swagger-ui", addr);

    let shutdown_pool = pool.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutdown signal received, cancelling batch work...");
            cancellation.cancel();
            shutdown_pool.close();
        })
        .await?;

    info!(completed_tasks = pool.stats().completed_tasks, "Item Catalog Server shutdown complete");
    Ok(())
}

async fn create_store(settings: &StoreSettings) -> Result<Arc<dyn ItemStore>> {
    match settings.backend {
        StoreBackend::Memory => {
            info!("Item store using in-memory map");
            Ok(Arc::new(InMemoryItemStore::new()))
        }
        StoreBackend::Sqlite => {
            let url = store_url(settings, "sqlite")?;
            // Each in-memory SQLite connection is its own database
            let default_connections = if url.contains(":memory:") { 1 } else { 5 };
            let pool = SqlitePoolOptions::new()
                .max_connections(settings.max_connections.unwrap_or(default_connections))
                .connect(url)
                .await?;
            let store = SqliteItemStore::new(pool);
            store.init_schema().await?;
            info!("Item store using SQLite: {}", url);
            Ok(Arc::new(store))
        }
        StoreBackend::Postgres => {
            let url = store_url(settings, "postgres")?;
            let pool = PgPoolOptions::new()
                .max_connections(settings.max_connections.unwrap_or(10))
                .connect(url)
                .await?;
            let store = PostgresItemStore::new(pool);
            store.init_schema().await?;
            info!("Item store using PostgreSQL");
            Ok(Arc::new(store))
        }
    }
}

fn store_url<'a>(settings: &'a StoreSettings, backend: &str) -> Result<&'a str> {
    settings
        .url
        .as_deref()
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("IC_STORE_URL required for {}", backend))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
