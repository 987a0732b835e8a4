//! # Stillframe Server
//!
//! Thumbnail trigger and dispatch service for user-generated video.
//!
//! Upstream pipelines report transcoding and storage-migration status per
//! asset; the server turns readiness edges into render jobs, hands them to a
//! bounded dispatch worker, and exposes a maintenance surface (stuck view,
//! backfill) for everything the automatic path missed.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stillframe_core::MIGRATOR;
use stillframe_core::config::{ConfigStore, InMemoryConfigStore, PostgresConfigStore};
use stillframe_core::dispatch::HttpDispatchClient;
use stillframe_core::store::{AssetStore, InMemoryAssetStore, PostgresAssetStore};
use stillframe_core::worker::{DispatchQueue, DispatchWorker};

use stillframe_server::infra::config::Config;
use stillframe_server::{AppState, routes};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "stillframe-server")]
#[command(about = "Thumbnail trigger and dispatch service for user-generated video")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(subcommand)]
    Db(DbCommand),
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Apply database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = Arc::new(Config::from_env());

    if let Some(Command::Db(DbCommand::Migrate)) = cli.command {
        return run_db_migrate(&config).await;
    }

    run_server(config).await
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run_db_migrate(config: &Config) -> anyhow::Result<()> {
    let url = config
        .database
        .url
        .as_deref()
        .context("DATABASE_URL must be set to run migrations")?;
    let pool = connect_pool(url).await?;
    MIGRATOR
        .run(&pool)
        .await
        .context("database migration failed")?;
    info!("database migrations applied");
    Ok(())
}

async fn connect_pool(url: &str) -> anyhow::Result<sqlx::PgPool> {
    PgPoolOptions::new()
        .max_connections(16)
        .acquire_timeout(Duration::from_secs(5))
        .connect(url)
        .await
        .context("failed to connect to PostgreSQL")
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    let (store, config_store): (Arc<dyn AssetStore>, Arc<dyn ConfigStore>) =
        match config.database.url.as_deref() {
            Some(url) => {
                let pool = connect_pool(url).await?;
                info!("connected to PostgreSQL");
                MIGRATOR
                    .run(&pool)
                    .await
                    .context("database migration failed")?;
                let store: Arc<dyn AssetStore> =
                    Arc::new(PostgresAssetStore::new(pool.clone()));
                let config_store: Arc<dyn ConfigStore> =
                    Arc::new(PostgresConfigStore::new(pool));
                (store, config_store)
            }
            None => {
                warn!("DATABASE_URL not set, running on in-memory stores (state is not persisted)");
                let store: Arc<dyn AssetStore> = Arc::new(InMemoryAssetStore::new());
                let config_store: Arc<dyn ConfigStore> = Arc::new(InMemoryConfigStore::new());
                (store, config_store)
            }
        };

    if config.auth.pipeline_token.is_none() {
        warn!("STILLFRAME_PIPELINE_TOKEN not set, pipeline routes will reject every request");
    }
    if config.auth.operator_token.is_none() {
        warn!("STILLFRAME_OPERATOR_TOKEN not set, maintenance routes will reject every request");
    }

    let shutdown = CancellationToken::new();

    let (queue, rx) = DispatchQueue::bounded(config.queue_capacity);
    let client = Arc::new(HttpDispatchClient::new(config_store.clone())?);
    let worker_handle =
        DispatchWorker::new(rx, client, store.clone(), shutdown.clone()).spawn();

    let state = AppState::new(store, config_store, queue, config.clone());
    let audit_handle = state.scanner.spawn_audit(shutdown.clone());

    let router = routes::create_app_router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "stillframe server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .context("server error")?;

    // The signal handler has already cancelled the token; wait for the
    // background tasks to drain.
    let _ = worker_handle.await;
    let _ = audit_handle.await;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                error!(error = %err, "failed to listen for shutdown signal");
            }
        }
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();
    info!("shutdown signal received");
}
