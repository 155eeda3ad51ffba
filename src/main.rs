//! Campaign Jobs server: resumable charge campaign scheduler.
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use campaign_core::config::AppConfig;
use campaign_core::error::AppError;
use campaign_database::DatabasePool;
use campaign_database::repositories::{
    ExpiredRetryRepository, JobRepository, TransactionRepository,
};
use campaign_queue::redis::{RedisClient, RedisPublisher};
use campaign_worker::notifier::CompletionNotifier;
use campaign_worker::{JobContext, JobScheduler, PlannedPoller, Reaper, catalog};

#[derive(Debug, Parser)]
#[command(name = "campaign-jobs-server", version, about)]
struct Cli {
    /// Base configuration file, without extension.
    #[arg(long, default_value = "config/default")]
    config: String,

    /// Environment overlay loaded next to the base file.
    #[arg(long, env = "CAMPAIGN_ENV", default_value = "development")]
    env: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.config, &cli.env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(config = %cli.config, env = %cli.env, "Configuration loaded");

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!(
        app = %config.app_name,
        "Starting Campaign Jobs v{}",
        env!("CARGO_PKG_VERSION")
    );

    // ── Step 1: Data directories ─────────────────────────────────
    for dir in [&config.jobs.injections_path, &config.jobs.log_path] {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| AppError::internal(format!("Failed to create dir '{}': {}", dir, e)))?;
    }

    // ── Step 2: Database connection + migrations ─────────────────
    tracing::info!("Connecting to database...");
    let db = DatabasePool::connect(&config.database).await?;
    if config.database.run_migrations {
        tracing::info!("Running database migrations...");
        campaign_database::migration::run_migrations(db.pool()).await?;
        tracing::info!("Database migrations complete");
    }

    // ── Step 3: Charge queue ─────────────────────────────────────
    tracing::info!("Connecting to charge queue...");
    let redis = RedisClient::connect(&config.queue).await?;
    let publisher = Arc::new(RedisPublisher::new(redis, &config.queue.charge_queue));

    // ── Step 4: Repositories, catalog, notifier ──────────────────
    let pool = db.pool().clone();
    let jobs = Arc::new(JobRepository::new(pool.clone(), &config.database));
    let ledger = Arc::new(TransactionRepository::new(pool.clone(), &config.database));
    let retries = Arc::new(ExpiredRetryRepository::new(pool, &config.database));
    let service_catalog = catalog::from_config(&config.catalog)?;
    let notifier = CompletionNotifier::new(&config.jobs.callback_url)?;

    // ── Step 5: Scheduler and background loops ───────────────────
    let ctx = Arc::new(JobContext::new(
        jobs,
        ledger,
        retries,
        publisher,
        service_catalog,
        notifier,
        config.jobs.clone(),
    ));
    let scheduler = Arc::new(JobScheduler::new(ctx));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reaper = Reaper::new(Arc::clone(&scheduler), config.jobs.reaper_interval());
    let reaper_cancel = shutdown_rx.clone();
    let reaper_handle = tokio::spawn(async move {
        reaper.run(reaper_cancel).await;
    });

    let poller_handle = if config.jobs.planned_enabled {
        let poller = PlannedPoller::new(
            Arc::clone(&scheduler),
            config.jobs.planned_period(),
            config.jobs.planned_grace_seconds,
        );
        let poller_cancel = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            poller.run(poller_cancel).await;
        }))
    } else {
        tracing::info!("Planned poller disabled");
        None
    };

    // ── Step 6: HTTP server ──────────────────────────────────────
    let app = campaign_api::build_router(campaign_api::AppState::new(
        Arc::clone(&scheduler),
        &config.app_name,
    ));

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("Campaign Jobs listening on {}", addr);

    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, starting graceful shutdown...");
        let _ = shutdown_tx.send(true);
    });

    server
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    // ── Step 7: Stop runners and background loops ────────────────
    scheduler.shutdown().await;

    let grace = std::time::Duration::from_secs(config.server.shutdown_grace_seconds);
    let _ = tokio::time::timeout(grace, reaper_handle).await;
    if let Some(handle) = poller_handle {
        let _ = tokio::time::timeout(grace, handle).await;
    }

    db.close().await;
    tracing::info!("Campaign Jobs shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
