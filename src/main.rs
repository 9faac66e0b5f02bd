//! Cloudbox Server: multi-tenant file storage backend.
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use cloudbox_core::config::AppConfig;
use cloudbox_core::error::AppError;
use cloudbox_core::traits::storage::StorageBackend;
use cloudbox_database::{DatabasePool, Repositories};
use cloudbox_worker::{CronScheduler, UploadReaper};

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(name = "cloudbox-server", version, about = "Cloudbox file storage server")]
struct Args {
    /// Configuration overlay to load from `config/{env}.toml`.
    #[arg(long, env = "CLOUDBOX_ENV", default_value = "development")]
    env: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match AppConfig::load(&args.env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config, &args.env).await {
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
async fn run(config: AppConfig, env: &str) -> Result<(), AppError> {
    tracing::info!(env = %env, "Starting Cloudbox v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Repositories ─────────────────────────────────────
    let repos = open_repositories(&config).await?;

    // ── Step 2: Storage backend ──────────────────────────────────
    let storage = cloudbox_storage::connect(&config.storage).await?;
    if !storage.health_check().await? {
        tracing::warn!(backend = %config.storage.backend, "Storage backend is not reachable yet");
    }

    // ── Step 3: Background jobs ──────────────────────────────────
    let scheduler = if config.worker.enabled {
        Some(start_scheduler(&config, &repos, Arc::clone(&storage)).await?)
    } else {
        tracing::info!("Background worker disabled");
        None
    };

    // ── Step 4: HTTP server ──────────────────────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    let state = cloudbox_api::AppState::new(config, repos, storage);
    let app = cloudbox_api::build_app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;

    tracing::info!("Cloudbox server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, starting graceful shutdown...");
        })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    // ── Step 5: Stop background jobs ─────────────────────────────
    if let Some(mut scheduler) = scheduler {
        match tokio::time::timeout(grace, scheduler.shutdown()).await {
            Ok(result) => result?,
            Err(_) => tracing::warn!("Scheduler did not stop within the grace period"),
        }
    }

    tracing::info!("Cloudbox server shut down gracefully");
    Ok(())
}

/// Build the repositories named by `database.provider`.
async fn open_repositories(config: &AppConfig) -> Result<Repositories, AppError> {
    match config.database.provider.as_str() {
        "postgres" => {
            let db = DatabasePool::connect(&config.database).await?;
            if config.database.run_migrations {
                cloudbox_database::migration::run_migrations(db.pool()).await?;
            }
            Ok(Repositories::postgres(db.pool().clone()))
        }
        "memory" => {
            tracing::warn!("Using in-memory repositories; all data is lost on exit");
            Ok(Repositories::memory())
        }
        other => Err(AppError::configuration(format!(
            "Unknown database provider: '{other}'"
        ))),
    }
}

/// Register the pending-upload reaper and start the cron scheduler.
async fn start_scheduler(
    config: &AppConfig,
    repos: &Repositories,
    storage: Arc<dyn StorageBackend>,
) -> Result<CronScheduler, AppError> {
    let scheduler = CronScheduler::new().await?;
    let reaper = UploadReaper::new(Arc::clone(&repos.files), storage, &config.worker);
    scheduler
        .register_upload_reaper(reaper, &config.worker.reaper_cron)
        .await?;
    scheduler.start().await?;
    Ok(scheduler)
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
