//! Tokenward server: token lifecycle stores and background maintenance.
//!
//! Main entry point that wires all crates together and runs until a
//! shutdown signal arrives.

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use tokenward_auth::{SessionCleanup, SystemClock, TokenLifecycleManager};
use tokenward_cache::CacheManager;
use tokenward_core::config::AppConfig;
use tokenward_core::error::AppError;
use tokenward_core::traits::cache::CacheProvider;
use tokenward_database::{DatabasePool, migration};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let base =
        std::env::var("TOKENWARD_CONFIG").unwrap_or_else(|_| "config/default".to_string());
    let env = std::env::var("TOKENWARD_ENV").unwrap_or_else(|_| "development".to_string());

    AppConfig::load_from(&base, &env)
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
    tracing::info!("Starting Tokenward v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Database connection + migrations ─────────────────
    let db = DatabasePool::connect(&config.database).await?;
    migration::run_migrations(db.pool()).await?;

    // ── Step 2: Key-value store ───────────────────────────────────
    let cache = CacheManager::new(&config.cache).await?;
    cache.health_check().await?;

    // ── Step 3: Token lifecycle ───────────────────────────────────
    let manager = TokenLifecycleManager::new(
        &config.auth,
        &config.session,
        cache.provider(),
        Arc::new(db.sessions()),
        Arc::new(db.identities()),
        Arc::new(SystemClock),
    );
    tracing::info!(
        policy = %config.auth.revocation_policy,
        access_ttl_secs = config.auth.access_ttl_seconds,
        refresh_ttl_secs = config.auth.refresh_ttl_seconds,
        cache = %config.cache.provider,
        "Token lifecycle ready"
    );

    // ── Step 4: Background sweeper ────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let cleanup = SessionCleanup::new(
        manager.sessions().clone(),
        config.session.cleanup_interval_seconds,
    );
    let sweeper = tokio::spawn(async move { cleanup.run(shutdown_rx).await });

    // ── Step 5: Wait for shutdown ─────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, stopping");

    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper.await {
        tracing::error!(error = %e, "Session cleanup task failed");
    }
    db.close().await;

    tracing::info!("Tokenward stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
