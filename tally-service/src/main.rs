//! Tally Service Main Entry Point
//!
//! Starts the member count reconciler, keeps retrying Redis when it was not
//! reachable at start-up, and shuts both down on Ctrl+C or SIGTERM.

use dotenv::dotenv;
use tally_service::config::reconnect_cache;
use tally_service::telemetry::init_tracing;
use tally_service::{Dependencies, ServiceError, Settings};
use tokio::sync::broadcast;
use tracing::{error, info};

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> Result<(), ServiceError> {
    // Load environment variables from .env file
    dotenv().ok();

    init_tracing()?;

    info!("Starting tally service");

    let settings = Settings::from_env()?;

    let deps = match Dependencies::new(&settings).await {
        Ok(deps) => {
            info!("Dependencies initialized successfully");
            deps
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            return Err(e);
        }
    };

    let (shutdown_tx, _) = broadcast::channel(1);

    let reconnect_handle = tokio::spawn(reconnect_cache(
        deps.cache_slot.clone(),
        settings.redis_url.clone(),
        settings.cache_connect_timeout,
        settings.cache_retry_interval,
        shutdown_tx.subscribe(),
    ));
    let reconciler_handle = tokio::spawn(deps.reconciler.run(shutdown_tx.subscribe()));

    shutdown_signal().await;
    info!("Received shutdown signal");
    let _ = shutdown_tx.send(());

    if let Err(e) = reconciler_handle.await {
        error!(error = %e, "Reconciler task failed");
    }
    if let Err(e) = reconnect_handle.await {
        error!(error = %e, "Cache reconnect task failed");
    }

    deps.pool.close().await;
    info!("Tally service shutdown complete");
    Ok(())
}
