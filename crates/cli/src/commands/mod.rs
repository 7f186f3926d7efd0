//! Command implementations.

mod config;
mod poll;
mod pull;
mod stream;
mod validate;

pub use config::run_config;
pub use poll::run_poll;
pub use pull::run_pull;
pub use stream::run_stream;
pub use validate::run_validate;

use std::path::Path;

use anyhow::{Context, Result};
use contracts::CollectorBlueprint;
use tokio::sync::watch;
use tracing::info;

use crate::cli::CommonArgs;

/// Load, validate, and log the configuration for a pipeline command
fn load_blueprint(path: &Path) -> Result<CollectorBlueprint> {
    info!(config = %path.display(), "Loading configuration");

    if !path.exists() {
        anyhow::bail!("Configuration file not found: {}", path.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    info!(
        devices = blueprint.devices.len(),
        sinks = blueprint.sinks.len(),
        page_size = blueprint.fetch.page_size,
        "Configuration loaded"
    );

    Ok(blueprint)
}

/// Start the Prometheus exporter when a port is configured
fn init_metrics(args: &CommonArgs) -> Result<()> {
    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
        info!(port = args.metrics_port, "Metrics endpoint available");
    }
    Ok(())
}

/// Spawn the Ctrl+C / SIGTERM listener.
///
/// The returned receiver flips to `true` once; pipeline loops check it
/// between windows so a page fetch is never interrupted mid-flight.
fn spawn_shutdown_listener() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::warn!("Received shutdown signal, stopping after current window");
        let _ = tx.send(true);
    });

    rx
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
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
