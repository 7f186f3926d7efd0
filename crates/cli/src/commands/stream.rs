//! `stream` command implementation.

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::StreamArgs;
use crate::pipeline::Poller;

use super::{init_metrics, load_blueprint, spawn_shutdown_listener};

/// Execute the `stream` command: the low-latency catch-up loop
pub async fn run_stream(args: &StreamArgs) -> Result<()> {
    let blueprint = load_blueprint(&args.common.config)?;
    init_metrics(&args.common)?;

    let max_ticks = (args.max_ticks > 0).then_some(args.max_ticks);
    let shutdown = spawn_shutdown_listener();

    info!(
        slice_minutes = blueprint.fetch.stream_slice_minutes,
        lag_secs = blueprint.fetch.stream_lag_secs,
        max_ticks = ?max_ticks,
        "Starting stream loop"
    );

    let poller = Poller::new(&blueprint).context("Failed to build pipeline")?;
    let stats = poller.run_stream(shutdown, max_ticks).await?;

    stats.print_summary();
    info!("Stream loop finished");
    Ok(())
}
