//! `poll` command implementation.

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::PollArgs;
use crate::pipeline::Poller;

use super::{init_metrics, load_blueprint, spawn_shutdown_listener};

/// Execute the `poll` command: the unbounded watermark-advancing loop
pub async fn run_poll(args: &PollArgs) -> Result<()> {
    let blueprint = load_blueprint(&args.common.config)?;
    init_metrics(&args.common)?;

    let max_ticks = (args.max_ticks > 0).then_some(args.max_ticks);
    let shutdown = spawn_shutdown_listener();

    info!(
        tick_secs = blueprint.fetch.tick_secs,
        max_ticks = ?max_ticks,
        "Starting poll loop"
    );

    let poller = Poller::new(&blueprint).context("Failed to build pipeline")?;
    let stats = poller.run_poll(shutdown, max_ticks).await?;

    stats.print_summary();
    info!("Poll loop finished");
    Ok(())
}
