//! `pull` command implementation.

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use tracing::info;

use crate::cli::PullArgs;
use crate::pipeline::Poller;

use super::{init_metrics, load_blueprint};

/// Execute the `pull` command: one bounded historical run
pub async fn run_pull(args: &PullArgs) -> Result<()> {
    let start = parse_bound(&args.start, "start")?;
    let end = parse_bound(&args.end, "end")?;
    if end <= start {
        anyhow::bail!("range end {} must be after start {}", args.end, args.start);
    }

    let blueprint = load_blueprint(&args.common.config)?;
    init_metrics(&args.common)?;

    info!(start = %args.start, end = %args.end, "Starting historical pull");

    let poller = Poller::new(&blueprint).context("Failed to build pipeline")?;
    let stats = poller.run_pull(start, end).await?;

    stats.print_summary();
    Ok(())
}

fn parse_bound(value: &str, which: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value.trim())
        .with_context(|| format!("invalid {which} '{value}': expected RFC 3339"))
}
