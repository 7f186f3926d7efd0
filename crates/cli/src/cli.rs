//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Access-control event collector
#[derive(Parser, Debug)]
#[command(
    name = "acs-collector",
    author,
    version,
    about = "Access-control event collector",
    long_about = "Retrieves access-control events from vendor devices over HTTP,\n\
                  normalizes them into one canonical schema, filters per policy,\n\
                  and dispatches accepted events to the configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "ACS_COLLECTOR_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "ACS_COLLECTOR_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bounded historical pull over an explicit time range
    Pull(PullArgs),

    /// Unbounded poll loop advancing the per-device watermark every tick
    Poll(PollArgs),

    /// Low-latency streaming loop that keeps close to the device clock
    Stream(StreamArgs),

    /// Print the resolved effective configuration
    Config(ConfigArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),
}

/// Arguments shared by every command that runs the pipeline
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "config.toml",
        env = "ACS_COLLECTOR_CONFIG"
    )]
    pub config: PathBuf,

    /// Prometheus metrics port (0 = disabled)
    #[arg(long, default_value = "0", env = "ACS_COLLECTOR_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `pull` command
#[derive(Parser, Debug, Clone)]
pub struct PullArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Range start, RFC 3339 (e.g. 2025-09-01T00:00:00+08:00)
    pub start: String,

    /// Range end, RFC 3339, exclusive
    pub end: String,
}

/// Arguments for the `poll` command
#[derive(Parser, Debug, Clone)]
pub struct PollArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Stop after this many ticks (0 = run until shutdown)
    #[arg(long, default_value = "0", env = "ACS_COLLECTOR_MAX_TICKS")]
    pub max_ticks: u64,
}

/// Arguments for the `stream` command
#[derive(Parser, Debug, Clone)]
pub struct StreamArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Stop after this many catch-up passes (0 = run until shutdown)
    #[arg(long, default_value = "0", env = "ACS_COLLECTOR_MAX_TICKS")]
    pub max_ticks: u64,
}

/// Arguments for the `config` command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output as TOML instead of JSON
    #[arg(long)]
    pub toml: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}
