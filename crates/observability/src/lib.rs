//! # Observability
//!
//! 可观测性模块：Prometheus 指标端点与管道计数器。
//!
//! Tracing 初始化放在 CLI（输出格式是 CLI 的关注点）；
//! 本 crate 负责指标导出器与管道循环使用的记录辅助函数。

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;

// Re-exports
pub use crate::metrics::{
    record_device_failure, record_window_processed, RunSummary, WindowMetricsAggregator,
};

/// 在指定端口初始化 Prometheus 导出器
///
/// 每个进程最多调用一次；recorder 是全局的。
pub fn init_metrics_only(port: u16) -> Result<()> {
    let builder = PrometheusBuilder::new();
    builder
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port = port, "Prometheus metrics endpoint initialized");
    Ok(())
}
