//! 管道指标收集模块
//!
//! 自由函数写入全局 Prometheus recorder；聚合器在内存中保留同样的
//! 数字，运行结束时无需抓取即可打印摘要。

use std::collections::HashMap;

use metrics::{counter, gauge, histogram};

/// 记录一个成功处理完的窗口
///
/// 在批次分发完成、水位线前进之后调用。
pub fn record_window_processed(device_id: &str, fetched: u64, accepted: u64, window_seconds: f64) {
    // 窗口计数器
    counter!("collector_windows_processed_total", "device" => device_id.to_string()).increment(1);
    counter!("collector_events_accepted_total", "device" => device_id.to_string())
        .increment(accepted);
    if fetched > accepted {
        counter!("collector_events_rejected_total", "device" => device_id.to_string())
            .increment(fetched - accepted);
    }
    // 窗口跨度 (秒)
    histogram!("collector_window_span_seconds").record(window_seconds);
    gauge!("collector_last_window_records", "device" => device_id.to_string()).set(fetched as f64);
}

/// 记录一次设备级失败（时钟、抓取或 sink）
///
/// 窗口会在下一个 tick 重试；这里只统计失败的尝试。
pub fn record_device_failure(device_id: &str) {
    counter!("collector_device_failures_total", "device" => device_id.to_string()).increment(1);
}

/// 单次运行的窗口结果内存聚合
#[derive(Debug, Clone, Default)]
pub struct WindowMetricsAggregator {
    /// 完整处理的窗口数（已分发且水位线已前进）
    pub windows_processed: u64,

    /// 所有页定位到的原始记录数
    pub records_fetched: u64,

    /// 通过过滤、送达 sinks 的事件数
    pub events_accepted: u64,

    /// 被过滤拒绝的事件数
    pub events_rejected: u64,

    /// 设备级失败次数（窗口下个 tick 重试）
    pub device_failures: u64,

    /// 窗口跨度统计 (秒)
    pub span_seconds: RunningStats,

    /// 每台设备处理的窗口数
    pub device_windows: HashMap<String, u64>,

    /// 每台设备的失败次数
    pub device_failure_counts: HashMap<String, u64>,
}

impl WindowMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 累入一个处理完的窗口
    pub fn record_window(&mut self, device_id: &str, fetched: u64, accepted: u64, span_secs: f64) {
        self.windows_processed += 1;
        self.records_fetched += fetched;
        self.events_accepted += accepted;
        self.events_rejected += fetched.saturating_sub(accepted);
        self.span_seconds.push(span_secs);
        *self.device_windows.entry(device_id.to_string()).or_insert(0) += 1;
    }

    /// 累入一次设备失败
    pub fn record_failure(&mut self, device_id: &str) {
        self.device_failures += 1;
        *self
            .device_failure_counts
            .entry(device_id.to_string())
            .or_insert(0) += 1;
    }

    /// 生成用于汇报的快照
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            windows_processed: self.windows_processed,
            records_fetched: self.records_fetched,
            events_accepted: self.events_accepted,
            events_rejected: self.events_rejected,
            device_failures: self.device_failures,
            accept_rate: if self.records_fetched > 0 {
                self.events_accepted as f64 / self.records_fetched as f64 * 100.0
            } else {
                0.0
            },
            span_seconds: StatsSummary::from(&self.span_seconds),
            device_failure_counts: self.device_failure_counts.clone(),
        }
    }
}

/// 单次运行的聚合结果
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub windows_processed: u64,
    pub records_fetched: u64,
    pub events_accepted: u64,
    pub events_rejected: u64,
    pub device_failures: u64,
    pub accept_rate: f64,
    pub span_seconds: StatsSummary,
    pub device_failure_counts: HashMap<String, u64>,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Windows processed: {}", self.windows_processed)?;
        writeln!(f, "Records fetched: {}", self.records_fetched)?;
        writeln!(
            f,
            "Events accepted: {} ({:.1}%)",
            self.events_accepted, self.accept_rate
        )?;
        writeln!(f, "Events rejected: {}", self.events_rejected)?;
        writeln!(f, "Device failures: {}", self.device_failures)?;
        writeln!(f, "Window span (s): {}", self.span_seconds)?;

        if !self.device_failure_counts.is_empty() {
            writeln!(f, "Failures by device:")?;
            let mut devices: Vec<_> = self.device_failure_counts.iter().collect();
            devices.sort();
            for (device, count) in devices {
                writeln!(f, "  {device}: {count}")?;
            }
        }
        Ok(())
    }
}

/// [`RunningStats`] 的 min/max/mean 紧凑视图
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count(),
            min: stats.min(),
            max: stats.max(),
            mean: stats.mean(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1} (n={})",
                self.min, self.max, self.mean, self.count
            )
        }
    }
}

/// 样本流上的在线 mean/min/max
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
            self.mean += (value - self.mean) / self.count as f64;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        stats.push(300.0);
        stats.push(60.0);
        stats.push(900.0);

        assert_eq!(stats.count(), 3);
        assert!((stats.mean() - 420.0).abs() < 1e-10);
        assert!((stats.min() - 60.0).abs() < 1e-10);
        assert!((stats.max() - 900.0).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_counts() {
        let mut agg = WindowMetricsAggregator::new();
        agg.record_window("gate-a", 10, 8, 300.0);
        agg.record_window("gate-a", 5, 5, 300.0);
        agg.record_window("gate-b", 0, 0, 60.0);
        agg.record_failure("gate-b");

        assert_eq!(agg.windows_processed, 3);
        assert_eq!(agg.records_fetched, 15);
        assert_eq!(agg.events_accepted, 13);
        assert_eq!(agg.events_rejected, 2);
        assert_eq!(agg.device_windows.get("gate-a"), Some(&2));
        assert_eq!(agg.device_failure_counts.get("gate-b"), Some(&1));
    }

    #[test]
    fn test_summary_display() {
        let mut agg = WindowMetricsAggregator::new();
        agg.record_window("gate-a", 4, 3, 300.0);
        let summary = agg.summary();
        assert!((summary.accept_rate - 75.0).abs() < 1e-10);

        let text = summary.to_string();
        assert!(text.contains("Windows processed: 1"));
        assert!(text.contains("75.0%"));
    }

    #[test]
    fn test_empty_summary() {
        let summary = WindowMetricsAggregator::new().summary();
        assert_eq!(summary.accept_rate, 0.0);
        assert_eq!(summary.span_seconds.to_string(), "N/A");
    }
}
