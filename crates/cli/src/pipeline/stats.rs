//! Run statistics.

use std::time::Duration;

use observability::WindowMetricsAggregator;

/// Statistics from one pipeline run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Wall-clock duration of the run
    pub duration: Duration,

    /// Number of configured devices
    pub active_devices: usize,

    /// Number of sinks that received batches
    pub active_sinks: usize,

    /// Duplicate deliveries absorbed by idempotent sinks
    pub duplicates_skipped: u64,

    /// Per-window outcome aggregation
    pub window_metrics: WindowMetricsAggregator,
}

impl RunStats {
    pub fn new(active_devices: usize, active_sinks: usize) -> Self {
        Self {
            active_devices,
            active_sinks,
            ..Default::default()
        }
    }

    /// Accepted events per second over the whole run
    pub fn events_per_second(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.window_metrics.events_accepted as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print the run summary
    pub fn print_summary(&self) {
        println!("\n=== Collector Run Summary ===\n");
        println!("Duration: {:.2}s", self.duration.as_secs_f64());
        println!(
            "Devices: {}, Sinks: {}",
            self.active_devices, self.active_sinks
        );
        print!("{}", self.window_metrics.summary());
        println!("Duplicates skipped: {}", self.duplicates_skipped);
        println!("Throughput: {:.1} events/s", self.events_per_second());
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_per_second() {
        let mut stats = RunStats::new(1, 1);
        stats.window_metrics.record_window("gate-a", 10, 10, 300.0);
        stats.duration = Duration::from_secs(5);
        assert!((stats.events_per_second() - 2.0).abs() < 1e-10);

        // zero duration stays finite
        stats.duration = Duration::ZERO;
        assert_eq!(stats.events_per_second(), 0.0);
    }
}
