//! Dispatcher - sequential fan-out to sinks

use std::sync::Arc;

use metrics::counter;
use tracing::{error, info, instrument};

use contracts::{CanonicalEvent, ContractError, EventSink, SinkConfig, SinkType};

use crate::error::DispatcherError;
use crate::metrics::{MetricsSnapshot, SinkMetrics};
use crate::sinks::{AnySink, DatabaseSink, HttpBatchSink, LogSink};

#[derive(Debug)]
struct SinkEntry {
    sink: AnySink,
    metrics: Arc<SinkMetrics>,
}

/// Fans accepted batches out to all enabled sinks.
///
/// Fan-out is sequential and non-transactional: a failing sink never stops
/// the remaining sinks from receiving the batch, and the first error is
/// reported once every sink has been attempted.
#[derive(Debug)]
pub struct SinkDispatcher {
    entries: Vec<SinkEntry>,
}

impl SinkDispatcher {
    /// Create a dispatcher over pre-built sinks (also used by tests)
    pub fn with_sinks(sinks: Vec<AnySink>) -> Self {
        let entries = sinks
            .into_iter()
            .map(|sink| SinkEntry {
                sink,
                metrics: Arc::new(SinkMetrics::new()),
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.entries
            .iter()
            .map(|e| (e.sink.name().to_string(), e.metrics.snapshot()))
            .collect()
    }

    /// Total duplicate deliveries absorbed across sinks
    pub fn duplicates_skipped(&self) -> u64 {
        self.entries.iter().map(|e| e.sink.duplicates_skipped()).sum()
    }

    /// Dispatch one batch to every sink.
    ///
    /// Returns the first sink error after all sinks ran; on error the caller
    /// must not advance its watermark, so the window is re-fetched and
    /// re-dispatched on the next tick.
    #[instrument(name = "dispatcher_dispatch", skip(self, batch), fields(count = batch.len()))]
    pub async fn dispatch(&mut self, batch: &[CanonicalEvent]) -> Result<(), DispatcherError> {
        if batch.is_empty() || self.entries.is_empty() {
            return Ok(());
        }

        let mut first_error: Option<ContractError> = None;
        for entry in &mut self.entries {
            match entry.sink.write_batch(batch).await {
                Ok(()) => {
                    entry.metrics.add_written(batch.len() as u64);
                    counter!("collector_events_dispatched_total").increment(batch.len() as u64);
                }
                Err(e) => {
                    entry.metrics.inc_failure_count();
                    counter!("collector_sink_failures_total").increment(1);
                    error!(sink = %entry.sink.name(), error = %e, "sink write failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Flush and close every sink
    pub async fn shutdown(mut self) {
        for entry in &mut self.entries {
            if let Err(e) = entry.sink.flush().await {
                error!(sink = %entry.sink.name(), error = %e, "flush failed on shutdown");
            }
            if let Err(e) = entry.sink.close().await {
                error!(sink = %entry.sink.name(), error = %e, "close failed on shutdown");
            }
        }
        info!("dispatcher shutdown complete");
    }
}

/// Create a dispatcher from sink configs
#[instrument(name = "dispatcher_create", skip(sink_configs), fields(sink_count = sink_configs.len()))]
pub fn create_dispatcher(sink_configs: &[SinkConfig]) -> Result<SinkDispatcher, DispatcherError> {
    let mut sinks = Vec::with_capacity(sink_configs.len());
    for config in sink_configs {
        sinks.push(create_sink(config)?);
    }
    info!(sinks = sinks.len(), "dispatcher created");
    Ok(SinkDispatcher::with_sinks(sinks))
}

/// Create one sink from configuration
fn create_sink(config: &SinkConfig) -> Result<AnySink, DispatcherError> {
    match config.sink_type {
        SinkType::Log => Ok(AnySink::Log(LogSink::new(&config.name))),
        SinkType::Database => DatabaseSink::from_params(&config.name, &config.params)
            .map(AnySink::Database)
            .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string())),
        SinkType::Http => HttpBatchSink::from_params(&config.name, &config.params)
            .map(AnySink::Http)
            .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string())),
    }
}
