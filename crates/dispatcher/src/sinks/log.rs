//! LogSink - logs batch summaries via tracing

use contracts::{CanonicalEvent, ContractError, EventSink};
use tracing::{debug, info, instrument};

/// Sink that logs accepted batches for debugging
#[derive(Debug)]
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl EventSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_idempotent(&self) -> bool {
        // re-delivery produces duplicate log lines but no durable rows
        true
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, events),
        fields(sink = %self.name, count = events.len())
    )]
    async fn write_batch(&mut self, events: &[CanonicalEvent]) -> Result<(), ContractError> {
        info!(sink = %self.name, count = events.len(), "batch received");
        for event in events {
            debug!(sink = %self.name, event = %event.brief(), "event");
        }
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        // Nothing to flush for log sink
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}
