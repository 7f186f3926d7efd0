//! Sink implementations

mod database;
mod http;
mod log;

pub use database::{DatabaseSink, DatabaseSinkConfig};
pub use http::{HttpBatchSink, HttpSinkConfig};
pub use log::LogSink;

use contracts::{CanonicalEvent, ContractError, EventSink};

/// Closed set of sink implementations.
///
/// The dispatcher owns sinks by value; a plain enum keeps the async sink
/// trait free of object-safety constraints.
#[derive(Debug)]
pub enum AnySink {
    Log(LogSink),
    Database(DatabaseSink),
    Http(HttpBatchSink),
}

impl AnySink {
    /// Duplicate deliveries the sink has absorbed so far
    pub fn duplicates_skipped(&self) -> u64 {
        match self {
            Self::Database(sink) => sink.duplicates_skipped(),
            _ => 0,
        }
    }
}

impl EventSink for AnySink {
    fn name(&self) -> &str {
        match self {
            Self::Log(sink) => sink.name(),
            Self::Database(sink) => sink.name(),
            Self::Http(sink) => sink.name(),
        }
    }

    fn is_idempotent(&self) -> bool {
        match self {
            Self::Log(sink) => sink.is_idempotent(),
            Self::Database(sink) => sink.is_idempotent(),
            Self::Http(sink) => sink.is_idempotent(),
        }
    }

    async fn write_batch(&mut self, events: &[CanonicalEvent]) -> Result<(), ContractError> {
        match self {
            Self::Log(sink) => sink.write_batch(events).await,
            Self::Database(sink) => sink.write_batch(events).await,
            Self::Http(sink) => sink.write_batch(events).await,
        }
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        match self {
            Self::Log(sink) => sink.flush().await,
            Self::Database(sink) => sink.flush().await,
            Self::Http(sink) => sink.flush().await,
        }
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        match self {
            Self::Log(sink) => sink.close().await,
            Self::Database(sink) => sink.close().await,
            Self::Http(sink) => sink.close().await,
        }
    }
}
