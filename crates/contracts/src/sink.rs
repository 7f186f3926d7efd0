//! EventSink trait - Dispatcher output interface
//!
//! Defines the abstract interface for sinks.

use crate::{CanonicalEvent, ContractError};

/// Event output trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(EventSink: Send)]
pub trait LocalEventSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Whether the sink absorbs duplicate deliveries on its own (for
    /// example via a unique constraint). Idempotent sinks allow the
    /// pipeline to re-dispatch a window after a partial failure without
    /// producing duplicate rows.
    fn is_idempotent(&self) -> bool;

    /// Write one batch of accepted events
    ///
    /// # Errors
    /// Returns write error (should include context); a duplicate delivery
    /// absorbed by an idempotent sink is not an error
    async fn write_batch(&mut self, events: &[CanonicalEvent]) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
