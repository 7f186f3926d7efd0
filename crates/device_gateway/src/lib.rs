//! # Device Gateway
//!
//! Per-device HTTP access: client construction honoring the configured
//! timeout and TLS policy, request building with basic credentials, and
//! device clock reads with a wall-clock fallback.

mod client;
mod clock;
mod error;

pub use client::{canonicalize_query_path, DeviceGateway};
pub use clock::DeviceClock;
pub use error::GatewayError;
