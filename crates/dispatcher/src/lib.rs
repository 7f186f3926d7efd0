//! # Dispatcher
//!
//! 事件分发模块。
//!
//! 负责：
//! - 消费已通过过滤的事件批次
//! - Fan-out 到多个 sinks（顺序执行，非事务）
//! - 任一 sink 失败时仍尝试其余 sinks，最后把首个错误交还调用方，
//!   让窗口在水位线不前进的情况下重试；幂等 sink 吸收由此产生的重投

mod dispatcher;
mod error;
mod metrics;
mod sinks;

pub use dispatcher::{create_dispatcher, SinkDispatcher};
pub use error::DispatcherError;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{AnySink, DatabaseSink, HttpBatchSink, LogSink};
