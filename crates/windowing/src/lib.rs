//! # Windowing
//!
//! 时间窗口游标模块。
//!
//! 负责：
//! - 由设备水位线与当前时钟计算下一个抓取窗口
//! - 空窗口的自适应加宽
//! - 有界历史拉取的按天切分

mod cursor;
mod partition;

pub use cursor::{next_window, widened, CursorConfig, WatermarkStore, WATERMARK_GAP};
pub use partition::partition_by_day;
