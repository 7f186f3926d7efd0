//! 窗口游标计算。

use std::collections::HashMap;

use chrono::{DateTime, Duration, FixedOffset};
use contracts::{FetchConfig, TimeWindow};

/// 已处理窗口与下一个水位线之间插入的间隔。
///
/// 多出的一秒避免边界记录被相邻两个窗口各取一次。恰好落进间隔内的
/// 记录会丢失；这是窗口协议既定的 at-least-once/at-most-once 取舍，
/// 不是缺陷。
pub const WATERMARK_GAP: Duration = Duration::seconds(1);

/// 单一运行模式的游标参数
#[derive(Debug, Clone, Copy)]
pub struct CursorConfig {
    /// 首个窗口落后设备时钟的回溯量
    pub initial_backlog: Duration,
    /// 基础窗口长度
    pub slice: Duration,
    /// 加宽上限（基础切片的倍数）
    pub widen_factor: u32,
}

impl CursorConfig {
    /// poll 循环的参数
    pub fn poll(fetch: &FetchConfig) -> Self {
        let slice = Duration::minutes(fetch.poll_window_minutes.max(1));
        Self {
            initial_backlog: slice,
            slice,
            widen_factor: fetch.widen_factor.max(1),
        }
    }

    /// stream 循环的参数
    pub fn stream(fetch: &FetchConfig) -> Self {
        Self {
            initial_backlog: Duration::minutes(fetch.stream_backlog_minutes.max(1)),
            slice: Duration::minutes(fetch.stream_slice_minutes.max(1)),
            widen_factor: fetch.widen_factor.max(1),
        }
    }
}

/// 计算设备下一个待抓取窗口。
///
/// 尚无可抓取区间 (`end <= start`) 时返回 `None`；调用方必须跳过、
/// 不碰水位线，并在下个 tick 重试。
pub fn next_window(
    watermark: Option<DateTime<FixedOffset>>,
    device_now: DateTime<FixedOffset>,
    config: &CursorConfig,
) -> Option<TimeWindow> {
    let start = watermark.unwrap_or(device_now - config.initial_backlog);
    let end = (start + config.slice).min(device_now);
    let window = TimeWindow::new(start, end);
    if window.is_empty() {
        None
    } else {
        Some(window)
    }
}

/// 零记录切片的重试窗口。
///
/// 最多加宽到 `widen_factor` 个基础切片，不越过设备时钟，`start`
/// 也绝不后移。无更宽窗口可用时返回 `None`，空结果即成立。
pub fn widened(
    window: &TimeWindow,
    device_now: DateTime<FixedOffset>,
    config: &CursorConfig,
) -> Option<TimeWindow> {
    let ceiling = window.start + config.slice * config.widen_factor as i32;
    let end = ceiling.min(device_now);
    if end > window.end {
        Some(TimeWindow::new(window.start, end))
    } else {
        None
    }
}

/// 按设备划分的水位线存储。
///
/// 由编排循环持有的显式键值映射；每台设备的条目只会被处理该设备的
/// 执行单元访问。
#[derive(Debug, Default)]
pub struct WatermarkStore {
    marks: HashMap<String, DateTime<FixedOffset>>,
}

impl WatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设备最后处理到的位置（如有）
    pub fn get(&self, device_id: &str) -> Option<DateTime<FixedOffset>> {
        self.marks.get(device_id).copied()
    }

    /// 记录窗口处理成功：水位线移到窗口结束后一秒
    pub fn advance(&mut self, device_id: &str, window_end: DateTime<FixedOffset>) {
        self.marks
            .insert(device_id.to_string(), window_end + WATERMARK_GAP);
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(rfc3339: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap()
    }

    fn config() -> CursorConfig {
        CursorConfig {
            initial_backlog: Duration::minutes(5),
            slice: Duration::minutes(5),
            widen_factor: 3,
        }
    }

    #[test]
    fn test_first_window_backs_off_from_device_now() {
        let now = at("2025-09-29T12:00:00+08:00");
        let w = next_window(None, now, &config()).unwrap();
        assert_eq!(w.start, at("2025-09-29T11:55:00+08:00"));
        assert_eq!(w.end, now);
    }

    #[test]
    fn test_window_clamped_to_device_now() {
        let now = at("2025-09-29T12:02:00+08:00");
        let mark = at("2025-09-29T12:00:00+08:00");
        let w = next_window(Some(mark), now, &config()).unwrap();
        assert_eq!(w.start, mark);
        assert_eq!(w.end, now);
    }

    #[test]
    fn test_no_window_when_caught_up() {
        let now = at("2025-09-29T12:00:00+08:00");
        // watermark already past the device clock (the +1s gap can do this)
        assert!(next_window(Some(now), now, &config()).is_none());
        assert!(next_window(Some(now + Duration::seconds(1)), now, &config()).is_none());
    }

    #[test]
    fn test_watermark_sequence_is_contiguous_with_gap() {
        let mut store = WatermarkStore::new();
        let now = at("2025-09-29T12:00:00+08:00");
        let cfg = config();

        let w1 = next_window(store.get("d"), now, &cfg).unwrap();
        store.advance("d", w1.end);

        let later = now + Duration::minutes(10);
        let w2 = next_window(store.get("d"), later, &cfg).unwrap();
        assert_eq!(w2.start, w1.end + WATERMARK_GAP);
    }

    #[test]
    fn test_widened_respects_ceiling_and_clock() {
        let cfg = config();
        let start = at("2025-09-29T12:00:00+08:00");
        let w = TimeWindow::new(start, start + Duration::minutes(5));

        // plenty of room: widen to 3x slice
        let far_now = start + Duration::hours(1);
        let wide = widened(&w, far_now, &cfg).unwrap();
        assert_eq!(wide.start, w.start);
        assert_eq!(wide.end, start + Duration::minutes(15));

        // clock limits the widening
        let near_now = start + Duration::minutes(7);
        let wide = widened(&w, near_now, &cfg).unwrap();
        assert_eq!(wide.end, near_now);

        // no room at all: stay with the empty result
        assert!(widened(&w, w.end, &cfg).is_none());
    }

    #[test]
    fn test_store_is_per_device() {
        let mut store = WatermarkStore::new();
        let t = at("2025-09-29T12:00:00+08:00");
        store.advance("a", t);
        assert_eq!(store.get("a"), Some(t + WATERMARK_GAP));
        assert_eq!(store.get("b"), None);
        assert_eq!(store.len(), 1);
    }
}
