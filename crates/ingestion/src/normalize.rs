//! EventNormalizer - 原始厂商记录到标准化事件

use std::collections::HashMap;

use chrono::DateTime;
use contracts::{CanonicalEvent, CollectorBlueprint, DeviceDescriptor, Direction, RawRecord};
use serde_json::Value;

/// 按顺序尝试的时间字段名；各固件填充的字段不一致。
const TIME_FIELDS: &[&str] = &["time", "dateTime", "eventTime", "occurTime", "captureTime"];

/// 把一条原始记录映射为标准化结构，使用构造时解析好的
/// (设备优先、全局兜底) 映射表。
pub struct EventNormalizer {
    device_id: String,
    reader_direction: Option<HashMap<String, String>>,
    success_minor_codes: Option<Vec<i64>>,
}

impl EventNormalizer {
    pub fn new(blueprint: &CollectorBlueprint, device: &DeviceDescriptor) -> Self {
        Self {
            device_id: device.device_id(),
            reader_direction: blueprint.reader_direction(device).cloned(),
            success_minor_codes: blueprint.success_minor_codes(device).map(<[i64]>::to_vec),
        }
    }

    pub fn normalize(&self, raw: &RawRecord) -> CanonicalEvent {
        let time_raw = first_non_empty(raw, TIME_FIELDS);
        let event_time = time_raw
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok());

        let reader_no = get_i64(raw, "readerNo");
        let minor = get_i64(raw, "minor");

        let direction = match (&self.reader_direction, reader_no) {
            (Some(table), Some(reader)) => table
                .get(&reader.to_string())
                .map(|label| Direction::from_label(label))
                .unwrap_or_default(),
            _ => Direction::Unknown,
        };

        // success 需要同时有配置的码表和 minor 码；
        // 缺任何一个都是 "unknown"，绝不是 "failed"
        let success = match (self.success_minor_codes.as_deref(), minor) {
            (Some(codes), Some(minor)) => Some(codes.contains(&minor)),
            _ => None,
        };

        CanonicalEvent {
            event_time,
            // 即使无法解析也保留原始字符串
            event_time_raw: time_raw,
            device: self.device_id.clone(),
            direction,
            name: get_str(raw, "name"),
            employee_no: get_str(raw, "employeeNoString").or_else(|| get_str(raw, "employeeNo")),
            card_no: get_str(raw, "cardNo"),
            card_type: get_str(raw, "cardType"),
            door_no: get_i64(raw, "doorNo"),
            reader_no,
            major: get_i64(raw, "major"),
            minor,
            success,
            raw_payload: Value::Object(raw.clone()).to_string(),
        }
    }
}

/// 字符串字段，兼容渲染成文本的数字
fn get_str(raw: &RawRecord, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// 整数字段，兼容原生数字与数字字符串两种编码
fn get_i64(raw: &RawRecord, key: &str) -> Option<i64> {
    match raw.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn first_non_empty(raw: &RawRecord, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| get_str(raw, key))
}
