//! CanonicalEvent - EventNormalizer 输出
//!
//! 厂商无关的标准化门禁事件结构。

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::{Deserialize, Serialize};

/// 通行方向，由 reader -> direction 映射表得出
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Direction {
    /// 进门读卡器
    In,
    /// 出门读卡器
    Out,
    /// 未配置映射表，或读卡器没有对应条目
    Unknown,
    /// 站点自定义标签，原样保留
    Other(String),
}

impl Direction {
    /// 解析映射表标签。已知值不区分大小写，其余原样保留。
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "IN" => Self::In,
            "OUT" => Self::Out,
            "UNKNOWN" | "" => Self::Unknown,
            _ => Self::Other(label.trim().to_string()),
        }
    }

    /// 规范字符串形式
    pub fn as_str(&self) -> &str {
        match self {
            Self::In => "IN",
            Self::Out => "OUT",
            Self::Unknown => "UNKNOWN",
            Self::Other(label) => label,
        }
    }

    /// 与 allow-list 条目比较，不区分大小写
    pub fn matches(&self, label: &str) -> bool {
        self.as_str().eq_ignore_ascii_case(label.trim())
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl Default for Direction {
    fn default() -> Self {
        Self::Unknown
    }
}

impl From<String> for Direction {
    fn from(value: String) -> Self {
        Self::from_label(&value)
    }
}

impl From<Direction> for String {
    fn from(value: Direction) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一条标准化门禁事件
///
/// 每条原始记录生成一次，之后不可变；所属批次交给 dispatcher 后即丢弃。
#[derive(Debug, Clone, Default)]
pub struct CanonicalEvent {
    /// 解析后的事件时间；原始值无法解析时为 `None`
    pub event_time: Option<DateTime<FixedOffset>>,
    /// 收到的原始时间字符串，即使无法解析也保留
    pub event_time_raw: Option<String>,
    /// 来源设备标识（配置的 name 或 `host:port`）
    pub device: String,
    /// 总是有值；默认 [`Direction::Unknown`]
    pub direction: Direction,
    pub name: Option<String>,
    pub employee_no: Option<String>,
    pub card_no: Option<String>,
    pub card_type: Option<String>,
    pub door_no: Option<i64>,
    pub reader_no: Option<i64>,
    pub major: Option<i64>,
    pub minor: Option<i64>,
    /// `None` 表示未配置成功码表（不是 "失败"）
    pub success: Option<bool>,
    /// 原始记录的完整序列化文本，供审计与下游使用
    pub raw_payload: String,
}

impl CanonicalEvent {
    /// 事件时间的最佳文本形式：解析成功则 RFC 3339，否则原始字符串
    pub fn event_time_repr(&self) -> Option<String> {
        self.event_time
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .or_else(|| self.event_time_raw.clone())
    }

    /// 既无时间也无任何身份字段；多数固件上这类记录是噪声
    pub fn is_blank(&self) -> bool {
        self.event_time.is_none()
            && self.event_time_raw.is_none()
            && self.name.is_none()
            && self.employee_no.is_none()
            && self.card_no.is_none()
    }

    /// 单行摘要，用于重复跳过日志
    pub fn brief(&self) -> String {
        format!(
            "[{}] {} {} {}",
            self.event_time_repr().unwrap_or_else(|| "-".into()),
            self.device,
            self.direction,
            self.card_no.as_deref().unwrap_or("-"),
        )
    }
}
