//! CollectorBlueprint - Config Loader 输出
//!
//! 描述完整的采集器配置：设备、抓取调度、映射表、过滤策略、输出路由。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 厂商默认历史事件端点 (ISAPI 门禁事件查询)
pub const DEFAULT_HISTORY_PATH: &str = "/ISAPI/AccessControl/AcsEvent";
/// 厂商默认设备时钟端点
pub const DEFAULT_TIME_PATH: &str = "/ISAPI/System/time";

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的采集器配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 轮询的设备列表
    pub devices: Vec<DeviceDescriptor>,

    /// 抓取与调度参数
    #[serde(default)]
    pub fetch: FetchConfig,

    /// 全局映射表 (设备级覆盖优先)
    #[serde(default)]
    pub mapping: MappingConfig,

    /// 全局过滤策略 (设备级覆盖优先)
    #[serde(default)]
    pub filter: FilterConfig,

    /// 输出路由配置
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// 一台门禁设备
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// 逻辑名称；缺省时以 `host:port` 作为设备 ID
    #[serde(default)]
    pub name: Option<String>,

    /// 设备地址
    pub host: String,

    /// 设备端口
    #[serde(default = "default_device_port")]
    pub port: u16,

    /// 使用 HTTPS
    #[serde(default)]
    pub https: bool,

    /// 接受自签名/不匹配证书 (仅 HTTPS)
    #[serde(default)]
    pub insecure_tls: bool,

    pub username: String,
    pub password: String,

    /// 设备级映射覆盖
    #[serde(default)]
    pub mapping: Option<MappingConfig>,

    /// 设备级过滤覆盖
    #[serde(default)]
    pub filter: Option<FilterConfig>,
}

fn default_device_port() -> u16 {
    80
}

impl DeviceDescriptor {
    /// 日志、水位线键与标准化事件共用的设备标识
    pub fn device_id(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("{}:{}", self.host, self.port),
        }
    }

    /// 构造请求用的 scheme + authority
    pub fn base_url(&self) -> String {
        let scheme = if self.https { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

/// 抓取与调度参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// 历史事件查询端点路径；未设置时用厂商默认值。
    /// 使用前会规范化：保证前导斜杠与 `format=json`。
    #[serde(default)]
    pub history_path: Option<String>,

    /// 搜索回退端点路径；默认与历史端点相同
    #[serde(default)]
    pub search_path: Option<String>,

    /// 设备时钟端点路径；未设置时用厂商默认值
    #[serde(default)]
    pub time_path: Option<String>,

    /// 单次请求超时
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// GET 分页与搜索回退共用的页大小
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// poll 循环的 tick 间隔
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    /// poll 窗口切片长度
    #[serde(default = "default_poll_window_minutes")]
    pub poll_window_minutes: i64,

    /// stream 模式切片长度
    #[serde(default = "default_stream_slice_minutes")]
    pub stream_slice_minutes: i64,

    /// stream 模式初始回溯量
    #[serde(default = "default_stream_backlog_minutes")]
    pub stream_backlog_minutes: i64,

    /// stream 模式落后设备时钟的稳定滞后
    #[serde(default = "default_stream_lag_secs")]
    pub stream_lag_secs: i64,

    /// 自适应加宽上限（基础切片的倍数）
    #[serde(default = "default_widen_factor")]
    pub widen_factor: u32,

    /// 设备时钟不可读时，墙钟回退使用的 UTC 偏移小时数
    #[serde(default = "default_fallback_offset_hours")]
    pub fallback_utc_offset_hours: i32,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> u32 {
    200
}

fn default_tick_secs() -> u64 {
    60
}

fn default_poll_window_minutes() -> i64 {
    5
}

fn default_stream_slice_minutes() -> i64 {
    1
}

fn default_stream_backlog_minutes() -> i64 {
    5
}

fn default_stream_lag_secs() -> i64 {
    10
}

fn default_widen_factor() -> u32 {
    3
}

fn default_fallback_offset_hours() -> i32 {
    8
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            history_path: None,
            search_path: None,
            time_path: None,
            timeout_secs: default_timeout_secs(),
            page_size: default_page_size(),
            tick_secs: default_tick_secs(),
            poll_window_minutes: default_poll_window_minutes(),
            stream_slice_minutes: default_stream_slice_minutes(),
            stream_backlog_minutes: default_stream_backlog_minutes(),
            stream_lag_secs: default_stream_lag_secs(),
            widen_factor: default_widen_factor(),
            fallback_utc_offset_hours: default_fallback_offset_hours(),
        }
    }
}

/// Normalizer 使用的映射表
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingConfig {
    /// 读卡器编号 (字符串键) -> 方向标签
    #[serde(default)]
    pub reader_direction: Option<HashMap<String, String>>,

    /// 视为成功通行的 minor 码
    #[serde(default)]
    pub success_minor_codes: Option<Vec<i64>>,
}

/// 过滤策略
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// 方向 allow-list；为空或缺省时全部放行。字面量 `ANY` 为通配。
    #[serde(default)]
    pub allowed_directions: Option<Vec<String>>,

    /// 拒绝无法确认成功的事件
    #[serde(default)]
    pub only_success: Option<bool>,

    /// 允许 UNKNOWN 方向的事件通过 allow-list
    #[serde(default)]
    pub include_unknown_direction: Option<bool>,

    /// 丢弃既无时间又无身份字段的记录
    #[serde(default)]
    pub skip_blank_records: Option<bool>,
}

/// Sink 输出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink 名称
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 类型相关参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// 记录批次摘要日志
    Log,
    /// 关系型存储 (SQLite)
    Database,
    /// HTTP 批量上报端点
    Http,
}

/// 设备级覆盖存在则用之，否则用全局值。
///
/// 所有可覆盖配置都经由此处解析，优先级规则只存在一份。
fn resolve<'a, T>(device: Option<&'a T>, global: Option<&'a T>) -> Option<&'a T> {
    device.or(global)
}

impl CollectorBlueprint {
    /// 设备生效的 reader -> direction 表。设备表存在但为空时同样覆盖
    /// (即禁用全局表)。
    pub fn reader_direction<'a>(
        &'a self,
        device: &'a DeviceDescriptor,
    ) -> Option<&'a HashMap<String, String>> {
        resolve(
            device
                .mapping
                .as_ref()
                .and_then(|m| m.reader_direction.as_ref()),
            self.mapping.reader_direction.as_ref(),
        )
    }

    /// 设备生效的成功 minor 码表；`None` 表示无法判定成功与否
    pub fn success_minor_codes<'a>(&'a self, device: &'a DeviceDescriptor) -> Option<&'a [i64]> {
        resolve(
            device
                .mapping
                .as_ref()
                .and_then(|m| m.success_minor_codes.as_ref()),
            self.mapping.success_minor_codes.as_ref(),
        )
        .map(|v| v.as_slice())
    }

    /// 设备生效的方向 allow-list；设备表仅在非空时生效，
    /// 结果缺省/为空表示全部放行
    pub fn allowed_directions<'a>(&'a self, device: &'a DeviceDescriptor) -> Option<&'a [String]> {
        let device_list = device
            .filter
            .as_ref()
            .and_then(|f| f.allowed_directions.as_ref())
            .filter(|l| !l.is_empty());
        resolve(device_list, self.filter.allowed_directions.as_ref())
            .map(|v| v.as_slice())
            .filter(|l| !l.is_empty())
    }

    pub fn only_success(&self, device: &DeviceDescriptor) -> bool {
        resolve(
            device.filter.as_ref().and_then(|f| f.only_success.as_ref()),
            self.filter.only_success.as_ref(),
        )
        .copied()
        .unwrap_or(false)
    }

    pub fn include_unknown_direction(&self, device: &DeviceDescriptor) -> bool {
        resolve(
            device
                .filter
                .as_ref()
                .and_then(|f| f.include_unknown_direction.as_ref()),
            self.filter.include_unknown_direction.as_ref(),
        )
        .copied()
        .unwrap_or(false)
    }

    pub fn skip_blank_records(&self, device: &DeviceDescriptor) -> bool {
        resolve(
            device
                .filter
                .as_ref()
                .and_then(|f| f.skip_blank_records.as_ref()),
            self.filter.skip_blank_records.as_ref(),
        )
        .copied()
        .unwrap_or(false)
    }
}
