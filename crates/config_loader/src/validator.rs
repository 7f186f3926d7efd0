//! 配置校验模块
//!
//! 校验规则：
//! - 至少一台设备；设备 ID 唯一
//! - host / username / password 必填
//! - page_size >= 1，timeout > 0
//! - 窗口与加宽参数合理
//! - sink 名称唯一，各类型必填参数齐全

use std::collections::HashSet;

use contracts::{CollectorBlueprint, ContractError, SinkType};

/// 校验 CollectorBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &CollectorBlueprint) -> Result<(), ContractError> {
    validate_devices(blueprint)?;
    validate_fetch(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

/// 校验设备列表与每台设备的必填字段
fn validate_devices(blueprint: &CollectorBlueprint) -> Result<(), ContractError> {
    if blueprint.devices.is_empty() {
        return Err(ContractError::config_validation(
            "devices",
            "at least one device must be configured",
        ));
    }

    let mut seen = HashSet::new();
    for device in &blueprint.devices {
        let id = device.device_id();
        if !seen.insert(id.clone()) {
            return Err(ContractError::config_validation(
                format!("devices[id={id}]"),
                "duplicate device id",
            ));
        }
        if device.host.is_empty() {
            return Err(ContractError::config_validation(
                format!("devices[id={id}].host"),
                "host cannot be empty",
            ));
        }
        if device.username.is_empty() || device.password.is_empty() {
            return Err(ContractError::config_validation(
                format!("devices[id={id}]"),
                "username and password are required",
            ));
        }
        if device.insecure_tls && !device.https {
            return Err(ContractError::config_validation(
                format!("devices[id={id}].insecure_tls"),
                "insecure_tls only applies when https = true",
            ));
        }
    }
    Ok(())
}

/// 校验抓取参数
fn validate_fetch(blueprint: &CollectorBlueprint) -> Result<(), ContractError> {
    let fetch = &blueprint.fetch;

    if fetch.page_size == 0 {
        return Err(ContractError::config_validation(
            "fetch.page_size",
            "page_size must be >= 1",
        ));
    }
    if fetch.timeout_secs == 0 {
        return Err(ContractError::config_validation(
            "fetch.timeout_secs",
            "timeout_secs must be > 0",
        ));
    }
    if fetch.poll_window_minutes < 1 {
        return Err(ContractError::config_validation(
            "fetch.poll_window_minutes",
            format!(
                "poll_window_minutes must be >= 1, got {}",
                fetch.poll_window_minutes
            ),
        ));
    }
    if fetch.stream_slice_minutes < 1 {
        return Err(ContractError::config_validation(
            "fetch.stream_slice_minutes",
            format!(
                "stream_slice_minutes must be >= 1, got {}",
                fetch.stream_slice_minutes
            ),
        ));
    }
    if fetch.widen_factor < 1 {
        return Err(ContractError::config_validation(
            "fetch.widen_factor",
            "widen_factor must be >= 1",
        ));
    }
    Ok(())
}

/// 校验 sink 配置
fn validate_sinks(blueprint: &CollectorBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(&sink.name) {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                "duplicate sink name",
            ));
        }
        match sink.sink_type {
            SinkType::Database => {
                if !sink.params.contains_key("path") {
                    return Err(ContractError::config_validation(
                        format!("sinks[{}].params.path", sink.name),
                        "database sink requires a 'path' parameter",
                    ));
                }
            }
            SinkType::Http => {
                if !sink.params.contains_key("endpoint_base") {
                    return Err(ContractError::config_validation(
                        format!("sinks[{}].params.endpoint_base", sink.name),
                        "http sink requires an 'endpoint_base' parameter",
                    ));
                }
            }
            SinkType::Log => {}
        }
    }
    Ok(())
}
