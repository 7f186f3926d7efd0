//! Ingestion 错误类型

use thiserror::Error;

/// Ingestion 错误
///
/// 解码失败不在此列：按约定，无法解析的响应体等于零记录页，
/// 只有传输层失败才会上浮。
#[derive(Debug, Error)]
pub enum IngestError {
    /// 与设备通信的传输失败
    #[error("device '{device}' transport error: {message}")]
    Transport { device: String, message: String },
}

impl IngestError {
    /// 创建传输错误
    pub fn transport(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            device: device.into(),
            message: message.into(),
        }
    }
}

impl From<IngestError> for contracts::ContractError {
    fn from(err: IngestError) -> Self {
        match &err {
            IngestError::Transport { device, message } => {
                contracts::ContractError::fetch(device.clone(), message.clone())
            }
        }
    }
}
