//! Device gateway error types

use thiserror::Error;

/// Gateway-specific errors
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP client construction error
    #[error("failed to build http client for '{device}': {message}")]
    ClientBuild { device: String, message: String },
}

impl GatewayError {
    /// Create a client construction error
    pub fn client_build(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ClientBuild {
            device: device.into(),
            message: message.into(),
        }
    }
}

impl From<GatewayError> for contracts::ContractError {
    fn from(err: GatewayError) -> Self {
        match &err {
            GatewayError::ClientBuild { device, .. } => {
                contracts::ContractError::gateway(device.clone(), err.to_string())
            }
        }
    }
}
