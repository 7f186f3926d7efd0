//! DeviceGateway - per-device HTTP client

use std::time::Duration;

use contracts::{DeviceDescriptor, FetchConfig};
use reqwest::{Client, RequestBuilder};
use tracing::debug;

use crate::error::GatewayError;

/// Canonicalize a query endpoint path: guarantee a leading slash and a
/// `format=json` parameter. Vendors reject requests without the explicit
/// format selector on some firmwares.
pub fn canonicalize_query_path(path: &str) -> Option<String> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut canon = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    };
    if !canon.contains("format=") {
        canon.push(if canon.contains('?') { '&' } else { '?' });
        canon.push_str("format=json");
    }
    Some(canon)
}

/// HTTP access to one device
///
/// Holds the reqwest client (timeout and TLS policy baked in at build time)
/// plus the credentials applied to every request.
#[derive(Clone)]
pub struct DeviceGateway {
    device_id: String,
    base_url: String,
    username: String,
    password: String,
    client: Client,
}

impl DeviceGateway {
    /// Build the gateway for one configured device
    pub fn connect(fetch: &FetchConfig, device: &DeviceDescriptor) -> Result<Self, GatewayError> {
        let device_id = device.device_id();

        let mut builder = Client::builder()
            .timeout(Duration::from_secs(fetch.timeout_secs))
            .no_proxy();

        if device.https && device.insecure_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| GatewayError::client_build(&device_id, e.to_string()))?;

        debug!(
            device = %device_id,
            base = %device.base_url(),
            timeout_secs = fetch.timeout_secs,
            insecure_tls = device.https && device.insecure_tls,
            "DeviceGateway connected"
        );

        Ok(Self {
            device_id,
            base_url: device.base_url(),
            username: device.username.clone(),
            password: device.password.clone(),
            client,
        })
    }

    /// Device identity for logs and watermark keys
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Scheme + authority the gateway talks to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET request against a device path (path may carry a query string)
    pub fn get(&self, path_and_query: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path_and_query))
            .basic_auth(&self.username, Some(&self.password))
            .header(reqwest::header::ACCEPT, "application/json")
    }

    /// POST request with a JSON body against a device path
    pub fn post_json(&self, path_and_query: &str, body: &serde_json::Value) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path_and_query))
            .basic_auth(&self.username, Some(&self.password))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_device(host: &str, port: u16) -> DeviceDescriptor {
        DeviceDescriptor {
            name: None,
            host: host.into(),
            port,
            https: false,
            insecure_tls: false,
            username: "admin".into(),
            password: "pw".into(),
            mapping: None,
            filter: None,
        }
    }

    #[test]
    fn test_canonicalize_adds_slash_and_format() {
        assert_eq!(
            canonicalize_query_path("ISAPI/AccessControl/AcsEvent").as_deref(),
            Some("/ISAPI/AccessControl/AcsEvent?format=json")
        );
    }

    #[test]
    fn test_canonicalize_appends_to_existing_query() {
        assert_eq!(
            canonicalize_query_path("/custom/events?order=asc").as_deref(),
            Some("/custom/events?order=asc&format=json")
        );
    }

    #[test]
    fn test_canonicalize_keeps_existing_format() {
        assert_eq!(
            canonicalize_query_path("/custom/events?format=xml").as_deref(),
            Some("/custom/events?format=xml")
        );
    }

    #[test]
    fn test_canonicalize_empty_path() {
        assert_eq!(canonicalize_query_path("  "), None);
    }

    #[test]
    fn test_gateway_base_url() {
        let gateway =
            DeviceGateway::connect(&FetchConfig::default(), &sample_device("10.0.0.5", 8080))
                .unwrap();
        assert_eq!(gateway.base_url(), "http://10.0.0.5:8080");
        assert_eq!(gateway.device_id(), "10.0.0.5:8080");
    }
}
