//! DeviceClock - authoritative device time with wall-clock fallback

use chrono::{DateTime, FixedOffset, Utc};
use contracts::{FetchConfig, DEFAULT_TIME_PATH};
use serde_json::Value;
use tracing::debug;

use crate::client::{canonicalize_query_path, DeviceGateway};

/// Reads a device's current time; windows are computed against the device
/// clock, not ours, because event timestamps are device-local.
pub struct DeviceClock {
    time_path: String,
    fallback_offset: FixedOffset,
}

impl DeviceClock {
    pub fn new(fetch: &FetchConfig) -> Self {
        let time_path = fetch
            .time_path
            .as_deref()
            .and_then(canonicalize_query_path)
            .unwrap_or_else(|| format!("{DEFAULT_TIME_PATH}?format=json"));

        let offset_secs = fetch.fallback_utc_offset_hours.clamp(-23, 23) * 3600;
        let fallback_offset =
            FixedOffset::east_opt(offset_secs).expect("offset within ±23h is valid");

        Self {
            time_path,
            fallback_offset,
        }
    }

    /// Current device time, or the fixed-offset wall clock when the device
    /// clock cannot be read
    pub async fn now(&self, gateway: &DeviceGateway) -> DateTime<FixedOffset> {
        match self.read_device_time(gateway).await {
            Some(t) => t,
            None => {
                debug!(
                    device = %gateway.device_id(),
                    offset = %self.fallback_offset,
                    "device clock unavailable, using wall clock fallback"
                );
                Utc::now().with_timezone(&self.fallback_offset)
            }
        }
    }

    /// Read and parse the device clock endpoint. Any transport or decode
    /// failure yields `None`; the caller decides the fallback.
    async fn read_device_time(&self, gateway: &DeviceGateway) -> Option<DateTime<FixedOffset>> {
        let response = gateway.get(&self.time_path).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        let node: Value = response.json().await.ok()?;

        // Common envelope: {"Time":{"localTime":"..."}}; some models flatten
        // localTime to the top level.
        let ts = node
            .pointer("/Time/localTime")
            .and_then(Value::as_str)
            .or_else(|| node.get("localTime").and_then(Value::as_str))?;

        DateTime::parse_from_rfc3339(ts.trim()).ok()
    }
}
