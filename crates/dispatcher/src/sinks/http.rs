//! HttpBatchSink - batch POST to an ingestion endpoint

use std::collections::HashMap;
use std::time::Duration;

use contracts::{CanonicalEvent, ContractError, EventSink};
use serde_json::{json, Value};
use tracing::{debug, instrument};

/// Response body bytes kept for diagnostics on a failed POST
const ERROR_BODY_LIMIT: usize = 2048;

/// Configuration for HttpBatchSink
#[derive(Debug, Clone)]
pub struct HttpSinkConfig {
    /// Endpoint base, e.g. `http://ingest.example:9004/api/sync/data`
    pub endpoint_base: String,
    /// Logical table/collection name; the POST path falls back to `ingest`
    pub table: Option<String>,
    /// Max events per POST
    pub batch_size: usize,
    /// Optional basic-auth credentials
    pub basic_username: Option<String>,
    pub basic_password: Option<String>,
    /// Extra headers applied to every request
    pub headers: Vec<(String, String)>,
    /// Request timeout
    pub timeout_secs: u64,
}

impl HttpSinkConfig {
    /// Create config from params map. Custom headers use the `header.`
    /// prefix, e.g. `header.X-Tenant = "plant-2"`.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let endpoint_base = params
            .get("endpoint_base")
            .cloned()
            .ok_or_else(|| "missing 'endpoint_base' parameter".to_string())?;

        let batch_size = params
            .get("batch_size")
            .and_then(|s| s.parse().ok())
            .filter(|&n: &usize| n > 0)
            .unwrap_or(200);

        let timeout_secs = params
            .get("timeout_secs")
            .and_then(|s| s.parse().ok())
            .filter(|&n: &u64| n > 0)
            .unwrap_or(30);

        let mut headers: Vec<(String, String)> = params
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix("header.")
                    .map(|name| (name.to_string(), v.clone()))
            })
            .collect();
        headers.sort();

        Ok(Self {
            endpoint_base,
            table: params.get("table").cloned().filter(|t| !t.is_empty()),
            batch_size,
            basic_username: params.get("basic_username").cloned(),
            basic_password: params.get("basic_password").cloned(),
            headers,
            timeout_secs,
        })
    }
}

/// Sink that POSTs event batches as JSON documents
#[derive(Debug)]
pub struct HttpBatchSink {
    name: String,
    config: HttpSinkConfig,
    client: reqwest::Client,
    url: String,
}

impl HttpBatchSink {
    /// Create a new HttpBatchSink
    pub fn new(name: impl Into<String>, config: HttpSinkConfig) -> Result<Self, ContractError> {
        let name = name.into();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .no_proxy()
            .build()
            .map_err(|e| ContractError::sink_connection(&name, e.to_string()))?;

        let base = config.endpoint_base.trim_end_matches('/');
        let url = match &config.table {
            Some(table) => format!("{base}/{table}"),
            None => format!("{base}/ingest"),
        };

        Ok(Self {
            name,
            config,
            client,
            url,
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config =
            HttpSinkConfig::from_params(params).map_err(|e| ContractError::sink_write(&name, e))?;
        Self::new(name, config)
    }

    async fn post_chunk(&self, chunk: &[CanonicalEvent]) -> Result<(), ContractError> {
        let rows: Vec<Value> = chunk.iter().map(event_row).collect();
        let mut payload = json!({
            "count": chunk.len(),
            "rows": rows,
        });
        if let Some(table) = &self.config.table {
            payload["table"] = json!(table);
        }

        let mut request = self.client.post(&self.url).json(&payload);
        if let (Some(user), Some(pass)) = (
            &self.config.basic_username,
            &self.config.basic_password,
        ) {
            request = request.basic_auth(user, Some(pass));
        }
        for (header, value) in &self.config.headers {
            request = request.header(header, value);
        }

        debug!(sink = %self.name, url = %self.url, count = chunk.len(), "posting batch");

        let response = request
            .send()
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        // keep a bounded prefix of the response body for diagnostics
        let body = response.text().await.unwrap_or_default();
        let prefix: String = body.chars().take(ERROR_BODY_LIMIT).collect();
        Err(ContractError::sink_write(
            &self.name,
            format!("HTTP {status} for {}: {prefix}", self.url),
        ))
    }
}

impl EventSink for HttpBatchSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_idempotent(&self) -> bool {
        // the remote end gives no duplicate guarantee
        false
    }

    #[instrument(
        name = "http_sink_write",
        skip(self, events),
        fields(sink = %self.name, count = events.len())
    )]
    async fn write_batch(&mut self, events: &[CanonicalEvent]) -> Result<(), ContractError> {
        for chunk in events.chunks(self.config.batch_size.max(1)) {
            self.post_chunk(chunk).await?;
        }
        Ok(())
    }

    #[instrument(name = "http_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        // every batch is posted eagerly
        Ok(())
    }

    #[instrument(name = "http_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, "HttpBatchSink closed");
        Ok(())
    }
}

/// Row layout expected by the ingestion endpoint
fn event_row(event: &CanonicalEvent) -> Value {
    json!({
        "event_time": event.event_time_repr(),
        "device": event.device,
        "direction": event.direction.as_str(),
        "success": event.success,
        "major": event.major,
        "minor": event.minor,
        "name": event.name,
        "employee_no": event.employee_no,
        "card_no": event.card_no,
        "card_type": event.card_type,
        "door_no": event.door_no,
        "reader_no": event.reader_no,
        "raw_json": event.raw_payload,
    })
}
