//! PageFetcher - paginated window retrieval with transport/format fallback

use chrono::SecondsFormat;
use contracts::{FetchConfig, RawPage, RawRecord, TimeWindow, DEFAULT_HISTORY_PATH};
use device_gateway::{canonicalize_query_path, DeviceGateway};
use metrics::counter;
use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::error::IngestError;
use crate::extract::parse_body;
use crate::pagination::next_position;

/// Last-resort circuit breaker for a single window's page loop
pub const MAX_PAGES_PER_WINDOW: u32 = 10_000;

/// Retrieves one window's raw records from a device, page by page.
///
/// The primary transport is a GET against the history endpoint; when that
/// yields nothing locatable, the vendor search POST is tried at the same
/// position before giving up on the page.
pub struct PageFetcher {
    gateway: DeviceGateway,
    history_path: String,
    search_path: String,
    page_size: u32,
}

impl PageFetcher {
    pub fn new(fetch: &FetchConfig, gateway: DeviceGateway) -> Self {
        let history_path = fetch
            .history_path
            .as_deref()
            .and_then(canonicalize_query_path)
            .unwrap_or_else(|| format!("{DEFAULT_HISTORY_PATH}?format=json"));

        let search_path = fetch
            .search_path
            .as_deref()
            .and_then(canonicalize_query_path)
            .unwrap_or_else(|| history_path.clone());

        Self {
            gateway,
            history_path,
            search_path,
            page_size: fetch.page_size.max(1),
        }
    }

    /// Fetch every page of a window.
    ///
    /// Pagination anomalies (non-advancing position, page ceiling) abort the
    /// loop early with a warning; records collected so far are still
    /// returned so the caller can dispatch them.
    #[instrument(
        name = "fetch_window",
        skip(self),
        fields(device = %self.gateway.device_id(), window = %window)
    )]
    pub async fn fetch_window(&self, window: &TimeWindow) -> Result<Vec<RawRecord>, IngestError> {
        let mut records = Vec::new();
        let mut position: u64 = 0;
        let mut pages: u32 = 0;

        loop {
            pages += 1;
            if pages > MAX_PAGES_PER_WINDOW {
                warn!(
                    device = %self.gateway.device_id(),
                    window = %window,
                    pages = MAX_PAGES_PER_WINDOW,
                    "page ceiling reached, aborting window pagination"
                );
                break;
            }

            let page = self.fetch_page(window, position).await?;
            let returned = page.records.len() as u64;
            counter!("collector_pages_fetched_total").increment(1);
            counter!("collector_records_fetched_total").increment(returned);

            debug!(
                device = %self.gateway.device_id(),
                position,
                returned,
                total = ?page.total_matches,
                "page fetched"
            );

            // The device may echo the position it actually served; trust the
            // echo for planning when present.
            let served_position = page.search_position.unwrap_or(position);
            let total_matches = page.total_matches;
            records.extend(page.records);

            match next_position(served_position, returned, total_matches, self.page_size) {
                None => break,
                Some(next) => {
                    if next <= position {
                        warn!(
                            device = %self.gateway.device_id(),
                            window = %window,
                            position,
                            next,
                            "non-advancing pagination detected, aborting window"
                        );
                        break;
                    }
                    position = next;
                }
            }
        }

        Ok(records)
    }

    /// Fetch a single page: GET primary, POST search fallback.
    pub async fn fetch_page(
        &self,
        window: &TimeWindow,
        position: u64,
    ) -> Result<RawPage, IngestError> {
        let start = iso(window.start);
        let end = iso(window.end);

        let page = self.primary_page(&start, &end, position).await?;
        if !page.records.is_empty() {
            return Ok(page);
        }
        self.fallback_page(&start, &end, position).await
    }

    /// Primary transport: GET with query-string pagination
    async fn primary_page(
        &self,
        start: &str,
        end: &str,
        position: u64,
    ) -> Result<RawPage, IngestError> {
        let page_no = position / self.page_size as u64 + 1;
        let response = self
            .gateway
            .get(&self.history_path)
            .query(&[("startTime", start), ("endTime", end)])
            .query(&[
                ("pageNo", page_no.to_string()),
                ("pageSize", self.page_size.to_string()),
            ])
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        if !response.status().is_success() {
            return Ok(RawPage::default());
        }
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(&e))?;
        Ok(parse_body(&body))
    }

    /// Secondary transport: vendor structured search POST
    async fn fallback_page(
        &self,
        start: &str,
        end: &str,
        position: u64,
    ) -> Result<RawPage, IngestError> {
        let body = json!({
            "AcsEventCond": {
                "searchID": "1",
                "searchResultPosition": position,
                "maxResults": self.page_size,
                "startTime": start,
                "endTime": end,
            }
        });

        let response = self
            .gateway
            .post_json(&self.search_path, &body)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        if !response.status().is_success() {
            // fallback exhausted: treat as zero records, not an error
            return Ok(RawPage::default());
        }
        let text = response
            .text()
            .await
            .map_err(|e| self.transport_error(&e))?;
        Ok(parse_body(&text))
    }

    fn transport_error(&self, err: &reqwest::Error) -> IngestError {
        IngestError::transport(self.gateway.device_id(), err.to_string())
    }
}

fn iso(t: chrono::DateTime<chrono::FixedOffset>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::DeviceDescriptor;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn window() -> TimeWindow {
        TimeWindow::new(
            chrono::DateTime::parse_from_rfc3339("2025-09-29T12:00:00+08:00").unwrap(),
            chrono::DateTime::parse_from_rfc3339("2025-09-29T12:05:00+08:00").unwrap(),
        )
    }

    fn fetcher_for(server: &MockServer, page_size: u32) -> PageFetcher {
        let addr = server.address();
        let device = DeviceDescriptor {
            name: Some("mock".into()),
            host: addr.ip().to_string(),
            port: addr.port(),
            https: false,
            insecure_tls: false,
            username: "admin".into(),
            password: "pw".into(),
            mapping: None,
            filter: None,
        };
        let fetch = FetchConfig {
            page_size,
            ..Default::default()
        };
        let gateway = DeviceGateway::connect(&fetch, &device).unwrap();
        PageFetcher::new(&fetch, gateway)
    }

    fn rows(cards: &[&str]) -> serde_json::Value {
        serde_json::json!({
            "AcsEvent": {
                "InfoList": cards.iter()
                    .map(|c| serde_json::json!({"cardNo": c, "time": "2025-09-29T12:01:00+08:00"}))
                    .collect::<Vec<_>>()
            }
        })
    }

    #[tokio::test]
    async fn test_multi_page_get() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ISAPI/AccessControl/AcsEvent"))
            .and(query_param("pageNo", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(rows(&["1", "2"])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ISAPI/AccessControl/AcsEvent"))
            .and(query_param("pageNo", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(rows(&["3"])))
            .mount(&server)
            .await;
        // the short second page ends pagination; the fetcher then probes the
        // search fallback once for the empty-primary case only

        let fetcher = fetcher_for(&server, 2);
        let records = fetcher.fetch_window(&window()).await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2]["cardNo"], "3");
    }

    #[tokio::test]
    async fn test_post_fallback_on_primary_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/ISAPI/AccessControl/AcsEvent"))
            .and(body_partial_json(serde_json::json!({
                "AcsEventCond": { "searchID": "1", "searchResultPosition": 0 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(rows(&["9"])))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server, 2);
        let records = fetcher.fetch_window(&window()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["cardNo"], "9");
    }

    #[tokio::test]
    async fn test_both_transports_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server, 2);
        let records = fetcher.fetch_window(&window()).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_non_advancing_position_stops() {
        let server = MockServer::start().await;
        // device echoes position 0 forever with a full page and a huge total
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "SearchResult": {
                    "totalMatches": 1000,
                    "searchResultPosition": 0,
                    "AcsEvent": { "InfoList": [ {"cardNo": "a"}, {"cardNo": "b"} ] }
                }
            })))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server, 2);
        let records = fetcher.fetch_window(&window()).await.unwrap();
        // first page advances (0 -> 2), second page echoes 0 again -> stop
        assert_eq!(records.len(), 4);
    }

    #[tokio::test]
    async fn test_custom_history_path_is_canonicalized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/custom/history"))
            .and(query_param("format", "json"))
            .and(query_param("startTime", "2025-09-29T12:00:00+08:00"))
            .respond_with(ResponseTemplate::new(200).set_body_json(rows(&["1"])))
            .mount(&server)
            .await;

        let addr = server.address();
        let device = DeviceDescriptor {
            name: Some("mock".into()),
            host: addr.ip().to_string(),
            port: addr.port(),
            https: false,
            insecure_tls: false,
            username: "admin".into(),
            password: "pw".into(),
            mapping: None,
            filter: None,
        };
        let fetch = FetchConfig {
            history_path: Some("custom/history".into()),
            page_size: 50,
            ..Default::default()
        };
        let gateway = DeviceGateway::connect(&fetch, &device).unwrap();
        let fetcher = PageFetcher::new(&fetch, gateway);

        let records = fetcher.fetch_window(&window()).await.unwrap();
        assert_eq!(records.len(), 1);
    }
}
