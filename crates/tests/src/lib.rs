//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 一侧是模拟厂商设备，另一侧是真实 sinks，中间贯穿完整的处理链
//! (clock -> cursor -> fetch -> normalize -> filter -> dispatch)。

#[cfg(test)]
mod contract_tests {
    use contracts::{ConfigVersion, DEFAULT_HISTORY_PATH, DEFAULT_TIME_PATH};

    #[test]
    fn test_vendor_defaults() {
        let _ = ConfigVersion::V1;
        assert!(DEFAULT_HISTORY_PATH.starts_with('/'));
        assert!(DEFAULT_TIME_PATH.starts_with('/'));
    }
}

#[cfg(test)]
mod e2e_tests {
    use chrono::{DateTime, FixedOffset};
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{CanonicalEvent, CollectorBlueprint};
    use device_gateway::{DeviceClock, DeviceGateway};
    use dispatcher::create_dispatcher;
    use ingestion::{EventFilter, EventNormalizer, PageFetcher};
    use windowing::{next_window, CursorConfig, WatermarkStore, WATERMARK_GAP};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn at(rfc3339: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap()
    }

    /// Device + sink configuration pointing at the mock server
    fn blueprint_for(device: &MockServer, sinks_toml: &str) -> CollectorBlueprint {
        let addr = device.address();
        let config = format!(
            r#"
[[devices]]
name = "mock"
host = "{host}"
port = {port}
username = "admin"
password = "pw"

[fetch]
page_size = 10

[mapping]
success_minor_codes = [5]

[mapping.reader_direction]
1 = "IN"
2 = "OUT"

[filter]
allowed_directions = ["IN"]
only_success = true

{sinks_toml}
"#,
            host = addr.ip(),
            port = addr.port(),
        );
        ConfigLoader::load_from_str(&config, ConfigFormat::Toml).unwrap()
    }

    async fn mount_device(server: &MockServer, records: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/ISAPI/System/time"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Time": { "localTime": "2025-09-29T12:05:00+08:00" }
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ISAPI/AccessControl/AcsEvent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(records))
            .mount(server)
            .await;
    }

    fn accepted_record(card: &str) -> serde_json::Value {
        serde_json::json!({
            "time": "2025-09-29T12:01:00+08:00",
            "cardNo": card,
            "readerNo": 1,
            "major": 5,
            "minor": 5,
        })
    }

    /// 验证完整的数据流：
    /// 1. DeviceClock 读取设备时间，WindowCursor 算出窗口
    /// 2. PageFetcher 取回原始记录
    /// 3. Normalizer + Filter 产出接受批次
    ///
    /// 返回接受批次和处理的窗口。
    async fn run_one_window(
        blueprint: &CollectorBlueprint,
        marks: &mut WatermarkStore,
    ) -> (Vec<CanonicalEvent>, contracts::TimeWindow) {
        let device = &blueprint.devices[0];
        let gateway = DeviceGateway::connect(&blueprint.fetch, device).unwrap();
        let clock = DeviceClock::new(&blueprint.fetch);
        let fetcher = PageFetcher::new(&blueprint.fetch, gateway.clone());
        let normalizer = EventNormalizer::new(blueprint, device);
        let filter = EventFilter::new(blueprint, device);

        let device_now = clock.now(&gateway).await;
        let cursor = CursorConfig::poll(&blueprint.fetch);
        let window = next_window(marks.get(&device.device_id()), device_now, &cursor).unwrap();

        let raw = fetcher.fetch_window(&window).await.unwrap();
        let batch: Vec<CanonicalEvent> = raw
            .iter()
            .map(|record| normalizer.normalize(record))
            .filter(|event| filter.accept(event))
            .collect();

        marks.advance(&device.device_id(), window.end);
        (batch, window)
    }

    #[tokio::test]
    async fn test_window_of_three_records_reaches_database() {
        let device = MockServer::start().await;
        mount_device(
            &device,
            serde_json::json!({
                "AcsEvent": {
                    "InfoList": [
                        accepted_record("1001"),
                        accepted_record("1002"),
                        accepted_record("1003"),
                    ]
                }
            }),
        )
        .await;

        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("events.db").display().to_string();
        let blueprint = blueprint_for(
            &device,
            &format!(
                "[[sinks]]\nname = \"db\"\nsink_type = \"database\"\n\n\
                 [sinks.params]\npath = \"{db_path}\"\n"
            ),
        );

        let mut marks = WatermarkStore::new();
        let (batch, window) = run_one_window(&blueprint, &mut marks).await;

        // the device clock read 12:05; the first window is [12:00, 12:05)
        assert_eq!(window.start, at("2025-09-29T12:00:00+08:00"));
        assert_eq!(window.end, at("2025-09-29T12:05:00+08:00"));
        assert_eq!(batch.len(), 3);

        let mut dispatcher = create_dispatcher(&blueprint.sinks).unwrap();
        dispatcher.dispatch(&batch).await.unwrap();

        // watermark lands one second past the window end
        assert_eq!(marks.get("mock"), Some(at("2025-09-29T12:05:01+08:00")));

        let conn = rusqlite::Connection::open(&db_path).unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM access_events", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 3);

        let direction: String = conn
            .query_row("SELECT direction FROM access_events LIMIT 1", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(direction, "IN");
    }

    #[tokio::test]
    async fn test_redelivered_window_stores_each_event_once() {
        let device = MockServer::start().await;
        mount_device(
            &device,
            serde_json::json!({
                "AcsEvent": { "InfoList": [ accepted_record("1001"), accepted_record("1002") ] }
            }),
        )
        .await;

        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("events.db").display().to_string();
        let blueprint = blueprint_for(
            &device,
            &format!(
                "[[sinks]]\nname = \"db\"\nsink_type = \"database\"\n\n\
                 [sinks.params]\npath = \"{db_path}\"\n"
            ),
        );

        let mut marks = WatermarkStore::new();
        let (batch, _) = run_one_window(&blueprint, &mut marks).await;
        let mut dispatcher = create_dispatcher(&blueprint.sinks).unwrap();

        // the window is dispatched twice, as happens when a later sink
        // failure forces a re-fetch of the same window
        dispatcher.dispatch(&batch).await.unwrap();
        dispatcher.dispatch(&batch).await.unwrap();

        let conn = rusqlite::Connection::open(&db_path).unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM access_events", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 2);
        assert_eq!(dispatcher.duplicates_skipped(), 2);
    }

    #[tokio::test]
    async fn test_filter_policy_applies_end_to_end() {
        let device = MockServer::start().await;
        mount_device(
            &device,
            serde_json::json!({
                "AcsEvent": {
                    "InfoList": [
                        accepted_record("1001"),
                        // exit reader: direction OUT is not in the allow-list
                        { "time": "2025-09-29T12:01:10+08:00", "cardNo": "2001",
                          "readerNo": 2, "minor": 5 },
                        // denied access: minor 75 is not a success code
                        { "time": "2025-09-29T12:01:20+08:00", "cardNo": "3001",
                          "readerNo": 1, "minor": 75 },
                    ]
                }
            }),
        )
        .await;

        let blueprint = blueprint_for(
            &device,
            "[[sinks]]\nname = \"audit\"\nsink_type = \"log\"\n",
        );

        let mut marks = WatermarkStore::new();
        let (batch, _) = run_one_window(&blueprint, &mut marks).await;

        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].card_no.as_deref(), Some("1001"));
        assert_eq!(batch[0].success, Some(true));
    }

    #[tokio::test]
    async fn test_http_sink_receives_sub_batches() {
        let device = MockServer::start().await;
        mount_device(
            &device,
            serde_json::json!({
                "AcsEvent": {
                    "InfoList": [
                        accepted_record("1"),
                        accepted_record("2"),
                        accepted_record("3"),
                    ]
                }
            }),
        )
        .await;

        let ingest = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/access_events"))
            .and(body_partial_json(serde_json::json!({
                "table": "access_events"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&ingest)
            .await;

        let blueprint = blueprint_for(
            &device,
            &format!(
                "[[sinks]]\nname = \"upload\"\nsink_type = \"http\"\n\n\
                 [sinks.params]\nendpoint_base = \"{}\"\ntable = \"access_events\"\n\
                 batch_size = \"2\"\n",
                ingest.uri()
            ),
        );

        let mut marks = WatermarkStore::new();
        let (batch, _) = run_one_window(&blueprint, &mut marks).await;
        assert_eq!(batch.len(), 3);

        let mut dispatcher = create_dispatcher(&blueprint.sinks).unwrap();
        // three events with batch_size 2 arrive as two POSTs
        dispatcher.dispatch(&batch).await.unwrap();
    }

    #[tokio::test]
    async fn test_consecutive_windows_leave_one_second_gap() {
        let device = MockServer::start().await;
        mount_device(
            &device,
            serde_json::json!({ "AcsEvent": { "InfoList": [ accepted_record("1") ] } }),
        )
        .await;

        let blueprint = blueprint_for(
            &device,
            "[[sinks]]\nname = \"audit\"\nsink_type = \"log\"\n",
        );

        let mut marks = WatermarkStore::new();
        let (_, first) = run_one_window(&blueprint, &mut marks).await;

        // next window starts exactly one second past the previous end
        let cursor = CursorConfig::poll(&blueprint.fetch);
        let later = first.end + chrono::Duration::minutes(10);
        let second = next_window(marks.get("mock"), later, &cursor).unwrap();
        assert_eq!(second.start, first.end + WATERMARK_GAP);
    }
}
