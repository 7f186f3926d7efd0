//! DatabaseSink - relational persistence with constraint-based idempotency

use std::collections::HashMap;

use contracts::{CanonicalEvent, ContractError, EventSink};
use metrics::counter;
use rusqlite::{params_from_iter, types::Value as Sql, Connection, ErrorCode};
use tracing::{debug, info, instrument};

/// Default table used when no custom insert statement is configured
const DEFAULT_TABLE: &str = "access_events";

/// Statement executed per event when `insert_sql` is not supplied.
/// The unique key makes re-delivery of a window a no-op.
const DEFAULT_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS access_events (
    event_time TEXT,
    device TEXT,
    direction TEXT,
    success INTEGER,
    major INTEGER,
    minor INTEGER,
    name TEXT,
    employee_no TEXT,
    card_no TEXT,
    card_type TEXT,
    door_no INTEGER,
    reader_no INTEGER,
    raw_json TEXT,
    UNIQUE (event_time, device, raw_json)
)";

/// Configuration for DatabaseSink
#[derive(Debug, Clone)]
pub struct DatabaseSinkConfig {
    /// SQLite database path (`:memory:` accepted)
    pub path: String,
    /// Custom parametrized insert statement; the default 13-column layout
    /// is generated when absent
    pub insert_sql: Option<String>,
}

impl DatabaseSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let path = params
            .get("path")
            .cloned()
            .ok_or_else(|| "missing 'path' parameter".to_string())?;
        let insert_sql = params
            .get("insert_sql")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Ok(Self { path, insert_sql })
    }
}

/// Sink that persists events into SQLite, one statement execution per
/// event. A unique-constraint violation means the event was already
/// delivered on an earlier attempt and is skipped silently.
#[derive(Debug)]
pub struct DatabaseSink {
    name: String,
    conn: Connection,
    insert_sql: String,
    placeholders: usize,
    duplicates: u64,
}

impl DatabaseSink {
    /// Open the database and prepare the insert layout
    #[instrument(name = "database_sink_new", skip(name, config))]
    pub fn new(name: impl Into<String>, config: DatabaseSinkConfig) -> Result<Self, ContractError> {
        let name = name.into();
        let conn = Connection::open(&config.path)
            .map_err(|e| ContractError::sink_connection(&name, e.to_string()))?;

        let insert_sql = match &config.insert_sql {
            Some(sql) => sql.clone(),
            None => {
                conn.execute(DEFAULT_SCHEMA, [])
                    .map_err(|e| ContractError::sink_connection(&name, e.to_string()))?;
                default_insert_sql()
            }
        };
        let placeholders = insert_sql.matches('?').count();

        info!(
            sink = %name,
            path = %config.path,
            placeholders,
            custom_sql = config.insert_sql.is_some(),
            "DatabaseSink ready"
        );

        Ok(Self {
            name,
            conn,
            insert_sql,
            placeholders,
            duplicates: 0,
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = DatabaseSinkConfig::from_params(params)
            .map_err(|e| ContractError::sink_connection(&name, e))?;
        Self::new(name, config)
    }

    /// Duplicate deliveries absorbed so far
    pub fn duplicates_skipped(&self) -> u64 {
        self.duplicates
    }

    fn insert_event(&mut self, event: &CanonicalEvent) -> Result<(), ContractError> {
        let values = bind_values(event, self.placeholders);
        let result = self
            .conn
            .prepare_cached(&self.insert_sql)
            .and_then(|mut stmt| stmt.execute(params_from_iter(values)));

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                self.duplicates += 1;
                counter!("collector_sink_duplicates_total").increment(1);
                debug!(sink = %self.name, event = %event.brief(), "duplicate skipped");
                Ok(())
            }
            Err(e) => Err(ContractError::sink_write(&self.name, e.to_string())),
        }
    }
}

impl EventSink for DatabaseSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_idempotent(&self) -> bool {
        // the unique key absorbs re-deliveries
        true
    }

    #[instrument(
        name = "database_sink_write",
        skip(self, events),
        fields(sink = %self.name, count = events.len())
    )]
    async fn write_batch(&mut self, events: &[CanonicalEvent]) -> Result<(), ContractError> {
        for event in events {
            self.insert_event(event)?;
        }
        Ok(())
    }

    #[instrument(name = "database_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        // statements execute eagerly
        Ok(())
    }

    #[instrument(name = "database_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, "DatabaseSink closed");
        Ok(())
    }
}

/// The default 13-column layout
fn default_insert_sql() -> String {
    format!(
        "INSERT INTO {DEFAULT_TABLE} (\
         event_time, device, direction, success, \
         major, minor, name, employee_no, card_no, card_type, \
         door_no, reader_no, raw_json\
         ) VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?)"
    )
}

/// Bind parameters in the fixed column order. 13 placeholders is the
/// default layout; a 14th, when a custom statement carries one, receives
/// the employee number again.
fn bind_values(event: &CanonicalEvent, placeholders: usize) -> Vec<Sql> {
    fn text(value: &Option<String>) -> Sql {
        value.clone().map(Sql::Text).unwrap_or(Sql::Null)
    }
    fn int(value: Option<i64>) -> Sql {
        value.map(Sql::Integer).unwrap_or(Sql::Null)
    }

    let mut values = vec![
        event.event_time_repr().map(Sql::Text).unwrap_or(Sql::Null),
        Sql::Text(event.device.clone()),
        Sql::Text(event.direction.as_str().to_string()),
        event
            .success
            .map(|b| Sql::Integer(b as i64))
            .unwrap_or(Sql::Null),
        int(event.major),
        int(event.minor),
        text(&event.name),
        text(&event.employee_no),
        text(&event.card_no),
        text(&event.card_type),
        int(event.door_no),
        int(event.reader_no),
        Sql::Text(event.raw_payload.clone()),
    ];
    if placeholders >= 14 {
        values.push(text(&event.employee_no));
    }
    values.truncate(placeholders.max(13).min(values.len()));
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Direction;

    fn event(card: &str) -> CanonicalEvent {
        CanonicalEvent {
            event_time: chrono::DateTime::parse_from_rfc3339("2025-09-29T12:01:00+08:00").ok(),
            device: "gate-a".into(),
            direction: Direction::In,
            card_no: Some(card.into()),
            minor: Some(75),
            success: Some(true),
            raw_payload: format!("{{\"cardNo\":\"{card}\"}}"),
            ..Default::default()
        }
    }

    fn memory_sink() -> DatabaseSink {
        DatabaseSink::new(
            "db",
            DatabaseSinkConfig {
                path: ":memory:".into(),
                insert_sql: None,
            },
        )
        .unwrap()
    }

    fn count_rows(sink: &DatabaseSink) -> i64 {
        sink.conn
            .query_row("SELECT COUNT(*) FROM access_events", [], |row| row.get(0))
            .unwrap()
    }

    #[tokio::test]
    async fn test_write_batch_inserts_rows() {
        let mut sink = memory_sink();
        sink.write_batch(&[event("1"), event("2")]).await.unwrap();
        assert_eq!(count_rows(&sink), 2);
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_idempotent() {
        let mut sink = memory_sink();
        let batch = vec![event("1")];
        sink.write_batch(&batch).await.unwrap();
        // same logical event again: one stored row, no error
        sink.write_batch(&batch).await.unwrap();
        assert_eq!(count_rows(&sink), 1);
        assert_eq!(sink.duplicates_skipped(), 1);
        assert!(sink.is_idempotent());
    }

    #[tokio::test]
    async fn test_custom_insert_sql() {
        let mut sink = DatabaseSink::new(
            "db",
            DatabaseSinkConfig {
                path: ":memory:".into(),
                insert_sql: Some(
                    "INSERT INTO slim (event_time, device, direction, success, major, minor, \
                     name, employee_no, card_no, card_type, door_no, reader_no, raw_json) \
                     VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?)"
                        .into(),
                ),
            },
        )
        .unwrap();
        sink.conn
            .execute(
                "CREATE TABLE slim (event_time TEXT, device TEXT, direction TEXT, success INTEGER, \
                 major INTEGER, minor INTEGER, name TEXT, employee_no TEXT, card_no TEXT, \
                 card_type TEXT, door_no INTEGER, reader_no INTEGER, raw_json TEXT)",
                [],
            )
            .unwrap();

        sink.write_batch(&[event("7")]).await.unwrap();
        let card: String = sink
            .conn
            .query_row("SELECT card_no FROM slim", [], |row| row.get(0))
            .unwrap();
        assert_eq!(card, "7");
    }

    #[tokio::test]
    async fn test_non_duplicate_error_propagates() {
        let mut sink = DatabaseSink::new(
            "db",
            DatabaseSinkConfig {
                path: ":memory:".into(),
                insert_sql: Some("INSERT INTO missing_table (a) VALUES (?)".into()),
            },
        )
        .unwrap();
        let err = sink.write_batch(&[event("1")]).await.unwrap_err();
        assert!(matches!(err, ContractError::SinkWrite { .. }));
    }

    #[test]
    fn test_from_params_requires_path() {
        let err = DatabaseSinkConfig::from_params(&HashMap::new()).unwrap_err();
        assert!(err.contains("path"));
    }

    #[test]
    fn test_persistent_file_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.db").display().to_string();
        let config = DatabaseSinkConfig {
            path: path.clone(),
            insert_sql: None,
        };

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let mut sink = DatabaseSink::new("db", config.clone()).unwrap();
            sink.write_batch(&[event("1")]).await.unwrap();
        });

        let sink = DatabaseSink::new("db", config).unwrap();
        assert_eq!(count_rows(&sink), 1);
    }
}
