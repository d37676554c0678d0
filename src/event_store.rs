//! Storage for toll road notifications
//!
//! Persists every committed event to a SQLite database so observers can replay
//! an operator's history from the first event.

use crate::tollroad::errors::{TollRoadError, TollRoadResult};
use crate::tollroad::events::TollRoadEvent;
use chrono::{DateTime, TimeZone, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, Row};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Stream id under which regulator notifications are stored
pub const REGULATOR_STREAM: Uuid = Uuid::nil();

/// Event read back from the store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    pub sequence: i64,
    pub stream: Uuid,
    pub event: TollRoadEvent,
    pub recorded_at: DateTime<Utc>,
}

pub struct EventStore {
    db_path: PathBuf,
}

impl EventStore {
    /// Open (and create if needed) the store at `db_path`
    pub fn open(db_path: impl AsRef<Path>) -> TollRoadResult<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let store = Self { db_path };
        store.init_database()?;
        Ok(store)
    }

    /// Store in the platform data directory
    pub fn open_default() -> TollRoadResult<Self> {
        let project_dirs = ProjectDirs::from("com", "TollRoad", "TollRoad").ok_or_else(|| {
            TollRoadError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Unable to determine storage directory",
            ))
        })?;

        Self::open(project_dirs.data_dir().join("events.sqlite"))
    }

    fn init_database(&self) -> TollRoadResult<()> {
        let conn = Connection::open(&self.db_path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS events (
                sequence INTEGER PRIMARY KEY AUTOINCREMENT,
                stream TEXT NOT NULL,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL,
                recorded_at INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS events_stream ON events (stream, sequence)",
            [],
        )?;

        Ok(())
    }

    /// Append the events of one operation; all of them are stored or none.
    pub fn append(&self, stream: Uuid, events: &[TollRoadEvent]) -> TollRoadResult<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut conn = Connection::open(&self.db_path)?;
        let tx = conn.transaction()?;
        let recorded_at = Utc::now().timestamp_millis();
        for event in events {
            tx.execute(
                "INSERT INTO events (stream, kind, payload, recorded_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    stream.to_string(),
                    event.kind(),
                    serde_json::to_string(event)?,
                    recorded_at
                ],
            )?;
        }
        tx.commit()?;

        log::debug!("Stored {} events for stream {}", events.len(), stream);
        Ok(())
    }

    /// Every event of `stream` in the order it was appended
    pub fn load_events(&self, stream: Uuid) -> TollRoadResult<Vec<StoredEvent>> {
        let conn = Connection::open(&self.db_path)?;
        let mut stmt = conn.prepare(
            "SELECT sequence, stream, payload, recorded_at FROM events
             WHERE stream = ?1 ORDER BY sequence",
        )?;

        let rows = stmt.query_map(params![stream.to_string()], Self::row_to_parts)?;

        let mut events = Vec::new();
        for row in rows {
            let (sequence, stream, payload, recorded_at) = row?;
            events.push(StoredEvent {
                sequence,
                stream: Uuid::parse_str(&stream).map_err(|e| {
                    TollRoadError::invalid(format!("stored stream id {}: {}", stream, e))
                })?,
                event: serde_json::from_str(&payload)?,
                recorded_at: Utc
                    .timestamp_millis_opt(recorded_at)
                    .single()
                    .unwrap_or_default(),
            });
        }

        Ok(events)
    }

    pub fn count(&self, stream: Uuid) -> TollRoadResult<u64> {
        let conn = Connection::open(&self.db_path)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM events WHERE stream = ?1",
            params![stream.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn row_to_parts(row: &Row) -> rusqlite::Result<(i64, String, String, i64)> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
    }
}
