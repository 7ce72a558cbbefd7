// 🗂️ Audit Log - append-only record of pipeline runs
// Every stage report is an event; nothing is updated or deleted.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AuditEvent {
    pub event_id: String,
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub stage: String,
    pub data: serde_json::Value,
}

impl AuditEvent {
    pub fn new(run_id: &str, stage: &str, data: serde_json::Value) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            run_id: run_id.to_string(),
            timestamp: Utc::now(),
            stage: stage.to_string(),
            data,
        }
    }
}

/// Fresh identifier for one pipeline invocation
pub fn new_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub struct AuditLog {
    conn: Connection,
}

impl AuditLog {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create audit directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open audit database: {}", path.display()))?;
        Self::setup(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::setup(Connection::open_in_memory()?)
    }

    fn setup(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id TEXT UNIQUE NOT NULL,
                run_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                stage TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_events_run ON events(run_id)",
            [],
        )?;

        Ok(AuditLog { conn })
    }

    pub fn record(&self, event: &AuditEvent) -> Result<()> {
        let data_json = serde_json::to_string(&event.data)?;

        self.conn.execute(
            "INSERT INTO events (event_id, run_id, timestamp, stage, data)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.event_id,
                event.run_id,
                event.timestamp.to_rfc3339(),
                event.stage,
                data_json,
            ],
        )?;

        Ok(())
    }

    /// Events of one run, in insertion order
    pub fn events_for_run(&self, run_id: &str) -> Result<Vec<AuditEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, run_id, timestamp, stage, data
             FROM events
             WHERE run_id = ?1
             ORDER BY id ASC",
        )?;

        let events = stmt
            .query_map(params![run_id], |row| {
                let timestamp_str: String = row.get(2)?;
                let data_json: String = row.get(4)?;

                Ok(AuditEvent {
                    event_id: row.get(0)?,
                    run_id: row.get(1)?,
                    timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                        .map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(
                                2,
                                rusqlite::types::Type::Text,
                                Box::new(e),
                            )
                        })?
                        .with_timezone(&Utc),
                    stage: row.get(3)?,
                    data: serde_json::from_str(&data_json).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            4,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(events)
    }
}
