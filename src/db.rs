// 🗃️ SQLite audit mirror - assemblies and applied events as queryable rows
//
// Optional alongside the text logs. Two tables:
//   golden_snapshots - one row per distinct assembly (fingerprint is the idempotency key)
//   events           - append-only audit trail, one row per applied event / job marker

use crate::assembler::Assembly;
use crate::audit::{AuditLogEntry, AuditSink, BatchJobMarker, Lane};
use crate::error::Result;
use crate::timestamp;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Event for audit trail ("every change is an event")
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL so both lanes can hold their own connection
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;

    // ==========================================================================
    // Golden snapshots (one row per distinct assembly result)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS golden_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fingerprint TEXT UNIQUE NOT NULL,
            customer_id TEXT NOT NULL,
            record TEXT NOT NULL,
            provenance TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_snapshots_customer ON golden_snapshots(customer_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)",
        [],
    )?;

    Ok(())
}

/// Store an assembly result. Returns false when an identical one is already stored.
pub fn insert_assembly(conn: &Connection, assembly: &Assembly) -> Result<bool> {
    let fingerprint = assembly.golden.fingerprint()?;
    let customer_id = assembly.golden.customer_key();
    let record_json = serde_json::to_string(&assembly.golden)?;
    let provenance_json = serde_json::to_string(&assembly.provenance)?;

    let result = conn.execute(
        "INSERT INTO golden_snapshots (fingerprint, customer_id, record, provenance, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            fingerprint,
            customer_id,
            record_json,
            provenance_json,
            timestamp::format(&assembly.golden.updated_at),
        ],
    );

    match result {
        Ok(_) => {
            let event = Event::new(
                "golden_assembled",
                "customer",
                &customer_id,
                serde_json::json!({
                    "fingerprint": fingerprint,
                    "provenance": assembly.provenance,
                }),
                "assembler",
            );
            insert_event(conn, &event)?;
            Ok(true)
        }
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            debug!(customer_id = %customer_id, "assembly already stored");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// Most recent stored assembly for a customer
pub fn latest_assembly(conn: &Connection, customer_id: &str) -> Result<Option<Assembly>> {
    let mut stmt = conn.prepare(
        "SELECT record, provenance FROM golden_snapshots
         WHERE customer_id = ?1
         ORDER BY id DESC
         LIMIT 1",
    )?;

    let mut rows = stmt.query(params![customer_id])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };

    let record_json: String = row.get(0)?;
    let provenance_json: String = row.get(1)?;
    Ok(Some(Assembly {
        golden: serde_json::from_str(&record_json)?,
        provenance: serde_json::from_str(&provenance_json)?,
    }))
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Audit rows for one customer, oldest first
pub fn get_events_for_customer(conn: &Connection, customer_id: &str) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = 'customer' AND entity_id = ?1
         ORDER BY id ASC",
    )?;

    let rows = stmt
        .query_map(params![customer_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(
            |(event_id, ts, event_type, entity_type, entity_id, data, actor)| -> Result<Event> {
                Ok(Event {
                    event_id,
                    timestamp: timestamp::parse_for(&ts, "events.timestamp")?,
                    event_type,
                    entity_type,
                    entity_id,
                    data: serde_json::from_str(&data)?,
                    actor,
                })
            },
        )
        .collect()
}

// ============================================================================
// AUDIT SINK
// ============================================================================

/// Audit sink writing each lane's entries into the `events` table
pub struct SqliteAudit {
    conn: Connection,
}

impl SqliteAudit {
    /// Open (and migrate) the audit database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        setup_database(&conn)?;
        Ok(SqliteAudit { conn })
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(SqliteAudit { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn lane_event_type(lane: Lane) -> &'static str {
    match lane {
        Lane::RealTime => "realtime_applied",
        Lane::Batch => "batch_applied",
    }
}

impl AuditSink for SqliteAudit {
    fn record(&mut self, entry: &AuditLogEntry) -> Result<()> {
        let mut event = Event::new(
            lane_event_type(entry.lane),
            "customer",
            &entry.after.customer_key(),
            serde_json::json!({
                "op": entry.op,
                "summary": entry.summary,
                "event_ts": timestamp::format(&entry.event_timestamp),
                "before": entry.before,
                "after": entry.after,
            }),
            entry.lane.as_str(),
        );
        event.event_id = entry.entry_id.clone();
        insert_event(&self.conn, &event)
    }

    fn job_marker(&mut self, marker: &BatchJobMarker) -> Result<()> {
        let (event_type, entity_id, data) = match marker {
            BatchJobMarker::Start { at, log_path, .. } => (
                "batch_job_start",
                String::new(),
                serde_json::json!({
                    "at": timestamp::format(at),
                    "log": log_path.display().to_string(),
                }),
            ),
            BatchJobMarker::End {
                at, final_state, ..
            } => (
                "batch_job_end",
                final_state.customer_key(),
                serde_json::json!({
                    "at": timestamp::format(at),
                    "final_state": final_state,
                }),
            ),
        };
        let event = Event::new(event_type, "batch_job", &entity_id, data, marker.job_id());
        insert_event(&self.conn, &event)
    }
}
