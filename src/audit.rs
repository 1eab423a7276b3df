// 📜 Audit Trail - one entry per applied event, per lane
//
// Line formats (one line per entry, append-only):
//   [REALTIME] applied update at 2026-02-13T12:00:00Z | before→after: {...} → {...}
//   [BATCH] applied update (event_ts=2026-02-13T12:00:00Z) | before→after: {...} → {...}
//   [BATCH] job_start=<wall clock> reading batch_updates.jsonl
//   [BATCH] job_end=<wall clock> final_state={...}

use crate::error::{Error, Result};
use crate::events::UpdateEvent;
use crate::model::GoldenRecord;
use crate::timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

// ============================================================================
// LANE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lane {
    #[serde(rename = "real-time")]
    RealTime,
    #[serde(rename = "batch")]
    Batch,
}

impl Lane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::RealTime => "real-time",
            Lane::Batch => "batch",
        }
    }

    /// Prefix used in the text logs
    pub fn tag(&self) -> &'static str {
        match self {
            Lane::RealTime => "[REALTIME]",
            Lane::Batch => "[BATCH]",
        }
    }
}

// ============================================================================
// AUDIT LOG ENTRY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub entry_id: String,
    pub lane: Lane,
    /// Wire op name of the applied event ("update" / "add_address")
    pub op: String,
    /// e.g. "update email"
    pub summary: String,
    #[serde(with = "timestamp::serde_utc")]
    pub event_timestamp: DateTime<Utc>,
    pub before: GoldenRecord,
    pub after: GoldenRecord,
}

impl AuditLogEntry {
    pub fn new(lane: Lane, event: &UpdateEvent, before: GoldenRecord, after: GoldenRecord) -> Self {
        AuditLogEntry {
            entry_id: uuid::Uuid::new_v4().to_string(),
            lane,
            op: event.op.name().to_string(),
            summary: event.op.summary(),
            event_timestamp: event.timestamp,
            before,
            after,
        }
    }

    /// Human-readable log line
    pub fn to_line(&self) -> Result<String> {
        let before = serde_json::to_string(&self.before)?;
        let after = serde_json::to_string(&self.after)?;
        let ts = timestamp::format(&self.event_timestamp);

        let when = match self.lane {
            Lane::RealTime => format!("at {}", ts),
            Lane::Batch => format!("(event_ts={})", ts),
        };

        Ok(format!(
            "{} applied {} {} | before→after: {} → {}",
            self.lane.tag(),
            self.op,
            when,
            before,
            after
        ))
    }
}

// ============================================================================
// BATCH JOB MARKERS
// ============================================================================

/// Wall-clock brackets around a batch replay job (not event time)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BatchJobMarker {
    Start {
        job_id: String,
        at: DateTime<Utc>,
        log_path: PathBuf,
    },
    End {
        job_id: String,
        at: DateTime<Utc>,
        final_state: GoldenRecord,
    },
}

impl BatchJobMarker {
    pub fn job_id(&self) -> &str {
        match self {
            BatchJobMarker::Start { job_id, .. } | BatchJobMarker::End { job_id, .. } => job_id,
        }
    }

    pub fn to_line(&self) -> Result<String> {
        match self {
            BatchJobMarker::Start { at, log_path, .. } => Ok(format!(
                "{} job_start={} reading {}",
                Lane::Batch.tag(),
                timestamp::format(at),
                log_path.display()
            )),
            BatchJobMarker::End {
                at, final_state, ..
            } => Ok(format!(
                "{} job_end={} final_state={}",
                Lane::Batch.tag(),
                timestamp::format(at),
                serde_json::to_string(final_state)?
            )),
        }
    }
}

// ============================================================================
// SINKS
// ============================================================================

/// Destination for audit output. Each lane writes to its own sink.
pub trait AuditSink {
    fn record(&mut self, entry: &AuditLogEntry) -> Result<()>;

    fn job_marker(&mut self, _marker: &BatchJobMarker) -> Result<()> {
        Ok(())
    }

    /// Make everything written so far durable
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// In-memory sink collecting rendered lines
impl AuditSink for Vec<String> {
    fn record(&mut self, entry: &AuditLogEntry) -> Result<()> {
        self.push(entry.to_line()?);
        Ok(())
    }

    fn job_marker(&mut self, marker: &BatchJobMarker) -> Result<()> {
        self.push(marker.to_line()?);
        Ok(())
    }
}

/// Several sinks fed the same entries, in order
#[derive(Default)]
pub struct AuditFanout {
    sinks: Vec<Box<dyn AuditSink + Send>>,
}

impl AuditFanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl AuditSink + Send + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl AuditSink for AuditFanout {
    fn record(&mut self, entry: &AuditLogEntry) -> Result<()> {
        self.sinks.iter_mut().try_for_each(|s| s.record(entry))
    }

    fn job_marker(&mut self, marker: &BatchJobMarker) -> Result<()> {
        self.sinks.iter_mut().try_for_each(|s| s.job_marker(marker))
    }

    fn flush(&mut self) -> Result<()> {
        self.sinks.iter_mut().try_for_each(|s| s.flush())
    }
}

/// Line-oriented text log file, truncated on open
pub struct AuditLog {
    path: PathBuf,
    writer: BufWriter<File>,
    lines: usize,
}

impl AuditLog {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        Ok(AuditLog {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            lines: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines_written(&self) -> usize {
        self.lines
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.writer, "{}", line).map_err(|e| Error::io(&self.path, e))?;
        self.lines += 1;
        Ok(())
    }
}

impl AuditSink for AuditLog {
    fn record(&mut self, entry: &AuditLogEntry) -> Result<()> {
        let line = entry.to_line()?;
        self.write_line(&line)
    }

    fn job_marker(&mut self, marker: &BatchJobMarker) -> Result<()> {
        let line = marker.to_line()?;
        self.write_line(&line)
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(|e| Error::io(&self.path, e))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{apply, UpdateOp};
    use crate::store::fallback_golden;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_entry(lane: Lane) -> AuditLogEntry {
        let before = fallback_golden();
        let event = UpdateEvent::new(
            timestamp::parse("2026-02-13T12:00:00Z").unwrap(),
            UpdateOp::SetField {
                path: "email".to_string(),
                value: json!("amina.new@example.com"),
            },
        );
        let after = apply(&before, &event).unwrap();
        AuditLogEntry::new(lane, &event, before, after)
    }

    #[test]
    fn test_realtime_line_format() {
        let line = create_test_entry(Lane::RealTime).to_line().unwrap();
        assert!(line.starts_with("[REALTIME] applied update at 2026-02-13T12:00:00Z | before→after: {"));
        assert!(line.contains("mina.rahman@example.com"));
        assert!(line.contains(" → {"));
        assert!(line.contains("amina.new@example.com"));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_batch_line_format() {
        let line = create_test_entry(Lane::Batch).to_line().unwrap();
        assert!(line.starts_with("[BATCH] applied update (event_ts=2026-02-13T12:00:00Z) | before→after: "));
    }

    #[test]
    fn test_entry_summary_and_ids() {
        let a = create_test_entry(Lane::RealTime);
        let b = create_test_entry(Lane::RealTime);
        assert_eq!(a.summary, "update email");
        assert_ne!(a.entry_id, b.entry_id);
    }

    #[test]
    fn test_job_marker_lines() {
        let at = timestamp::parse("2026-02-14T00:00:00Z").unwrap();
        let start = BatchJobMarker::Start {
            job_id: "job-1".to_string(),
            at,
            log_path: PathBuf::from("batch_updates.jsonl"),
        };
        assert_eq!(
            start.to_line().unwrap(),
            "[BATCH] job_start=2026-02-14T00:00:00Z reading batch_updates.jsonl"
        );

        let end = BatchJobMarker::End {
            job_id: "job-1".to_string(),
            at,
            final_state: fallback_golden(),
        };
        let line = end.to_line().unwrap();
        assert!(line.starts_with("[BATCH] job_end=2026-02-14T00:00:00Z final_state={"));
        assert_eq!(end.job_id(), "job-1");
    }

    #[test]
    fn test_audit_log_file_one_line_per_entry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("realtime.log");

        let mut log = AuditLog::create(&path).unwrap();
        log.record(&create_test_entry(Lane::RealTime)).unwrap();
        log.record(&create_test_entry(Lane::RealTime)).unwrap();
        log.flush().unwrap();
        assert_eq!(log.lines_written(), 2);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().all(|l| l.starts_with("[REALTIME] applied update")));
    }

    #[test]
    fn test_fanout_feeds_every_sink() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("batch.log");

        let mut fanout = AuditFanout::new()
            .with(AuditLog::create(&path).unwrap())
            .with(Vec::<String>::new());
        assert_eq!(fanout.len(), 2);

        fanout.record(&create_test_entry(Lane::Batch)).unwrap();
        fanout.flush().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 1);
    }
}
