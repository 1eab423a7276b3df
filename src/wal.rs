// 🗄️ Durable Event Log - ingest everything, then replay
//
// Two phases with an explicit hand-off:
//   1. ingest: write every event as one JSON line, flush, fsync → IngestReceipt
//   2. replay: needs the receipt; reads back complete lines in file order
//
// A line without its trailing newline was never fully written and is not
// replayed.

use crate::error::{Error, Result};
use crate::events::UpdateEvent;
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Proof that an ingest finished and hit the disk. Only [`EventLog`] makes these.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReceipt {
    path: PathBuf,
    events: usize,
    committed_at: DateTime<Utc>,
}

impl IngestReceipt {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of complete entries in the log at commit time
    pub fn events(&self) -> usize {
        self.events
    }

    pub fn committed_at(&self) -> DateTime<Utc> {
        self.committed_at
    }
}

#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        EventLog { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Phase 1: persist the whole sequence, in order, replacing any previous log
    pub fn ingest(&self, events: &[UpdateEvent]) -> Result<IngestReceipt> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let file = File::create(&self.path).map_err(|e| Error::io(&self.path, e))?;
        let mut writer = BufWriter::new(file);

        for event in events {
            serde_json::to_writer(&mut writer, event)?;
            writer
                .write_all(b"\n")
                .map_err(|e| Error::io(&self.path, e))?;
        }

        // durability barrier: nothing is replayable until this returns
        let file = writer
            .into_inner()
            .map_err(|e| Error::io(&self.path, e.into_error()))?;
        file.sync_all().map_err(|e| Error::io(&self.path, e))?;
        sync_parent_dir(&self.path)?;

        info!(
            path = %self.path.display(),
            events = events.len(),
            "event log committed"
        );

        Ok(IngestReceipt {
            path: self.path.clone(),
            events: events.len(),
            committed_at: Utc::now(),
        })
    }

    /// Receipt for a log written by an earlier run, counting only complete
    /// entries. Fails if the log does not exist.
    pub fn recover(&self) -> Result<IngestReceipt> {
        let text = fs::read_to_string(&self.path).map_err(|e| Error::io(&self.path, e))?;
        let events = complete_lines(&text)
            .filter(|(_, line)| !line.trim().is_empty())
            .count();

        Ok(IngestReceipt {
            path: self.path.clone(),
            events,
            committed_at: Utc::now(),
        })
    }

    /// Phase 2: decode the committed log in file order
    pub fn replay(&self, receipt: &IngestReceipt) -> Result<Vec<UpdateEvent>> {
        let path = receipt.path();
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;

        if !text.is_empty() && !text.ends_with('\n') {
            warn!(path = %path.display(), "event log ends in a partial entry, ignoring it");
        }

        let mut events = Vec::with_capacity(receipt.events());
        for (idx, line) in complete_lines(&text) {
            if line.trim().is_empty() {
                continue;
            }
            let event = UpdateEvent::from_json(line).map_err(|source| Error::EventDecode {
                line: idx + 1,
                source,
            })?;
            events.push(event);
        }

        if events.len() != receipt.events() {
            warn!(
                expected = receipt.events(),
                found = events.len(),
                "event log entry count differs from ingest receipt"
            );
        }
        debug!(events = events.len(), "event log read back");

        Ok(events)
    }
}

/// fsync the directory holding `path` so a newly created log's directory
/// entry survives a crash along with its contents
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> Result<()> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => dir,
        None => Path::new("."),
    };
    File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| Error::io(dir, e))
}

// directories cannot be opened as files here; the file fsync is all there is
#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> Result<()> {
    Ok(())
}

/// Newline-terminated lines with their 0-based index; drops an unterminated tail
fn complete_lines(text: &str) -> impl Iterator<Item = (usize, &str)> + '_ {
    text.split_inclusive('\n')
        .enumerate()
        .filter(|(_, line)| line.ends_with('\n'))
        .map(|(idx, line)| (idx, line.trim_end_matches(['\r', '\n'])))
}

// ============================================================================
// TESTS
// ============================================================================
