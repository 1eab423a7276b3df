// 💾 JSON persistence - golden record, provenance, and input files
//
// The golden record is written once after assembly and read back as the
// baseline for update processing. A missing baseline file is not an error:
// the documented fallback record is used instead. A baseline file that exists
// but does not parse IS an error.

use crate::error::{Error, Result};
use crate::events::UpdateEvent;
use crate::model::{Address, GoldenRecord, ProvenanceRecord, SourceRecord};
use crate::timestamp;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Where the baseline came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaselineOrigin {
    File,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct Baseline {
    pub record: GoldenRecord,
    pub origin: BaselineOrigin,
}

// ============================================================================
// WRITE
// ============================================================================

fn write_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    fs::write(path, text).map_err(|e| Error::io(path, e))
}

pub fn save_golden(path: &Path, golden: &GoldenRecord) -> Result<()> {
    write_pretty(path, golden)?;
    info!(path = %path.display(), "golden record written");
    Ok(())
}

pub fn save_provenance(path: &Path, provenance: &ProvenanceRecord) -> Result<()> {
    write_pretty(path, provenance)?;
    info!(path = %path.display(), "provenance written");
    Ok(())
}

// ============================================================================
// READ
// ============================================================================

/// Golden record at `path`, `None` if the file does not exist
pub fn load_golden(path: &Path) -> Result<Option<GoldenRecord>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    Ok(Some(serde_json::from_str(&text)?))
}

/// Baseline for update processing: the persisted golden record, or the
/// fallback record when none has been written yet.
pub fn load_baseline(path: &Path) -> Result<Baseline> {
    match load_golden(path)? {
        Some(record) => {
            info!(path = %path.display(), "loaded golden record baseline");
            Ok(Baseline {
                record,
                origin: BaselineOrigin::File,
            })
        }
        None => {
            warn!(path = %path.display(), "golden record not found, using fallback baseline");
            Ok(Baseline {
                record: fallback_golden(),
                origin: BaselineOrigin::Fallback,
            })
        }
    }
}

/// Source snapshots from a JSON array; array order is the priority order
pub fn load_sources(path: &Path) -> Result<Vec<SourceRecord>> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    Ok(serde_json::from_str(&text)?)
}

/// Events from either a JSON array or newline-delimited JSON
pub fn load_events(path: &Path) -> Result<Vec<UpdateEvent>> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;

    if text.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(&text)?);
    }

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            UpdateEvent::from_json(line).map_err(|source| Error::EventDecode {
                line: idx + 1,
                source,
            })
        })
        .collect()
}

// ============================================================================
// FALLBACK
// ============================================================================

/// Baseline used when no golden record has been persisted. The email differs
/// from the assembled record on purpose: it is the value the business agreed
/// to seed with, not a merge result.
pub fn fallback_golden() -> GoldenRecord {
    GoldenRecord {
        customer_id: json!("CUST-1001"),
        first_name: json!("Amina"),
        last_name: json!("Rahman"),
        email: json!("mina.rahman@example.com"),
        phone: json!("+1-416-555-0197"),
        addresses: vec![
            Address::new("home")
                .with_line1("123 Bloor St W")
                .with_locality("Toronto", "ON", "M5S 1W7", "CA"),
            Address::new("billing")
                .with_line1("400 King St E")
                .with_locality("Toronto", "ON", "M5A 1L7", "CA"),
        ],
        external_ids: json!({"crm": "CUST-1001", "erp": "1001"}),
        updated_at: timestamp::fixed_utc(2026, 2, 12, 8, 30, 0),
        extra: BTreeMap::new(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{demo_events, demo_sources};
    use tempfile::TempDir;

    #[test]
    fn test_fallback_baseline_when_missing() {
        let dir = TempDir::new().unwrap();
        let baseline = load_baseline(&dir.path().join("golden_record.json")).unwrap();

        assert_eq!(baseline.origin, BaselineOrigin::Fallback);
        assert_eq!(baseline.record, fallback_golden());
    }

    #[test]
    fn test_golden_round_trip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("golden_record.json");

        let mut golden = fallback_golden();
        golden.extra.insert("loyalty_tier".to_string(), json!("gold"));
        save_golden(&path, &golden).unwrap();

        let baseline = load_baseline(&path).unwrap();
        assert_eq!(baseline.origin, BaselineOrigin::File);
        assert_eq!(baseline.record, golden);
    }

    #[test]
    fn test_corrupt_baseline_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("golden_record.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(load_baseline(&path).is_err());
    }

    #[test]
    fn test_load_sources_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sources.json");
        fs::write(&path, serde_json::to_string(&demo_sources()).unwrap()).unwrap();

        let sources = load_sources(&path).unwrap();
        assert_eq!(sources, demo_sources());
    }

    #[test]
    fn test_load_events_array_and_jsonl() {
        let dir = TempDir::new().unwrap();

        let array_path = dir.path().join("events.json");
        fs::write(&array_path, serde_json::to_string(&demo_events()).unwrap()).unwrap();
        assert_eq!(load_events(&array_path).unwrap(), demo_events());

        let jsonl_path = dir.path().join("events.jsonl");
        let lines: Vec<String> = demo_events()
            .iter()
            .map(|e| serde_json::to_string(e).unwrap())
            .collect();
        fs::write(&jsonl_path, lines.join("\n\n")).unwrap();
        assert_eq!(load_events(&jsonl_path).unwrap(), demo_events());
    }

    #[test]
    fn test_load_events_reports_bad_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.jsonl");
        fs::write(
            &path,
            "{\"ts\":\"2026-02-13T12:00:00Z\",\"op\":\"update\",\"path\":\"email\",\"value\":\"a\"}\n{\"ts\":\"2026-02-13T12:01:00Z\",\"op\":\"merge\"}\n",
        )
        .unwrap();

        match load_events(&path) {
            Err(Error::EventDecode { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected EventDecode, got {:?}", other.map(|e| e.len())),
        }
    }
}
