// ⚙️ Configuration - where the golden record, provenance, durable event log,
// audit logs, and optional SQLite audit mirror live
//
// Priority order:
//   1. Command-line flag (highest)
//   2. Environment variable (via clap `env`)
//   3. TOML config file
//   4. Compiled defaults

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// CONFIG
// ============================================================================

/// Config file looked up in the working directory when none is named
pub const DEFAULT_CONFIG_FILE: &str = "golden-record.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output_dir: PathBuf,
    pub golden_file: String,
    pub provenance_file: String,
    pub event_log_file: String,
    pub realtime_log_file: String,
    pub batch_log_file: String,
    /// SQLite audit mirror; disabled when unset
    pub audit_db: Option<PathBuf>,
    /// Systems consulted first for customer_id
    pub id_priority: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            output_dir: PathBuf::from("."),
            golden_file: "golden_record.json".to_string(),
            provenance_file: "provenance.json".to_string(),
            event_log_file: "batch_updates.jsonl".to_string(),
            realtime_log_file: "realtime.log".to_string(),
            batch_log_file: "batch.log".to_string(),
            audit_db: None,
            id_priority: vec!["CRM".to_string(), "ERP".to_string()],
        }
    }
}

impl Config {
    /// Load from `path` if given (must exist), else from `golden-record.toml`
    /// in the working directory if present, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        toml::from_str(&text).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Apply command-line / environment overrides
    pub fn with_overrides(mut self, output_dir: Option<PathBuf>, audit_db: Option<PathBuf>) -> Self {
        if let Some(dir) = output_dir {
            self.output_dir = dir;
        }
        if audit_db.is_some() {
            self.audit_db = audit_db;
        }
        self
    }

    pub fn golden_path(&self) -> PathBuf {
        self.output_dir.join(&self.golden_file)
    }

    pub fn provenance_path(&self) -> PathBuf {
        self.output_dir.join(&self.provenance_file)
    }

    pub fn event_log_path(&self) -> PathBuf {
        self.output_dir.join(&self.event_log_file)
    }

    pub fn realtime_log_path(&self) -> PathBuf {
        self.output_dir.join(&self.realtime_log_file)
    }

    pub fn batch_log_path(&self) -> PathBuf {
        self.output_dir.join(&self.batch_log_file)
    }
}

// ============================================================================
// TESTS
// ============================================================================
