// ⚠️ Errors - one enum for merge, update, log, and storage failures
//
// Every fallible library call returns `error::Result`. The CLI wraps these in
// anyhow with context.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// ERROR TYPE
// ============================================================================

/// Result type for library operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Timestamp text that is not ISO-8601 with a `Z` or numeric offset
    #[error("Invalid timestamp {value:?} for {context}: {source}")]
    Timestamp {
        value: String,
        context: String,
        #[source]
        source: chrono::ParseError,
    },

    /// File system error, tagged with the path that was being touched
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An entry of the durable event log (or an event file) could not be decoded.
    /// Unknown `op` tags land here.
    #[error("Undecodable event at line {line}: {source}")]
    EventDecode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Event timestamps go backwards inside one sequence
    #[error("Event #{index} at {timestamp} is older than its predecessor at {previous}")]
    OutOfOrder {
        index: usize,
        timestamp: String,
        previous: String,
    },

    /// SetField value for `addresses` is not a list of addresses with distinct types
    #[error("Value for field '{path}' has the wrong shape: {reason}")]
    FieldShape { path: String, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A per-customer lock was poisoned by a panicking writer
    #[error("Lock poisoned for customer '{0}'")]
    Lock(String),

    #[error("No golden record registered for customer '{0}'")]
    UnknownCustomer(String),

    #[error("No source records supplied")]
    NoSources,
}

// ============================================================================
// CONSTRUCTORS
// ============================================================================

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
