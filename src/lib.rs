// Golden Record - Core Library
// Multi-source customer reconciliation plus real-time / batch update processing

pub mod error;
pub mod timestamp;      // ISO-8601 → UTC, no silent defaults
pub mod model;          // Source records, golden record, provenance
pub mod resolvers;      // Scalar / address / external-id merge policies
pub mod assembler;      // Golden record + provenance from sources
pub mod events;         // Update events and the update applier
pub mod audit;          // Audit entries, text logs, sinks
pub mod wal;            // Durable event log (ingest → replay)
pub mod processor;      // Dual-mode (real-time + batch) processing
pub mod registry;       // Per-customer serialized writers
pub mod store;          // JSON persistence + fallback baseline
pub mod db;             // SQLite audit mirror
pub mod config;
pub mod fixtures;       // Demo CRM / ERP feeds and events

// Re-export commonly used types
pub use error::{Error, Result};
pub use model::{
    Address, AddressProvenance, GoldenRecord, ProvenanceRecord, SourceRecord,
};
pub use resolvers::{
    merge_addresses, merge_external_ids, resolve_scalar,
    MergedAddresses, Resolved, ScalarField,
};
pub use assembler::{Assembly, GoldenRecordAssembler};
pub use events::{apply, check_order, check_order_from, UpdateEvent, UpdateOp};
pub use audit::{AuditFanout, AuditLog, AuditLogEntry, AuditSink, BatchJobMarker, Lane};
pub use wal::{EventLog, IngestReceipt};
pub use processor::{ConvergenceReport, DualModeEventProcessor, DualModeOutcome, LaneOutcome};
pub use registry::GoldenRecordRegistry;
pub use store::{
    fallback_golden, load_baseline, load_events, load_golden, load_sources,
    save_golden, save_provenance, Baseline, BaselineOrigin,
};
pub use db::{SqliteAudit, Event, setup_database, insert_assembly, insert_event, get_events_for_customer};
pub use config::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
