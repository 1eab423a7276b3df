// 📨 Update Events - the only way a golden record changes after assembly
//
// Wire form (event files and the durable log), one object per event:
//   {"ts": "2026-02-13T12:00:00Z", "op": "update", "path": "email", "value": "..."}
//   {"ts": "2026-02-13T12:01:15Z", "op": "add_address", "value": {"type": "shipping", ...}}
//
// An unknown `op` fails decoding; it is never skipped.

use crate::error::{Error, Result};
use crate::model::{Address, GoldenRecord};
use crate::timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

// ============================================================================
// EVENT TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum UpdateOp {
    /// Overwrite one top-level field, no type checks
    #[serde(rename = "update")]
    SetField { path: String, value: Value },

    /// Replace the address with the same type in place, or append it
    #[serde(rename = "add_address")]
    UpsertAddress {
        #[serde(rename = "value")]
        address: Address,
    },
}

impl UpdateOp {
    /// Wire tag ("update" / "add_address")
    pub fn name(&self) -> &'static str {
        match self {
            UpdateOp::SetField { .. } => "update",
            UpdateOp::UpsertAddress { .. } => "add_address",
        }
    }

    /// Short human description, e.g. "update email" or "add_address shipping"
    pub fn summary(&self) -> String {
        match self {
            UpdateOp::SetField { path, .. } => format!("{} {}", self.name(), path),
            UpdateOp::UpsertAddress { address } => format!("{} {}", self.name(), address.kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateEvent {
    #[serde(rename = "ts", with = "timestamp::serde_utc")]
    pub timestamp: DateTime<Utc>,

    #[serde(flatten)]
    pub op: UpdateOp,
}

impl UpdateEvent {
    pub fn new(timestamp: DateTime<Utc>, op: UpdateOp) -> Self {
        UpdateEvent { timestamp, op }
    }

    /// Decode one event from its JSON text
    pub fn from_json(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }
}

/// Timestamps must never go backwards inside one sequence. Equal timestamps
/// keep arrival order.
pub fn check_order(events: &[UpdateEvent]) -> Result<()> {
    for (index, pair) in events.windows(2).enumerate() {
        if pair[1].timestamp < pair[0].timestamp {
            return Err(Error::OutOfOrder {
                index: index + 1,
                timestamp: timestamp::format(&pair[1].timestamp),
                previous: timestamp::format(&pair[0].timestamp),
            });
        }
    }
    Ok(())
}

/// Like [`check_order`], and the first event may not predate `start` (the
/// record's current `updated_at`), so a record's clock never runs backwards.
pub fn check_order_from(start: DateTime<Utc>, events: &[UpdateEvent]) -> Result<()> {
    if let Some(first) = events.first() {
        if first.timestamp < start {
            return Err(Error::OutOfOrder {
                index: 0,
                timestamp: timestamp::format(&first.timestamp),
                previous: timestamp::format(&start),
            });
        }
    }
    check_order(events)
}

// ============================================================================
// UPDATE APPLIER
// ============================================================================

/// Apply one event to a record, returning the new state. The input record is
/// left untouched, so a failed apply never leaves a half-updated record.
///
/// `updated_at` is set to the event timestamp even when nothing else changes.
pub fn apply(record: &GoldenRecord, event: &UpdateEvent) -> Result<GoldenRecord> {
    let mut next = record.clone();

    match &event.op {
        UpdateOp::SetField { path, value } => set_field(&mut next, path, value)?,
        UpdateOp::UpsertAddress { address } => upsert_address(&mut next, address),
    }

    next.updated_at = event.timestamp;
    Ok(next)
}

fn set_field(record: &mut GoldenRecord, path: &str, value: &Value) -> Result<()> {
    match path {
        "customer_id" => record.customer_id = value.clone(),
        "first_name" => record.first_name = value.clone(),
        "last_name" => record.last_name = value.clone(),
        "email" => record.email = value.clone(),
        "phone" => record.phone = value.clone(),
        // typed slot: one entry per address type; null clears the list
        "addresses" if value.is_null() => record.addresses.clear(),
        "addresses" => {
            let addresses: Vec<Address> =
                serde_json::from_value(value.clone()).map_err(|e| Error::FieldShape {
                    path: path.to_string(),
                    reason: e.to_string(),
                })?;
            let mut seen = HashSet::new();
            if let Some(dup) = addresses.iter().find(|a| !seen.insert(a.kind.as_str())) {
                return Err(Error::FieldShape {
                    path: path.to_string(),
                    reason: format!("address type '{}' appears more than once", dup.kind),
                });
            }
            record.addresses = addresses;
        }
        "external_ids" => record.external_ids = value.clone(),
        // always replaced by the event timestamp
        "updated_at" => {}
        other => {
            record.extra.insert(other.to_string(), value.clone());
        }
    }
    Ok(())
}

fn upsert_address(record: &mut GoldenRecord, address: &Address) {
    match record.addresses.iter_mut().find(|a| a.kind == address.kind) {
        Some(existing) => *existing = address.clone(),
        None => record.addresses.push(address.clone()),
    }
}

// ============================================================================
// TESTS
// ============================================================================
