// ⚖️ Field Resolvers - pick one value when sources disagree
//
// Three policies, deliberately not the same:
//   scalars     → newest non-empty value wins (by source updated_at)
//   addresses   → newest source wins per address type
//   external ids → union, later source in input order overwrites a key
//
// Ties on updated_at keep the first source encountered (strict `>`).

use crate::error::Result;
use crate::model::{Address, AddressProvenance, SourceRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// ============================================================================
// SCALAR FIELDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarField {
    FirstName,
    LastName,
    Email,
    Phone,
}

impl ScalarField {
    pub const ALL: [ScalarField; 4] = [
        ScalarField::FirstName,
        ScalarField::LastName,
        ScalarField::Email,
        ScalarField::Phone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarField::FirstName => "first_name",
            ScalarField::LastName => "last_name",
            ScalarField::Email => "email",
            ScalarField::Phone => "phone",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }

    /// The source's value for this field; empty strings count as absent
    pub fn value_in<'a>(&self, source: &'a SourceRecord) -> Option<&'a str> {
        let value = match self {
            ScalarField::FirstName => source.first_name.as_deref(),
            ScalarField::LastName => source.last_name.as_deref(),
            ScalarField::Email => source.email.as_deref(),
            ScalarField::Phone => source.phone.as_deref(),
        };
        value.filter(|v| !v.is_empty())
    }
}

/// A value together with the system it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolved<T> {
    pub value: T,
    pub source: String,
}

/// Most recently updated non-empty value for `field`, or `None` when no
/// source has one.
///
/// Only candidate sources have their timestamps parsed; a malformed one
/// fails the whole resolution.
pub fn resolve_scalar(
    sources: &[SourceRecord],
    field: ScalarField,
) -> Result<Option<Resolved<String>>> {
    let mut best: Option<(DateTime<Utc>, &SourceRecord, &str)> = None;

    for source in sources {
        let Some(value) = field.value_in(source) else {
            continue;
        };
        let ts = source.updated_instant()?;

        let newer = match &best {
            None => true,
            Some((best_ts, _, _)) => ts > *best_ts,
        };
        if newer {
            best = Some((ts, source, value));
        }
    }

    Ok(best.map(|(_, source, value)| Resolved {
        value: value.to_string(),
        source: source.system.clone(),
    }))
}

// ============================================================================
// ADDRESS SET
// ============================================================================

/// Result of merging every source's address list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedAddresses {
    /// One entry per type, in order of first appearance
    pub addresses: Vec<Address>,

    /// Address type → source system that supplied the kept entry
    pub provenance: AddressProvenance,
}

/// Merge per-source address lists into one list keyed by type.
///
/// A later source replaces an already-claimed type only when its
/// `updated_at` is strictly greater. The replaced entry keeps the slot of the
/// type's first appearance.
pub fn merge_addresses(sources: &[SourceRecord]) -> Result<MergedAddresses> {
    struct Slot<'a> {
        address: &'a Address,
        ts: DateTime<Utc>,
        system: &'a str,
    }

    let mut slots: Vec<Slot> = Vec::new();
    let mut by_type: HashMap<&str, usize> = HashMap::new();

    for source in sources {
        let ts = source.updated_instant()?;

        for address in &source.addresses {
            match by_type.get(address.kind.as_str()).copied() {
                None => {
                    by_type.insert(address.kind.as_str(), slots.len());
                    slots.push(Slot {
                        address,
                        ts,
                        system: &source.system,
                    });
                }
                Some(idx) if ts > slots[idx].ts => {
                    slots[idx] = Slot {
                        address,
                        ts,
                        system: &source.system,
                    };
                }
                Some(_) => {}
            }
        }
    }

    let provenance = slots
        .iter()
        .map(|s| (s.address.kind.clone(), s.system.to_string()))
        .collect();
    let addresses = slots.into_iter().map(|s| s.address.clone()).collect();

    Ok(MergedAddresses {
        addresses,
        provenance,
    })
}

// ============================================================================
// EXTERNAL IDS
// ============================================================================

/// Union of every source's external-id map. Later sources (input order, not
/// timestamp order) overwrite keys already present. `None` when no source
/// contributes an identifier.
pub fn merge_external_ids(sources: &[SourceRecord]) -> Option<BTreeMap<String, String>> {
    let mut merged = BTreeMap::new();

    for ids in sources.iter().filter_map(|s| s.external_ids.as_ref()) {
        for (key, value) in ids {
            merged.insert(key.clone(), value.clone());
        }
    }

    if merged.is_empty() {
        None
    } else {
        Some(merged)
    }
}

// ============================================================================
// TESTS
// ============================================================================
