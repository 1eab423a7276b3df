// 🏅 Golden Record Assembler - many disagreeing sources in, one record + provenance out
//
// customer_id  → first source in priority order that has one
// scalars      → resolvers::resolve_scalar (newest non-empty)
// addresses    → resolvers::merge_addresses (newest per type)
// external ids → resolvers::merge_external_ids (union, provenance = union marker)
// updated_at   → newest source updated_at

use crate::error::{Error, Result};
use crate::model::{GoldenRecord, ProvenanceRecord, SourceRecord};
use crate::resolvers::{merge_addresses, merge_external_ids, resolve_scalar, ScalarField};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Golden record plus its provenance shadow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assembly {
    pub golden: GoldenRecord,
    pub provenance: ProvenanceRecord,
}

pub struct GoldenRecordAssembler {
    /// Systems consulted first for `customer_id`, in order. Systems not listed
    /// follow in input order.
    pub id_priority: Vec<String>,
}

impl GoldenRecordAssembler {
    /// Plain left-to-right fallback over the input order
    pub fn new() -> Self {
        GoldenRecordAssembler {
            id_priority: Vec::new(),
        }
    }

    pub fn with_id_priority<I, S>(systems: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        GoldenRecordAssembler {
            id_priority: systems.into_iter().map(Into::into).collect(),
        }
    }

    /// Build the golden record and provenance from source snapshots.
    ///
    /// Pure: the same source list always yields the same output.
    pub fn assemble(&self, sources: &[SourceRecord]) -> Result<Assembly> {
        if sources.is_empty() {
            return Err(Error::NoSources);
        }

        let mut golden = GoldenRecord {
            customer_id: Value::Null,
            first_name: Value::Null,
            last_name: Value::Null,
            email: Value::Null,
            phone: Value::Null,
            addresses: Vec::new(),
            external_ids: Value::Null,
            updated_at: sources[0].updated_instant()?,
            extra: BTreeMap::new(),
        };
        let mut provenance = ProvenanceRecord::default();

        // customer_id
        if let Some(source) = self.id_source(sources) {
            if let Some(id) = &source.customer_id {
                golden.customer_id = Value::String(id.clone());
                provenance.customer_id = Some(source.system.clone());
            }
        }

        // scalars
        for field in ScalarField::ALL {
            let Some(resolved) = resolve_scalar(sources, field)? else {
                continue;
            };
            let value = Value::String(resolved.value);
            let source = Some(resolved.source);
            match field {
                ScalarField::FirstName => {
                    golden.first_name = value;
                    provenance.first_name = source;
                }
                ScalarField::LastName => {
                    golden.last_name = value;
                    provenance.last_name = source;
                }
                ScalarField::Email => {
                    golden.email = value;
                    provenance.email = source;
                }
                ScalarField::Phone => {
                    golden.phone = value;
                    provenance.phone = source;
                }
            }
        }

        // addresses
        let merged = merge_addresses(sources)?;
        golden.addresses = merged.addresses;
        provenance.addresses = merged.provenance;

        // external ids
        if let Some(ids) = merge_external_ids(sources) {
            golden.external_ids =
                Value::Object(ids.into_iter().map(|(k, v)| (k, Value::String(v))).collect());
            provenance.external_ids = Some(ProvenanceRecord::union_marker(
                sources.iter().map(|s| s.system.as_str()),
            ));
        }

        // updated_at: newest source, first one on ties
        let mut newest = &sources[0];
        for source in &sources[1..] {
            let ts = source.updated_instant()?;
            if ts > golden.updated_at {
                golden.updated_at = ts;
                newest = source;
            }
        }
        provenance.updated_at = Some(newest.system.clone());

        debug!(
            customer_id = %golden.customer_key(),
            sources = sources.len(),
            addresses = golden.addresses.len(),
            "assembled golden record"
        );

        Ok(Assembly { golden, provenance })
    }

    /// First source, in priority order, carrying a non-empty customer_id
    fn id_source<'a>(&self, sources: &'a [SourceRecord]) -> Option<&'a SourceRecord> {
        let rank = |source: &SourceRecord| {
            self.id_priority
                .iter()
                .position(|system| *system == source.system)
                .unwrap_or(self.id_priority.len())
        };

        let mut ordered: Vec<&SourceRecord> = sources.iter().collect();
        // stable sort keeps input order inside a rank
        ordered.sort_by_key(|s| rank(s));

        ordered
            .into_iter()
            .find(|s| s.customer_id.as_deref().is_some_and(|id| !id.is_empty()))
    }
}

impl Default for GoldenRecordAssembler {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{crm_source, erp_source};
    use crate::model::Address;
    use serde_json::json;
    use std::collections::BTreeSet;

    #[test]
    fn test_assemble_crm_erp_golden_record() {
        let assembler = GoldenRecordAssembler::new();
        let assembly = assembler.assemble(&[crm_source(), erp_source()]).unwrap();
        let golden = &assembly.golden;

        assert_eq!(golden.customer_id, json!("CUST-1001"));
        assert_eq!(golden.first_name, json!("Amina"));
        assert_eq!(golden.email, json!("amina.rahman@example.com"));
        assert_eq!(golden.phone, json!("+1-416-555-0197"));
        assert_eq!(golden.addresses.len(), 2);
        assert_eq!(golden.addresses[0].kind, "home");
        assert_eq!(golden.addresses[1].kind, "billing");
        assert_eq!(
            crate::timestamp::format(&golden.updated_at),
            "2026-02-12T08:30:00Z"
        );
    }

    #[test]
    fn test_assemble_provenance() {
        let assembly = GoldenRecordAssembler::new()
            .assemble(&[crm_source(), erp_source()])
            .unwrap();
        let prov = &assembly.provenance;

        assert_eq!(prov.customer_id.as_deref(), Some("CRM"));
        assert_eq!(prov.phone.as_deref(), Some("ERP"));
        assert_eq!(prov.email.as_deref(), Some("ERP"));
        assert_eq!(prov.addresses["home"], "CRM");
        assert_eq!(prov.addresses["billing"], "ERP");
        assert_eq!(prov.external_ids.as_deref(), Some("union(CRM,ERP)"));
        assert_eq!(prov.updated_at.as_deref(), Some("ERP"));
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let assembler = GoldenRecordAssembler::new();
        let sources = vec![crm_source(), erp_source()];

        let first = serde_json::to_vec(&assembler.assemble(&sources).unwrap()).unwrap();
        let second = serde_json::to_vec(&assembler.assemble(&sources).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_provenance_matches_non_null_scalars() {
        let mut crm = crm_source();
        crm.email = None;
        let mut erp = erp_source();
        erp.email = Some(String::new());

        let assembly = GoldenRecordAssembler::new().assemble(&[crm, erp]).unwrap();

        for field in ScalarField::ALL {
            let name = field.as_str();
            assert_eq!(
                assembly.golden.field(name).is_some(),
                assembly.provenance.source_of(name).is_some(),
                "value/provenance mismatch for {}",
                name
            );
        }
        assert!(assembly.golden.field("email").is_none());
    }

    #[test]
    fn test_customer_id_priority_order() {
        let assembler = GoldenRecordAssembler::with_id_priority(["ERP", "CRM"]);
        let assembly = assembler.assemble(&[crm_source(), erp_source()]).unwrap();

        assert_eq!(assembly.golden.customer_id, json!("1001"));
        assert_eq!(assembly.provenance.customer_id.as_deref(), Some("ERP"));
    }

    #[test]
    fn test_customer_id_falls_back_past_empty() {
        let mut crm = crm_source();
        crm.customer_id = Some(String::new());

        let assembly = GoldenRecordAssembler::new()
            .assemble(&[crm, erp_source()])
            .unwrap();
        assert_eq!(assembly.golden.customer_id, json!("1001"));
        assert_eq!(assembly.provenance.customer_id.as_deref(), Some("ERP"));
    }

    #[test]
    fn test_external_id_keys_are_union_of_sources() {
        let mut crm = crm_source();
        crm.external_ids = Some(
            [("loyalty".to_string(), "L-77".to_string())]
                .into_iter()
                .collect(),
        );
        let erp = erp_source();

        let expected: BTreeSet<String> = crm
            .external_ids
            .iter()
            .chain(erp.external_ids.iter())
            .flat_map(|m| m.keys().cloned())
            .collect();

        let assembly = GoldenRecordAssembler::new().assemble(&[crm, erp]).unwrap();
        let got: BTreeSet<String> = assembly
            .golden
            .external_ids
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_no_external_ids_means_no_union_marker() {
        let mut erp = erp_source();
        erp.external_ids = None;

        let assembly = GoldenRecordAssembler::new()
            .assemble(&[crm_source(), erp])
            .unwrap();
        assert!(assembly.golden.external_ids.is_null());
        assert!(assembly.provenance.external_ids.is_none());
    }

    #[test]
    fn test_updated_at_tie_keeps_first_source() {
        let mut a = SourceRecord::new("CRM", "2026-02-12T08:30:00Z");
        a.addresses = vec![Address::new("home")];
        let b = SourceRecord::new("ERP", "2026-02-12T08:30:00Z");

        let assembly = GoldenRecordAssembler::new().assemble(&[a, b]).unwrap();
        assert_eq!(assembly.provenance.updated_at.as_deref(), Some("CRM"));
    }

    #[test]
    fn test_assemble_rejects_malformed_timestamp() {
        let mut erp = erp_source();
        erp.updated_at = "12/02/2026".to_string();

        let err = GoldenRecordAssembler::new()
            .assemble(&[crm_source(), erp])
            .unwrap_err();
        assert!(matches!(err, Error::Timestamp { .. }));
    }

    #[test]
    fn test_assemble_empty_sources() {
        let err = GoldenRecordAssembler::new().assemble(&[]).unwrap_err();
        assert!(matches!(err, Error::NoSources));
    }
}
