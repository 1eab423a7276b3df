// 🧾 Customer data model - source snapshots, the golden record, and its provenance shadow
//
// Source records are immutable inputs. The golden record is built once by the
// assembler and afterwards changes only through `events::apply`. Provenance is
// a parallel structure keyed like the golden record and is never touched by
// update events.

use crate::error::Result;
use crate::timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Provenance marker prefix for union-merged external ids
pub const UNION_MARKER: &str = "union";

// ============================================================================
// ADDRESS
// ============================================================================

/// Typed postal address. Identity inside a merge is `kind` (serialized as
/// `type`); every other field is opaque JSON carried through as received,
/// nulls and non-string values included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(rename = "type", default = "default_address_type")]
    pub kind: String,

    /// line1, city, postal_code, ... plus whatever else the source sent
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

fn default_address_type() -> String {
    "unknown".to_string()
}

impl Address {
    pub fn new(kind: impl Into<String>) -> Self {
        Address {
            kind: kind.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder: any field
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Builder: street line
    pub fn with_line1(self, line1: impl Into<String>) -> Self {
        self.with_field("line1", line1.into())
    }

    /// Builder: city / province / postal code / country in one go
    pub fn with_locality(
        self,
        city: impl Into<String>,
        province: impl Into<String>,
        postal_code: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        self.with_field("city", city.into())
            .with_field("province", province.into())
            .with_field("postal_code", postal_code.into())
            .with_field("country", country.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// String value of a field; `None` when absent or not a string
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

// ============================================================================
// SOURCE RECORD
// ============================================================================

/// One system's view of a customer (CRM feed, ERP feed, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Source system identifier, e.g. "CRM"
    pub system: String,

    #[serde(default)]
    pub customer_id: Option<String>,

    #[serde(default)]
    pub first_name: Option<String>,

    #[serde(default)]
    pub last_name: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub phone: Option<String>,

    #[serde(default)]
    pub addresses: Vec<Address>,

    #[serde(default)]
    pub external_ids: Option<BTreeMap<String, String>>,

    /// Raw ISO-8601 text as delivered; parsed when the record is ranked
    pub updated_at: String,
}

impl SourceRecord {
    pub fn new(system: impl Into<String>, updated_at: impl Into<String>) -> Self {
        SourceRecord {
            system: system.into(),
            customer_id: None,
            first_name: None,
            last_name: None,
            email: None,
            phone: None,
            addresses: Vec::new(),
            external_ids: None,
            updated_at: updated_at.into(),
        }
    }

    /// Parsed `updated_at`; a malformed value fails whatever is ranking this source
    pub fn updated_instant(&self) -> Result<DateTime<Utc>> {
        timestamp::parse_for(
            &self.updated_at,
            &format!("{}.updated_at", self.system),
        )
    }
}

// ============================================================================
// GOLDEN RECORD
// ============================================================================

/// The reconciled customer record.
///
/// Scalar slots hold raw JSON values: `SetField` events overwrite them without
/// checking the value against what was there before. `Value::Null` means absent.
/// Keys that are not part of the fixed shape end up in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldenRecord {
    #[serde(default)]
    pub customer_id: Value,

    #[serde(default)]
    pub first_name: Value,

    #[serde(default)]
    pub last_name: Value,

    #[serde(default)]
    pub email: Value,

    #[serde(default)]
    pub phone: Value,

    #[serde(default)]
    pub addresses: Vec<Address>,

    /// Merged id map after assembly; updates may put any JSON here
    #[serde(default)]
    pub external_ids: Value,

    #[serde(with = "timestamp::serde_utc")]
    pub updated_at: DateTime<Utc>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl GoldenRecord {
    /// Customer id as a lookup key (empty when the record has none)
    pub fn customer_key(&self) -> String {
        match &self.customer_id {
            Value::Null => String::new(),
            Value::String(id) => id.clone(),
            other => other.to_string(),
        }
    }

    /// Value of a top-level field, `None` when absent or null
    pub fn field(&self, name: &str) -> Option<&Value> {
        let value = match name {
            "customer_id" => &self.customer_id,
            "first_name" => &self.first_name,
            "last_name" => &self.last_name,
            "email" => &self.email,
            "phone" => &self.phone,
            "external_ids" => &self.external_ids,
            other => self.extra.get(other)?,
        };
        if value.is_null() {
            None
        } else {
            Some(value)
        }
    }

    /// Address entry for a type, if present
    pub fn address(&self, kind: &str) -> Option<&Address> {
        self.addresses.iter().find(|a| a.kind == kind)
    }

    /// SHA-256 over the compact JSON form. Struct fields serialize in
    /// declaration order and maps are sorted, so equal records hash equal.
    pub fn fingerprint(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }
}

// ============================================================================
// PROVENANCE RECORD
// ============================================================================

/// Address type → contributing source system
pub type AddressProvenance = BTreeMap<String, String>;

/// Same keys as [`GoldenRecord`], holding the source system that supplied
/// each value (or the union marker for external ids). Written once per assembly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub customer_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub addresses: AddressProvenance,
    pub external_ids: Option<String>,
    pub updated_at: Option<String>,
}

impl ProvenanceRecord {
    /// Source for a scalar slot by field name
    pub fn source_of(&self, name: &str) -> Option<&str> {
        match name {
            "customer_id" => self.customer_id.as_deref(),
            "first_name" => self.first_name.as_deref(),
            "last_name" => self.last_name.as_deref(),
            "email" => self.email.as_deref(),
            "phone" => self.phone.as_deref(),
            "external_ids" => self.external_ids.as_deref(),
            "updated_at" => self.updated_at.as_deref(),
            _ => None,
        }
    }

    /// `union(CRM,ERP)` style marker for set-merged fields
    pub fn union_marker<'a>(systems: impl IntoIterator<Item = &'a str>) -> String {
        let joined: Vec<&str> = systems.into_iter().collect();
        format!("{}({})", UNION_MARKER, joined.join(","))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_test_golden() -> GoldenRecord {
        GoldenRecord {
            customer_id: json!("CUST-1001"),
            first_name: json!("Amina"),
            last_name: json!("Rahman"),
            email: Value::Null,
            phone: json!("+1-416-555-0197"),
            addresses: vec![Address::new("home").with_line1("123 Bloor St W")],
            external_ids: Value::Null,
            updated_at: timestamp::parse("2026-02-12T08:30:00Z").unwrap(),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn test_address_type_defaults_to_unknown() {
        let addr: Address = serde_json::from_value(json!({"line1": "1 Main St"})).unwrap();
        assert_eq!(addr.kind, "unknown");
        assert_eq!(addr.text("line1"), Some("1 Main St"));
    }

    #[test]
    fn test_address_carries_unknown_fields() {
        let raw = json!({"type": "home", "line1": "1 Main St", "unit": "4B"});
        let addr: Address = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(addr.get("unit"), Some(&json!("4B")));
        assert_eq!(serde_json::to_value(&addr).unwrap(), raw);
    }

    #[test]
    fn test_address_fields_keep_json_types() {
        let raw = json!({"type": "billing", "postal_code": 10001, "line1": null, "city": "Toronto"});
        let addr: Address = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(addr.get("postal_code"), Some(&json!(10001)));
        assert_eq!(addr.get("line1"), Some(&Value::Null));
        assert_eq!(addr.text("postal_code"), None);
        assert_eq!(serde_json::to_value(&addr).unwrap(), raw);
    }

    #[test]
    fn test_address_builders() {
        let addr = Address::new("home")
            .with_line1("1 Main St")
            .with_locality("Toronto", "ON", "M5S 1W7", "CA");
        assert_eq!(addr.text("line1"), Some("1 Main St"));
        assert_eq!(addr.text("country"), Some("CA"));
        assert_eq!(addr.fields.len(), 5);
    }

    #[test]
    fn test_source_record_minimal_json() {
        let src: SourceRecord = serde_json::from_value(json!({
            "system": "ERP",
            "updated_at": "2026-02-12T08:30:00Z"
        }))
        .unwrap();
        assert!(src.addresses.is_empty());
        assert!(src.external_ids.is_none());
        assert!(src.updated_instant().is_ok());
    }

    #[test]
    fn test_source_record_bad_timestamp_names_system() {
        let src = SourceRecord::new("CRM", "not-a-date");
        let err = src.updated_instant().unwrap_err().to_string();
        assert!(err.contains("CRM.updated_at"), "got: {}", err);
    }

    #[test]
    fn test_golden_record_json_shape() {
        let golden = create_test_golden();
        let value = serde_json::to_value(&golden).unwrap();

        assert_eq!(value["customer_id"], json!("CUST-1001"));
        assert_eq!(value["email"], Value::Null);
        assert_eq!(value["external_ids"], Value::Null);
        assert_eq!(value["updated_at"], json!("2026-02-12T08:30:00Z"));
        assert_eq!(value["addresses"][0]["type"], json!("home"));
    }

    #[test]
    fn test_golden_record_extra_keys_survive() {
        let mut raw = serde_json::to_value(create_test_golden()).unwrap();
        raw["loyalty_tier"] = json!("gold");

        let golden: GoldenRecord = serde_json::from_value(raw).unwrap();
        assert_eq!(golden.field("loyalty_tier"), Some(&json!("gold")));
        assert_eq!(golden.field("email"), None);
    }

    #[test]
    fn test_fingerprint_is_stable_and_sensitive() {
        let a = create_test_golden();
        let mut b = create_test_golden();
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        assert_eq!(a.fingerprint().unwrap().len(), 64);

        b.email = json!("amina@example.com");
        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }

    #[test]
    fn test_customer_key() {
        let mut golden = create_test_golden();
        assert_eq!(golden.customer_key(), "CUST-1001");
        golden.customer_id = json!(1001);
        assert_eq!(golden.customer_key(), "1001");
        golden.customer_id = Value::Null;
        assert_eq!(golden.customer_key(), "");
    }

    #[test]
    fn test_union_marker() {
        assert_eq!(
            ProvenanceRecord::union_marker(["CRM", "ERP"]),
            "union(CRM,ERP)"
        );
    }
}
