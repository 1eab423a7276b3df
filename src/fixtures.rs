// 🧪 Demo feeds - a CRM snapshot, an ERP snapshot, and a short update stream
//
// Used by the CLI when no input files are given, and by tests.

use crate::events::{UpdateEvent, UpdateOp};
use crate::model::{Address, SourceRecord};
use crate::timestamp;
use chrono::{DateTime, Utc};
use serde_json::json;

/// Simulated CRM feed: owns the canonical customer id, knows the home address
pub fn crm_source() -> SourceRecord {
    let mut crm = SourceRecord::new("CRM", "2026-02-11T09:00:00Z");
    crm.customer_id = Some("CUST-1001".to_string());
    crm.first_name = Some("Amina".to_string());
    crm.last_name = Some("Rahman".to_string());
    crm.email = Some("amina.r@example.com".to_string());
    crm.addresses = vec![Address::new("home")
        .with_line1("123 Bloor St W")
        .with_locality("Toronto", "ON", "M5S 1W7", "CA")];
    crm
}

/// Simulated ERP feed: newer, has the phone, billing address and cross-system ids
pub fn erp_source() -> SourceRecord {
    let mut erp = SourceRecord::new("ERP", "2026-02-12T08:30:00Z");
    erp.customer_id = Some("1001".to_string());
    erp.first_name = Some("Amina".to_string());
    erp.last_name = Some("Rahman".to_string());
    erp.email = Some("amina.rahman@example.com".to_string());
    erp.phone = Some("+1-416-555-0197".to_string());
    erp.addresses = vec![Address::new("billing")
        .with_line1("400 King St E")
        .with_locality("Toronto", "ON", "M5A 1L7", "CA")];
    erp.external_ids = Some(
        [("crm", "CUST-1001"), ("erp", "1001")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    );
    erp
}

/// CRM first: its customer id wins the left-to-right fallback
pub fn demo_sources() -> Vec<SourceRecord> {
    vec![crm_source(), erp_source()]
}

fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    timestamp::fixed_utc(2026, 2, 13, h, m, s)
}

/// Email change, new shipping address, phone change
pub fn demo_events() -> Vec<UpdateEvent> {
    vec![
        UpdateEvent::new(
            at(12, 0, 0),
            UpdateOp::SetField {
                path: "email".to_string(),
                value: json!("amina.new@example.com"),
            },
        ),
        UpdateEvent::new(
            at(12, 1, 15),
            UpdateOp::UpsertAddress {
                address: Address::new("shipping")
                    .with_line1("77 Dundas St W")
                    .with_locality("Toronto", "ON", "M5G 1Z3", "CA"),
            },
        ),
        UpdateEvent::new(
            at(12, 3, 42),
            UpdateOp::SetField {
                path: "phone".to_string(),
                value: json!("+1-416-555-7777"),
            },
        ),
    ]
}
