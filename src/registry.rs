// 🔐 Golden Record Registry - one writer at a time per customer
//
// Live golden records keyed by customer id. Each record sits behind its own
// mutex, so events for the same customer are applied one after another while
// different customers proceed independently.

use crate::error::{Error, Result};
use crate::events::{apply, check_order_from, UpdateEvent};
use crate::model::GoldenRecord;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;

pub struct GoldenRecordRegistry {
    records: RwLock<HashMap<String, Arc<Mutex<GoldenRecord>>>>,
}

impl GoldenRecordRegistry {
    pub fn new() -> Self {
        GoldenRecordRegistry {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Register (or replace) the live record for its customer id
    pub fn register(&self, record: GoldenRecord) -> Result<String> {
        let key = record.customer_key();
        let mut records = self
            .records
            .write()
            .map_err(|_| Error::Lock(key.clone()))?;
        records.insert(key.clone(), Arc::new(Mutex::new(record)));
        Ok(key)
    }

    fn slot(&self, customer_id: &str) -> Result<Arc<Mutex<GoldenRecord>>> {
        let records = self
            .records
            .read()
            .map_err(|_| Error::Lock(customer_id.to_string()))?;
        records
            .get(customer_id)
            .cloned()
            .ok_or_else(|| Error::UnknownCustomer(customer_id.to_string()))
    }

    /// Apply one event under the customer's lock and return the new state.
    ///
    /// Events older than the record's `updated_at` are refused: arrival order
    /// has to agree with event time for the record to stay consistent.
    pub fn submit(&self, customer_id: &str, event: &UpdateEvent) -> Result<GoldenRecord> {
        let slot = self.slot(customer_id)?;
        let mut record = slot
            .lock()
            .map_err(|_| Error::Lock(customer_id.to_string()))?;

        check_order_from(record.updated_at, std::slice::from_ref(event))?;

        let next = apply(&record, event)?;
        *record = next.clone();
        debug!(customer_id, op = %event.op.summary(), "registry event applied");

        Ok(next)
    }

    /// Current state of a customer's record
    pub fn snapshot(&self, customer_id: &str) -> Result<Option<GoldenRecord>> {
        let slot = match self.slot(customer_id) {
            Ok(slot) => slot,
            Err(Error::UnknownCustomer(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let record = slot
            .lock()
            .map_err(|_| Error::Lock(customer_id.to_string()))?;
        Ok(Some(record.clone()))
    }

    pub fn customer_ids(&self) -> Result<Vec<String>> {
        let records = self
            .records
            .read()
            .map_err(|_| Error::Lock(String::new()))?;
        let mut ids: Vec<String> = records.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    pub fn count(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }
}

impl Default for GoldenRecordRegistry {
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
    use crate::events::UpdateOp;
    use crate::fixtures::demo_events;
    use crate::model::Address;
    use crate::store::fallback_golden;
    use chrono::Duration;
    use serde_json::json;
    use std::thread;

    #[test]
    fn test_register_and_snapshot() {
        let registry = GoldenRecordRegistry::new();
        let key = registry.register(fallback_golden()).unwrap();

        assert_eq!(key, "CUST-1001");
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.snapshot("CUST-1001").unwrap(), Some(fallback_golden()));
        assert_eq!(registry.snapshot("nobody").unwrap(), None);
    }

    #[test]
    fn test_submit_matches_sequential_apply() {
        let registry = GoldenRecordRegistry::new();
        registry.register(fallback_golden()).unwrap();

        let mut expected = fallback_golden();
        for event in demo_events() {
            expected = apply(&expected, &event).unwrap();
            registry.submit("CUST-1001", &event).unwrap();
        }

        assert_eq!(registry.snapshot("CUST-1001").unwrap(), Some(expected));
    }

    #[test]
    fn test_submit_unknown_customer() {
        let registry = GoldenRecordRegistry::new();
        let result = registry.submit("CUST-404", &demo_events()[0]);
        assert!(matches!(result, Err(Error::UnknownCustomer(_))));
    }

    #[test]
    fn test_submit_refuses_stale_event() {
        let registry = GoldenRecordRegistry::new();
        registry.register(fallback_golden()).unwrap();
        let events = demo_events();

        registry.submit("CUST-1001", &events[2]).unwrap();
        let result = registry.submit("CUST-1001", &events[0]);
        assert!(matches!(result, Err(Error::OutOfOrder { .. })));

        // state unchanged by the refused event
        let state = registry.snapshot("CUST-1001").unwrap().unwrap();
        assert_eq!(state.email, fallback_golden().email);
    }

    #[test]
    fn test_concurrent_submitters_are_serialized() {
        let registry = Arc::new(GoldenRecordRegistry::new());
        registry.register(fallback_golden()).unwrap();
        let base = fallback_golden().updated_at;

        // every submitter uses the same timestamp so any interleaving is in order
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    let event = UpdateEvent::new(
                        base + Duration::hours(1),
                        UpdateOp::UpsertAddress {
                            address: Address::new(format!("extra-{}", i)),
                        },
                    );
                    registry.submit("CUST-1001", &event).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let state = registry.snapshot("CUST-1001").unwrap().unwrap();
        // home + billing + 8 distinct upserts, none lost
        assert_eq!(state.addresses.len(), 10);
    }

    #[test]
    fn test_customer_ids_sorted() {
        let registry = GoldenRecordRegistry::new();
        let mut other = fallback_golden();
        other.customer_id = json!("CUST-0001");
        registry.register(fallback_golden()).unwrap();
        registry.register(other).unwrap();

        assert_eq!(
            registry.customer_ids().unwrap(),
            vec!["CUST-0001".to_string(), "CUST-1001".to_string()]
        );
    }
}
