use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use super::{ReachabilityRecord, ReachabilityStore, Result};

/// Process-local store with the same last-write-wins rule as the database.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, ReachabilityRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, ip: &str) -> Option<ReachabilityRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(ip)
            .cloned()
    }
}

impl ReachabilityStore for MemoryStore {
    async fn upsert(&self, record: &ReachabilityRecord) -> Result<String> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        match records.get_mut(&record.ip_address) {
            Some(stored) if record.supersedes(stored) => *stored = record.clone(),
            Some(_) => {}
            None => {
                records.insert(record.ip_address.clone(), record.clone());
            }
        }
        Ok(record.ip_address.clone())
    }

    async fn get_all(&self) -> Result<Vec<ReachabilityRecord>> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records.values().cloned().collect())
    }
}
