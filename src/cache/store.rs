//! Record Store Module
//!
//! Canonical `request_id -> RecommendationRecord` map. Reads hand out clones.

use std::collections::{HashMap, HashSet};

use crate::cache::RecommendationRecord;

// == Record Store ==
#[derive(Debug, Default)]
pub struct RecordStore {
    records: HashMap<u64, RecommendationRecord>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    // == Put ==
    /// Inserts or overwrites a record, stamping `updated_at = now`.
    ///
    /// `created_at` is kept from an earlier version of the record when the
    /// incoming one doesn't carry its own.
    pub fn put(&mut self, mut record: RecommendationRecord, now: u64) {
        if record.created_at == 0 {
            record.created_at = self
                .records
                .get(&record.request_id)
                .map(|existing| existing.created_at)
                .unwrap_or(now);
        }
        record.updated_at = now;
        self.records.insert(record.request_id, record);
    }

    // == Get ==
    pub fn get(&self, request_id: u64) -> Option<RecommendationRecord> {
        self.records.get(&request_id).cloned()
    }

    pub fn contains(&self, request_id: u64) -> bool {
        self.records.contains_key(&request_id)
    }

    // == Remove ==
    /// Removes a record. Returns whether anything was there; absent keys are a no-op.
    pub fn remove(&mut self, request_id: u64) -> bool {
        self.records.remove(&request_id).is_some()
    }

    /// Drops every record whose ID is not in `keep`. Returns how many went.
    pub fn retain_referenced(&mut self, keep: &HashSet<u64>) -> usize {
        let before = self.records.len();
        self.records.retain(|id, _| keep.contains(id));
        before - self.records.len()
    }

    // == All ==
    /// Snapshot of every record, ordered by request ID.
    pub fn all(&self) -> Vec<RecommendationRecord> {
        let mut records: Vec<_> = self.records.values().cloned().collect();
        records.sort_by_key(|r| r.request_id);
        records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
