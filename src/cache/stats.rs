//! Cache Statistics Module
//!
//! Diagnostic counters and gauges for the recommendation cache.

use serde::Serialize;

// == Cache Stats ==
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Records currently stored
    pub entry_count: usize,
    /// Scopes currently registered
    pub scope_count: usize,
    /// Jobs currently in the processing state
    pub processing_count: usize,
    /// Oldest scope refresh (Unix milliseconds)
    pub oldest_scope_timestamp: Option<u64>,
    /// Newest scope refresh (Unix milliseconds)
    pub newest_scope_timestamp: Option<u64>,
    /// Scope lookups served from cache
    pub hits: u64,
    /// Scope lookups that told the caller to fetch
    pub misses: u64,
    /// Records reclaimed by eviction
    pub records_evicted: u64,
    /// Scopes reclaimed by eviction
    pub scopes_evicted: u64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self, scopes: usize, records: usize) {
        self.scopes_evicted += scopes as u64;
        self.records_evicted += records as u64;
    }
}
