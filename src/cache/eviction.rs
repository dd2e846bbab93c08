//! Eviction Policy Module
//!
//! Decides what to reclaim from the scope index and record store. Holds no
//! cache state of its own; both triggers only bound memory and never change
//! the answer for an unexpired scope.

use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::{RecordStore, ScopeIndex, ScopeKey};
use crate::config::Config;

// == Outcomes ==
/// What one eviction pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionOutcome {
    pub scopes_removed: usize,
    pub records_removed: usize,
}

impl EvictionOutcome {
    pub fn is_empty(&self) -> bool {
        self.scopes_removed == 0 && self.records_removed == 0
    }
}

// == Eviction Policy ==
#[derive(Debug, Clone, PartialEq)]
pub struct EvictionPolicy {
    ttl: Duration,
    max_entries: usize,
    fraction: f64,
}

impl EvictionPolicy {
    pub fn new(ttl: Duration, max_entries: usize, fraction: f64) -> Self {
        Self {
            ttl,
            max_entries,
            fraction,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.default_ttl,
            config.max_entries,
            config.eviction_fraction,
        )
    }

    // == Time-Based Reclamation ==
    /// Drops every scope older than the TTL, then every record no remaining
    /// scope references.
    ///
    /// While the `all` scope is fresh it pins every record and nothing is
    /// removed from the store.
    pub fn sweep(&self, scopes: &mut ScopeIndex, store: &mut RecordStore, now: u64) -> EvictionOutcome {
        let stale = scopes.stale_keys(self.ttl, now);
        for key in &stale {
            scopes.invalidate(key);
        }

        let records_removed = if scopes.get(&ScopeKey::All).is_some() {
            debug!("sweep: 'all' scope is fresh, keeping every record");
            0
        } else {
            store.retain_referenced(&scopes.referenced_ids())
        };

        EvictionOutcome {
            scopes_removed: stale.len(),
            records_removed,
        }
    }

    // == Capacity-Based Reclamation ==
    /// True when inserting `incoming_new` unseen records would overflow.
    pub fn needs_room(&self, current: usize, incoming_new: usize) -> bool {
        current + incoming_new > self.max_entries
    }

    /// Frees room for a put of `incoming` into `target`.
    ///
    /// Unreferenced records go first. While that isn't enough, the oldest
    /// share of scopes (by last refresh, ties by registration order) is
    /// dropped along with records nothing else references. `target` is
    /// never evicted and its previous list doesn't count as a reference.
    ///
    /// The limit is soft: if `incoming` alone exceeds it, the put still
    /// proceeds and the store ends up over capacity.
    pub fn make_room(
        &self,
        scopes: &mut ScopeIndex,
        store: &mut RecordStore,
        target: &ScopeKey,
        incoming: &HashSet<u64>,
    ) -> EvictionOutcome {
        let mut outcome = EvictionOutcome::default();

        loop {
            let mut keep = scopes.referenced_ids_except(target);
            keep.extend(incoming.iter().copied());
            outcome.records_removed += store.retain_referenced(&keep);

            let incoming_new = incoming.iter().filter(|id| !store.contains(**id)).count();
            if !self.needs_room(store.len(), incoming_new) {
                break;
            }

            let candidates: Vec<ScopeKey> = scopes
                .keys_oldest_first()
                .into_iter()
                .filter(|key| key != target)
                .collect();
            if candidates.is_empty() {
                warn!(
                    scope = %target,
                    entries = store.len(),
                    incoming = incoming_new,
                    max_entries = self.max_entries,
                    "capacity exceeded with nothing left to evict; allowing overflow"
                );
                break;
            }

            let batch = self.batch_size(scopes.len()).min(candidates.len());
            for key in &candidates[..batch] {
                scopes.invalidate(key);
            }
            outcome.scopes_removed += batch;
            debug!(scope = %target, evicted_scopes = batch, "capacity eviction round");
        }

        outcome
    }

    fn batch_size(&self, scope_count: usize) -> usize {
        ((scope_count as f64) * self.fraction).ceil().max(1.0) as usize
    }
}
