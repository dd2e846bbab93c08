//! Recommendation Cache Facade
//!
//! Public entry point composing the record store, scope index, processing
//! tracker, eviction policy and notification bus. Every operation runs
//! synchronously under one mutex; listeners are notified after the mutex is
//! released, on the calling thread.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{
    CacheStats, Clock, EvictionPolicy, NotificationBus, ProcessingState, ProcessingStatus,
    ProcessingTracker, RecommendationRecord, RecordStore, ScopeIndex, ScopeKey, Subscription,
    SystemClock,
};
use crate::config::Config;
use crate::error::{CacheError, Result};

// == Scope Lookup ==
/// Result of a scoped read. A miss tells the caller to fetch and `put_scope`.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeLookup {
    Hit(Vec<RecommendationRecord>),
    Miss,
}

impl ScopeLookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, ScopeLookup::Hit(_))
    }

    pub fn into_records(self) -> Option<Vec<RecommendationRecord>> {
        match self {
            ScopeLookup::Hit(records) => Some(records),
            ScopeLookup::Miss => None,
        }
    }
}

// == Sweep Report ==
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scopes_removed: usize,
    pub records_removed: usize,
    /// Jobs failed by the processing timeout
    pub jobs_timed_out: Vec<u64>,
    /// Completed or failed jobs dropped after the retention window
    pub jobs_purged: usize,
}

#[derive(Debug, Default)]
struct CacheState {
    records: RecordStore,
    scopes: ScopeIndex,
    processing: ProcessingTracker,
    stats: CacheStats,
}

impl CacheState {
    /// The scope's records in rank order, if it is fresh and fully resolvable.
    fn resolve(&self, scope: &ScopeKey, ttl: Duration, now: u64) -> Option<Vec<RecommendationRecord>> {
        let ids = self.scopes.get_if_fresh(scope, ttl, now)?;
        ids.iter().map(|id| self.records.get(*id)).collect()
    }
}

#[derive(Debug)]
struct Inner {
    config: Config,
    clock: Arc<dyn Clock>,
    policy: EvictionPolicy,
    state: Mutex<CacheState>,
    bus: NotificationBus,
    /// Per-scope gates coalescing concurrent fetches
    inflight: Mutex<HashMap<ScopeKey, Arc<tokio::sync::Mutex<()>>>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let handle = self.sweeper.get_mut().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// == Recommendation Cache ==
/// Shared handle to one cache instance. Clones share state.
#[derive(Debug, Clone)]
pub struct RecommendationCache {
    inner: Arc<Inner>,
}

/// Non-owning handle, used by the background sweep.
#[derive(Debug, Clone)]
pub struct WeakRecommendationCache {
    inner: Weak<Inner>,
}

impl WeakRecommendationCache {
    pub fn upgrade(&self) -> Option<RecommendationCache> {
        self.inner.upgrade().map(|inner| RecommendationCache { inner })
    }
}

impl RecommendationCache {
    // == Constructors ==
    pub fn new(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let policy = EvictionPolicy::from_config(&config);
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                clock,
                policy,
                state: Mutex::new(CacheState::default()),
                bus: NotificationBus::new(),
                inflight: Mutex::new(HashMap::new()),
                sweeper: Mutex::new(None),
            }),
        })
    }

    pub fn with_system_clock(config: Config) -> Result<Self> {
        Self::new(config, Arc::new(SystemClock))
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn downgrade(&self) -> WeakRecommendationCache {
        WeakRecommendationCache {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn now(&self) -> u64 {
        self.inner.clock.now_ms()
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        lock(&self.inner.state)
    }

    // == Get Scope ==
    /// Returns the scope's records in rank order if it was refreshed less
    /// than `ttl` ago and every record it lists is still cached.
    ///
    /// A zero TTL always misses. `Duration::MAX` never expires on read, but
    /// the background sweep still drops scopes older than the configured
    /// `default_ttl`, so a longer read TTL does not outlive the sweep.
    pub fn get_scope(&self, scope: &ScopeKey, ttl: Duration) -> ScopeLookup {
        let now = self.now();
        let mut state = self.state();

        match state.resolve(scope, ttl, now) {
            Some(records) => {
                state.stats.record_hit();
                debug!(scope = %scope, records = records.len(), "scope hit");
                ScopeLookup::Hit(records)
            }
            None => {
                state.stats.record_miss();
                debug!(scope = %scope, "scope miss");
                ScopeLookup::Miss
            }
        }
    }

    /// `get_scope` with the configured default TTL.
    pub fn get_scope_default(&self, scope: &ScopeKey) -> ScopeLookup {
        self.get_scope(scope, self.inner.config.default_ttl)
    }

    // == Put Scope ==
    /// Replaces the scope with `records` (in rank order), writes them
    /// through to the record store and marks the scope fresh.
    ///
    /// Invalid input rejects the whole put and leaves the cache untouched.
    /// The entry limit is soft: a put larger than `max_entries` on its own
    /// still succeeds and leaves the cache over capacity.
    pub fn put_scope(&self, scope: ScopeKey, records: Vec<RecommendationRecord>) -> Result<()> {
        self.put_scope_resolved(scope, records).map(|_| ())
    }

    fn put_scope_resolved(
        &self,
        scope: ScopeKey,
        records: Vec<RecommendationRecord>,
    ) -> Result<Vec<RecommendationRecord>> {
        let mut ids = Vec::with_capacity(records.len());
        let mut incoming = HashSet::with_capacity(records.len());
        for record in &records {
            record.validate()?;
            if !incoming.insert(record.request_id) {
                return Err(CacheError::InvalidRecord(format!(
                    "request {} appears more than once in scope {}",
                    record.request_id, scope
                )));
            }
            ids.push(record.request_id);
        }

        let now = self.now();
        let (stored, version, snapshot) = {
            let mut guard = self.state();
            let state = &mut *guard;

            let incoming_new = incoming.iter().filter(|id| !state.records.contains(**id)).count();
            if self.inner.policy.needs_room(state.records.len(), incoming_new) {
                let outcome = self.inner.policy.make_room(
                    &mut state.scopes,
                    &mut state.records,
                    &scope,
                    &incoming,
                );
                state
                    .stats
                    .record_eviction(outcome.scopes_removed, outcome.records_removed);
            }

            for record in records {
                state.records.put(record, now);
            }
            state.scopes.set(scope, ids.clone(), now);

            let stored: Vec<RecommendationRecord> =
                ids.iter().filter_map(|id| state.records.get(*id)).collect();
            (stored, self.inner.bus.next_version(), state.records.all())
        };

        debug!(scope = %scope, records = stored.len(), "scope populated");
        self.inner.bus.publish(version, snapshot);
        Ok(stored)
    }

    // == Get Or Fetch ==
    /// Serves the scope from cache, or runs `fetch` and stores its result.
    ///
    /// Concurrent callers for the same scope share one fetch: later callers
    /// wait for the first and are then served from cache. Each call counts
    /// one hit or one miss in the stats. A failed fetch
    /// leaves the cache untouched and the error goes to the caller that ran it.
    pub async fn get_or_fetch_scope<F, Fut, E>(
        &self,
        scope: ScopeKey,
        ttl: Duration,
        fetch: F,
    ) -> std::result::Result<Vec<RecommendationRecord>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Vec<RecommendationRecord>, E>>,
        E: From<CacheError>,
    {
        if let ScopeLookup::Hit(records) = self.get_scope(&scope, ttl) {
            return Ok(records);
        }

        let gate = {
            let mut inflight = lock(&self.inner.inflight);
            inflight.entry(scope).or_default().clone()
        };

        let result = {
            let _turn = gate.lock().await;
            let now = self.now();
            let cached = self.state().resolve(&scope, ttl, now);
            match cached {
                Some(records) => {
                    debug!(scope = %scope, "joined an in-flight fetch");
                    Ok(records)
                }
                None => match fetch().await {
                    Ok(records) => self.put_scope_resolved(scope, records).map_err(E::from),
                    Err(err) => Err(err),
                },
            }
        };

        let mut inflight = lock(&self.inner.inflight);
        if inflight
            .get(&scope)
            .is_some_and(|current| Arc::ptr_eq(current, &gate) && Arc::strong_count(current) == 2)
        {
            inflight.remove(&scope);
        }

        result
    }

    // == Records ==
    pub fn get_record(&self, request_id: u64) -> Option<RecommendationRecord> {
        self.state().records.get(request_id)
    }

    /// Drops one record. Removing an absent record is a no-op.
    pub fn remove_record(&self, request_id: u64) -> bool {
        let (version, snapshot) = {
            let mut state = self.state();
            if !state.records.remove(request_id) {
                return false;
            }
            (self.inner.bus.next_version(), state.records.all())
        };
        debug!(request_id, "record removed");
        self.inner.bus.publish(version, snapshot);
        true
    }

    /// Drops a scope entry; its records stay until eviction reclaims them.
    pub fn invalidate_scope(&self, scope: &ScopeKey) -> bool {
        let removed = self.state().scopes.invalidate(scope);
        debug!(scope = %scope, removed, "scope invalidated");
        removed
    }

    // == Processing ==
    pub fn mark_processing(&self, request_id: u64) {
        let now = self.now();
        self.state().processing.mark_processing(request_id, now);
        debug!(request_id, "enrichment started");
    }

    /// Marks the job completed and drops its cached record so the next read
    /// of any scope listing it misses.
    pub fn mark_completed(&self, request_id: u64) {
        let now = self.now();
        let (version, snapshot) = {
            let mut guard = self.state();
            let state = &mut *guard;
            let removed = state
                .processing
                .mark_completed(request_id, now, &mut state.records);
            debug!(request_id, record_removed = removed, "enrichment completed");
            (self.inner.bus.next_version(), state.records.all())
        };
        self.inner.bus.publish(version, snapshot);
    }

    /// Marks the job failed; any cached record is kept.
    pub fn mark_failed(&self, request_id: u64, error: impl Into<String>) {
        let now = self.now();
        let error = error.into();
        debug!(request_id, error = %error, "enrichment failed");
        self.state().processing.mark_failed(request_id, error, now);
    }

    pub fn status_of(&self, request_id: u64) -> Option<ProcessingState> {
        self.state().processing.status_of(request_id)
    }

    pub fn processing_status(&self, request_id: u64) -> Option<ProcessingStatus> {
        self.state().processing.get(request_id)
    }

    pub fn all_processing(&self) -> Vec<u64> {
        self.state().processing.all_processing()
    }

    // == Subscribe ==
    /// Registers a listener that receives the record snapshot after every
    /// mutation. Keep the returned handle alive for as long as needed.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[RecommendationRecord]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.bus.subscribe(listener)
    }

    // == Clear ==
    /// Drops all records, scopes, jobs and counters.
    pub fn clear(&self) {
        let version = {
            let mut state = self.state();
            *state = CacheState::default();
            self.inner.bus.next_version()
        };
        info!("cache cleared");
        self.inner.bus.publish(version, Vec::new());
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        let state = self.state();
        let mut stats = state.stats.clone();
        stats.entry_count = state.records.len();
        stats.scope_count = state.scopes.len();
        stats.processing_count = state.processing.processing_count();
        stats.oldest_scope_timestamp = state.scopes.oldest_refreshed_at();
        stats.newest_scope_timestamp = state.scopes.newest_refreshed_at();
        stats
    }

    // == Sweep ==
    /// Runs one time-based reclamation pass, plus the processing timeout
    /// when one is configured. Finished jobs older than `default_ttl` are
    /// dropped from the tracker.
    pub fn sweep(&self) -> SweepReport {
        let now = self.now();
        let (report, snapshot) = {
            let mut guard = self.state();
            let state = &mut *guard;

            let outcome = self
                .inner
                .policy
                .sweep(&mut state.scopes, &mut state.records, now);
            state
                .stats
                .record_eviction(outcome.scopes_removed, outcome.records_removed);

            let jobs_timed_out = match self.inner.config.processing_timeout {
                Some(timeout) => state.processing.expire_stuck(timeout, now),
                None => Vec::new(),
            };
            let jobs_purged = state
                .processing
                .purge_terminal(self.inner.config.default_ttl, now);

            let snapshot = (outcome.records_removed > 0)
                .then(|| (self.inner.bus.next_version(), state.records.all()));
            let report = SweepReport {
                scopes_removed: outcome.scopes_removed,
                records_removed: outcome.records_removed,
                jobs_timed_out,
                jobs_purged,
            };
            (report, snapshot)
        };

        if !report.jobs_timed_out.is_empty() {
            warn!(jobs = ?report.jobs_timed_out, "enrichment jobs timed out");
        }
        if let Some((version, snapshot)) = snapshot {
            self.inner.bus.publish(version, snapshot);
        }
        report
    }

    // == Lifecycle ==
    /// Starts the periodic background sweep. Needs a running tokio runtime.
    /// Calling it again while a sweeper runs does nothing.
    pub fn start_sweeper(&self) {
        let mut sweeper = lock(&self.inner.sweeper);
        if sweeper.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        *sweeper = Some(crate::tasks::spawn_sweep_task(
            self.downgrade(),
            self.inner.config.sweep_interval,
        ));
    }

    /// Stops the background sweep. Safe to call more than once.
    pub fn close(&self) {
        if let Some(handle) = lock(&self.inner.sweeper).take() {
            handle.abort();
            info!("background sweep stopped");
        }
    }

    pub fn is_sweeping(&self) -> bool {
        lock(&self.inner.sweeper)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}
