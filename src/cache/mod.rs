//! Cache Module
//!
//! In-process recommendation cache: a record store, per-scope staleness
//! tracking, enrichment job tracking, capacity and time based eviction, and
//! change notifications, composed behind [`RecommendationCache`].

mod clock;
mod eviction;
mod facade;
mod notify;
mod processing;
mod record;
mod scope;
mod stats;
mod store;


// Re-export public types
pub use clock::{current_timestamp_ms, Clock, ManualClock, SystemClock};
pub use eviction::{EvictionOutcome, EvictionPolicy};
pub use facade::{RecommendationCache, ScopeLookup, SweepReport, WeakRecommendationCache};
pub use notify::{Listener, NotificationBus, Subscription};
pub use processing::{ProcessingState, ProcessingStatus, ProcessingTracker, TIMED_OUT_ERROR};
pub use record::{RecommendationRecord, RecommendationStatus, UrgencyLevel, MAX_PRIORITY_SCORE};
pub use scope::{is_fresh_at, ScopeEntry, ScopeIndex, ScopeKey};
pub use stats::CacheStats;
pub use store::RecordStore;

// == Boundary Helpers ==
/// Converts a caller-supplied TTL in milliseconds, rejecting negatives.
pub fn parse_ttl_ms(ttl_ms: i64) -> crate::error::Result<std::time::Duration> {
    u64::try_from(ttl_ms)
        .map(std::time::Duration::from_millis)
        .map_err(|_| crate::error::CacheError::InvalidTtl(ttl_ms))
}
