//! Recommendation Cache - process-local cache for AI care recommendations
//!
//! Serves recommendation records per scope ("all" or one user's list) with
//! per-scope staleness, tracks enrichment jobs, bounds memory through time
//! and capacity based eviction, and notifies subscribers on every change.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{RecommendationCache, ScopeKey, ScopeLookup, Subscription};
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::spawn_sweep_task;
