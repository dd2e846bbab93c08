//! Periodic Sweep Task
//!
//! Background task that runs the cache's time-based reclamation pass.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::cache::WeakRecommendationCache;

/// Spawns a background task that sweeps the cache every `interval`.
///
/// The task holds only a weak handle, so it never keeps the cache alive;
/// it exits on its own once the cache is dropped. Ticks missed under load
/// are skipped rather than replayed. Each pass takes the same lock as
/// foreground operations.
///
/// # Returns
/// A JoinHandle for the spawned task, aborted by `RecommendationCache::close`.
pub fn spawn_sweep_task(cache: WeakRecommendationCache, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "starting cache sweep task");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Some(live) = cache.upgrade() else {
                debug!("cache dropped, sweep task exiting");
                break;
            };

            let report = live.sweep();
            if report.scopes_removed > 0 || report.records_removed > 0 || report.jobs_purged > 0 {
                info!(
                    scopes = report.scopes_removed,
                    records = report.records_removed,
                    jobs = report.jobs_purged,
                    "sweep reclaimed stale entries"
                );
            } else {
                debug!("sweep: nothing to reclaim");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::cache::{
        ManualClock, RecommendationCache, RecommendationRecord, RecommendationStatus, ScopeKey,
    };
    use crate::config::Config;

    fn config() -> Config {
        Config {
            default_ttl: Duration::from_millis(1_000),
            sweep_interval: Duration::from_millis(50),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_sweep_task_reclaims_stale_scopes() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = RecommendationCache::new(config(), clock.clone()).unwrap();
        cache
            .put_scope(
                ScopeKey::User(1),
                vec![RecommendationRecord::new(1, RecommendationStatus::Pending)],
            )
            .unwrap();

        cache.start_sweeper();
        assert!(cache.is_sweeping());

        clock.set(5_000);
        tokio::time::sleep(Duration::from_millis(200)).await;

        let stats = cache.stats();
        assert_eq!(stats.scope_count, 0);
        assert_eq!(stats.entry_count, 0);

        cache.close();
    }

    #[tokio::test]
    async fn test_sweep_task_preserves_fresh_scopes() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = RecommendationCache::new(config(), clock.clone()).unwrap();
        cache
            .put_scope(
                ScopeKey::All,
                vec![RecommendationRecord::new(1, RecommendationStatus::Pending)],
            )
            .unwrap();

        cache.start_sweeper();
        clock.set(500);
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(cache.stats().entry_count, 1);
        assert!(cache.get_record(1).is_some());

        cache.close();
    }

    #[tokio::test]
    async fn test_close_stops_sweeper() {
        let cache = RecommendationCache::with_system_clock(config()).unwrap();

        cache.start_sweeper();
        cache.close();
        cache.close();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!cache.is_sweeping());
    }

    #[tokio::test]
    async fn test_task_exits_when_cache_dropped() {
        let cache = RecommendationCache::with_system_clock(config()).unwrap();
        let handle = spawn_sweep_task(cache.downgrade(), Duration::from_millis(10));

        drop(cache);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "task should stop once the cache is gone");
    }
}
