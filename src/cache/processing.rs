//! Processing Tracker Module
//!
//! Lifecycle of in-flight enrichment jobs, keyed by request ID and
//! independent of whether a record is cached for that request.
//!
//! Lifecycle: idle -> processing -> {completed, failed}. A new
//! `mark_processing` supersedes any earlier terminal state.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;

use crate::cache::RecordStore;

/// Error recorded on jobs failed by the timeout sweep.
pub const TIMED_OUT_ERROR: &str = "processing timed out";

// == Processing State ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingState {
    Idle,
    Processing,
    Completed,
    Failed,
}

// == Processing Status ==
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStatus {
    pub request_id: u64,
    pub status: ProcessingState,
    pub started_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// == Processing Tracker ==
#[derive(Debug, Default)]
pub struct ProcessingTracker {
    jobs: HashMap<u64, ProcessingStatus>,
}

impl ProcessingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    // == Mark Processing ==
    pub fn mark_processing(&mut self, request_id: u64, now: u64) {
        self.jobs.insert(
            request_id,
            ProcessingStatus {
                request_id,
                status: ProcessingState::Processing,
                started_at: now,
                completed_at: None,
                error: None,
            },
        );
    }

    // == Mark Completed ==
    /// Marks the job completed and drops the request's cached record so the
    /// next read refetches the enriched value.
    ///
    /// Returns whether a record was removed.
    pub fn mark_completed(&mut self, request_id: u64, now: u64, store: &mut RecordStore) -> bool {
        let job = self.entry(request_id, now);
        job.status = ProcessingState::Completed;
        job.completed_at = Some(now);
        job.error = None;
        store.remove(request_id)
    }

    // == Mark Failed ==
    /// Marks the job failed. Any cached record is left as it was.
    pub fn mark_failed(&mut self, request_id: u64, error: impl Into<String>, now: u64) {
        let job = self.entry(request_id, now);
        job.status = ProcessingState::Failed;
        job.completed_at = Some(now);
        job.error = Some(error.into());
    }

    fn entry(&mut self, request_id: u64, now: u64) -> &mut ProcessingStatus {
        self.jobs
            .entry(request_id)
            .or_insert_with(|| ProcessingStatus {
                request_id,
                status: ProcessingState::Idle,
                started_at: now,
                completed_at: None,
                error: None,
            })
    }

    // == Queries ==
    pub fn status_of(&self, request_id: u64) -> Option<ProcessingState> {
        self.jobs.get(&request_id).map(|job| job.status)
    }

    pub fn get(&self, request_id: u64) -> Option<ProcessingStatus> {
        self.jobs.get(&request_id).cloned()
    }

    /// Request IDs currently processing, ascending.
    pub fn all_processing(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .jobs
            .values()
            .filter(|job| job.status == ProcessingState::Processing)
            .map(|job| job.request_id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn processing_count(&self) -> usize {
        self.jobs
            .values()
            .filter(|job| job.status == ProcessingState::Processing)
            .count()
    }

    // == Expire Stuck ==
    /// Fails jobs that have been processing for `timeout` or longer.
    /// Returns the affected request IDs, ascending.
    pub fn expire_stuck(&mut self, timeout: Duration, now: u64) -> Vec<u64> {
        let timeout_ms = timeout.as_millis();
        let mut expired = Vec::new();
        for job in self.jobs.values_mut() {
            let age = u128::from(now.saturating_sub(job.started_at));
            if job.status == ProcessingState::Processing && age >= timeout_ms {
                job.status = ProcessingState::Failed;
                job.completed_at = Some(now);
                job.error = Some(TIMED_OUT_ERROR.to_string());
                expired.push(job.request_id);
            }
        }
        expired.sort_unstable();
        expired
    }

    // == Purge Terminal ==
    /// Drops completed and failed jobs that finished `retention` or longer
    /// ago. Processing jobs are never touched. Returns how many were dropped.
    pub fn purge_terminal(&mut self, retention: Duration, now: u64) -> usize {
        let retention_ms = retention.as_millis();
        let before = self.jobs.len();
        self.jobs.retain(|_, job| match (job.status, job.completed_at) {
            (ProcessingState::Completed | ProcessingState::Failed, Some(done)) => {
                u128::from(now.saturating_sub(done)) < retention_ms
            }
            _ => true,
        });
        before - self.jobs.len()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{RecommendationRecord, RecommendationStatus};

    #[test]
    fn test_lifecycle_processing_to_failed() {
        let mut tracker = ProcessingTracker::new();
        assert_eq!(tracker.status_of(42), None);

        tracker.mark_processing(42, 100);
        assert_eq!(tracker.status_of(42), Some(ProcessingState::Processing));
        assert_eq!(tracker.all_processing(), vec![42]);

        tracker.mark_failed(42, "timeout", 200);
        let job = tracker.get(42).unwrap();
        assert_eq!(job.status, ProcessingState::Failed);
        assert_eq!(job.error.as_deref(), Some("timeout"));
        assert_eq!(job.completed_at, Some(200));
        assert!(tracker.all_processing().is_empty());
    }

    #[test]
    fn test_completed_removes_record() {
        let mut tracker = ProcessingTracker::new();
        let mut store = RecordStore::new();
        store.put(RecommendationRecord::new(7, RecommendationStatus::Pending), 0);

        tracker.mark_processing(7, 0);
        assert!(tracker.mark_completed(7, 10, &mut store));

        assert_eq!(tracker.status_of(7), Some(ProcessingState::Completed));
        assert!(store.get(7).is_none());
        assert!(!tracker.mark_completed(7, 20, &mut store));
    }

    #[test]
    fn test_restart_supersedes_terminal_state() {
        let mut tracker = ProcessingTracker::new();
        tracker.mark_processing(1, 0);
        tracker.mark_failed(1, "boom", 5);
        tracker.mark_processing(1, 10);

        let job = tracker.get(1).unwrap();
        assert_eq!(job.status, ProcessingState::Processing);
        assert_eq!(job.started_at, 10);
        assert!(job.error.is_none());
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn test_expire_stuck() {
        let mut tracker = ProcessingTracker::new();
        tracker.mark_processing(1, 0);
        tracker.mark_processing(2, 50_000);
        tracker.mark_processing(3, 0);
        tracker.mark_failed(3, "boom", 1);

        let expired = tracker.expire_stuck(Duration::from_millis(60_000), 60_000);
        assert_eq!(expired, vec![1]);
        assert_eq!(tracker.get(1).unwrap().error.as_deref(), Some(TIMED_OUT_ERROR));
        assert_eq!(tracker.status_of(2), Some(ProcessingState::Processing));
        assert_eq!(tracker.get(3).unwrap().error.as_deref(), Some("boom"));
        assert_eq!(tracker.processing_count(), 1);
    }

    #[test]
    fn test_purge_terminal_keeps_recent_and_running() {
        let mut tracker = ProcessingTracker::new();
        let mut store = RecordStore::new();
        tracker.mark_processing(1, 0);
        tracker.mark_completed(1, 1_000, &mut store);
        tracker.mark_failed(2, "boom", 5_000);
        tracker.mark_processing(3, 0);

        let purged = tracker.purge_terminal(Duration::from_millis(4_000), 5_000);

        assert_eq!(purged, 1);
        assert_eq!(tracker.status_of(1), None);
        assert_eq!(tracker.status_of(2), Some(ProcessingState::Failed));
        assert_eq!(tracker.status_of(3), Some(ProcessingState::Processing));
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let mut tracker = ProcessingTracker::new();
        tracker.mark_processing(9, 1);
        let json = serde_json::to_value(tracker.get(9).unwrap()).unwrap();
        assert_eq!(json["status"], "processing");
        assert_eq!(json["requestId"], 9);
        assert!(json.get("error").is_none());
    }
}
