//! Response DTOs for the cache service API
//!
//! Defines the structure of outgoing HTTP response bodies.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::{
    CacheStats, ProcessingState, ProcessingStatus, RecommendationRecord, ScopeKey, ScopeLookup,
};

/// Response body for GET /scopes/:scope
///
/// A miss is a normal answer (`hit: false`) telling the caller to refetch.
#[derive(Debug, Clone, Serialize)]
pub struct ScopeResponse {
    pub scope: ScopeKey,
    pub hit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<RecommendationRecord>>,
}

impl ScopeResponse {
    pub fn new(scope: ScopeKey, lookup: ScopeLookup) -> Self {
        let records = lookup.into_records();
        Self {
            scope,
            hit: records.is_some(),
            records,
        }
    }
}

/// Response body for PUT /scopes/:scope
#[derive(Debug, Clone, Serialize)]
pub struct PutScopeResponse {
    pub message: String,
    pub scope: ScopeKey,
    pub count: usize,
}

impl PutScopeResponse {
    pub fn new(scope: ScopeKey, count: usize) -> Self {
        Self {
            message: format!("Scope '{}' populated with {} records", scope, count),
            scope,
            count,
        }
    }
}

/// Response body for the DELETE endpoints
#[derive(Debug, Clone, Serialize)]
pub struct RemoveResponse {
    pub message: String,
    /// Whether anything was actually there
    pub removed: bool,
}

impl RemoveResponse {
    pub fn new(target: impl std::fmt::Display, removed: bool) -> Self {
        let message = if removed {
            format!("'{}' removed", target)
        } else {
            format!("'{}' was not cached", target)
        };
        Self { message, removed }
    }
}

/// Response body for GET /processing/:id and the processing mutations
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResponse {
    pub request_id: u64,
    pub status: ProcessingState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessingResponse {
    /// Untracked requests report as `idle`.
    pub fn new(request_id: u64, status: Option<ProcessingStatus>) -> Self {
        match status {
            Some(job) => Self {
                request_id,
                status: job.status,
                started_at: Some(job.started_at),
                completed_at: job.completed_at,
                error: job.error,
            },
            None => Self {
                request_id,
                status: ProcessingState::Idle,
                started_at: None,
                completed_at: None,
                error: None,
            },
        }
    }
}

/// Response body for GET /processing
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingListResponse {
    pub processing: Vec<u64>,
}

/// Response body for DELETE /cache
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
}

impl ClearResponse {
    pub fn cleared() -> Self {
        Self {
            message: "Cache cleared".to_string(),
        }
    }
}

/// Response body for GET /stats
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// `oldestScopeTimestamp` in ISO 8601
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_scope_at: Option<String>,
    /// `newestScopeTimestamp` in ISO 8601
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_scope_at: Option<String>,
}

impl StatsResponse {
    pub fn new(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            oldest_scope_at: stats.oldest_scope_timestamp.and_then(to_rfc3339),
            newest_scope_at: stats.newest_scope_timestamp.and_then(to_rfc3339),
            stats,
        }
    }
}

fn to_rfc3339(millis: u64) -> Option<String> {
    let millis = i64::try_from(millis).ok()?;
    DateTime::<Utc>::from_timestamp_millis(millis).map(|ts| ts.to_rfc3339())
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RecommendationStatus;

    #[test]
    fn test_scope_response_hit_and_miss() {
        let hit = ScopeResponse::new(
            ScopeKey::User(4),
            ScopeLookup::Hit(vec![RecommendationRecord::new(1, RecommendationStatus::Pending)]),
        );
        let json = serde_json::to_value(&hit).unwrap();
        assert_eq!(json["scope"], "user-4");
        assert_eq!(json["hit"], true);
        assert_eq!(json["records"][0]["requestId"], 1);

        let miss = ScopeResponse::new(ScopeKey::All, ScopeLookup::Miss);
        let json = serde_json::to_value(&miss).unwrap();
        assert_eq!(json["hit"], false);
        assert!(json.get("records").is_none());
    }

    #[test]
    fn test_processing_response_idle_when_untracked() {
        let resp = ProcessingResponse::new(3, None);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "idle");
        assert_eq!(json["requestId"], 3);
        assert!(json.get("startedAt").is_none());
    }

    #[test]
    fn test_stats_response_flattens() {
        let stats = CacheStats {
            entry_count: 2,
            hits: 3,
            misses: 1,
            oldest_scope_timestamp: Some(0),
            ..CacheStats::default()
        };
        let json = serde_json::to_value(StatsResponse::new(stats)).unwrap();
        assert_eq!(json["entryCount"], 2);
        assert_eq!(json["hitRate"], 0.75);
        assert_eq!(json["oldestScopeAt"], "1970-01-01T00:00:00+00:00");
        assert!(json.get("newestScopeAt").is_none());
    }

    #[test]
    fn test_remove_response_message() {
        assert!(RemoveResponse::new(7, true).message.contains("removed"));
        assert!(RemoveResponse::new("user-2", false).message.contains("not cached"));
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }
}
