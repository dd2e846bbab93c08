//! Request DTOs for the cache service API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;

use crate::cache::RecommendationRecord;

/// Request body for PUT /scopes/:scope
///
/// Records are listed in the producer's rank order.
#[derive(Debug, Clone, Deserialize)]
pub struct PutScopeRequest {
    pub records: Vec<RecommendationRecord>,
}

/// Query string for GET /scopes/:scope
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScopeQuery {
    /// Freshness window in milliseconds; the configured default when absent
    #[serde(default)]
    pub ttl_ms: Option<i64>,
}

/// Request body for POST /processing/:id/fail
#[derive(Debug, Clone, Deserialize)]
pub struct FailRequest {
    pub error: String,
}

impl FailRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.error.trim().is_empty() {
            return Some("Error message cannot be empty".to_string());
        }
        None
    }
}
