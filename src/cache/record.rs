//! Recommendation Record Module
//!
//! Defines the cached recommendation produced for a care request.

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Highest allowed priority score.
pub const MAX_PRIORITY_SCORE: u32 = 100;

// == Urgency Level ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UrgencyLevel {
    Low,
    Medium,
    High,
    Critical,
}

// == Recommendation Status ==
/// Producer-side status of a recommendation.
///
/// `Pending` means the producer acknowledged the request but has no data yet,
/// which is different from having no record at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

// == Recommendation Record ==
/// A single AI-generated recommendation, keyed by request ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRecord {
    /// Care request this recommendation belongs to
    pub request_id: u64,
    /// Priority score in 0..=100. Wider on the wire so out-of-range
    /// values reach `validate` instead of failing to deserialize.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency_level: Option<UrgencyLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation_text: Option<String>,
    pub status: RecommendationStatus,
    /// Creation timestamp (Unix milliseconds), 0 = assigned on insert
    #[serde(default)]
    pub created_at: u64,
    /// Last write timestamp (Unix milliseconds), stamped by the store
    #[serde(default)]
    pub updated_at: u64,
}

impl RecommendationRecord {
    // == Constructor ==
    /// Creates a record with only an ID and status; timestamps are stamped on insert.
    pub fn new(request_id: u64, status: RecommendationStatus) -> Self {
        Self {
            request_id,
            priority_score: None,
            urgency_level: None,
            recommendation_text: None,
            status,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn with_score(mut self, score: u32) -> Self {
        self.priority_score = Some(score);
        self
    }

    pub fn with_urgency(mut self, urgency: UrgencyLevel) -> Self {
        self.urgency_level = Some(urgency);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.recommendation_text = Some(text.into());
        self
    }

    // == Validate ==
    /// Checks the score range and that a completed record carries text.
    pub fn validate(&self) -> Result<()> {
        if let Some(score) = self.priority_score {
            if score > MAX_PRIORITY_SCORE {
                return Err(CacheError::InvalidRecord(format!(
                    "request {}: priority score {} exceeds {}",
                    self.request_id, score, MAX_PRIORITY_SCORE
                )));
            }
        }

        if self.status == RecommendationStatus::Completed {
            let has_text = self
                .recommendation_text
                .as_deref()
                .is_some_and(|text| !text.trim().is_empty());
            if !has_text {
                return Err(CacheError::InvalidRecord(format!(
                    "request {}: completed recommendation has no text",
                    self.request_id
                )));
            }
        }

        Ok(())
    }
}
