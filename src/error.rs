//! Error types for the recommendation cache
//!
//! Provides unified error handling using thiserror. A cache miss is not an
//! error and never appears here.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the recommendation cache.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    /// Scope key is neither `all` nor `user-<id>`
    #[error("Invalid scope key: {0:?}")]
    InvalidScopeKey(String),

    /// Negative TTL supplied at the API boundary
    #[error("Invalid TTL: {0} ms (must be >= 0)")]
    InvalidTtl(i64),

    /// Record failed validation (score range, completed without text, duplicates)
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Malformed request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Requested item is not cached
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidScopeKey(_)
            | CacheError::InvalidTtl(_)
            | CacheError::InvalidRecord(_)
            | CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the recommendation cache.
pub type Result<T> = std::result::Result<T, CacheError>;
