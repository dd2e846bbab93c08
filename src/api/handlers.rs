//! API Handlers
//!
//! HTTP request handlers mapping each endpoint onto the in-process cache API.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::cache::{parse_ttl_ms, RecommendationCache, RecommendationRecord, ScopeKey};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, FailRequest, HealthResponse, ProcessingListResponse, ProcessingResponse,
    PutScopeRequest, PutScopeResponse, RemoveResponse, ScopeQuery, ScopeResponse, StatsResponse,
};

/// Application state shared across all handlers.
///
/// The cache handle is itself cheap to clone and internally synchronized.
#[derive(Clone)]
pub struct AppState {
    pub cache: RecommendationCache,
}

impl AppState {
    pub fn new(cache: RecommendationCache) -> Self {
        Self { cache }
    }

    /// Creates a new AppState from configuration, using the system clock.
    pub fn from_config(config: &Config) -> Result<Self> {
        RecommendationCache::with_system_clock(config.clone()).map(Self::new)
    }
}

/// Handler for GET /scopes/:scope
pub async fn get_scope_handler(
    State(state): State<AppState>,
    Path(scope): Path<String>,
    Query(query): Query<ScopeQuery>,
) -> Result<Json<ScopeResponse>> {
    let scope: ScopeKey = scope.parse()?;
    let lookup = match query.ttl_ms {
        Some(ttl_ms) => state.cache.get_scope(&scope, parse_ttl_ms(ttl_ms)?),
        None => state.cache.get_scope_default(&scope),
    };

    Ok(Json(ScopeResponse::new(scope, lookup)))
}

/// Handler for PUT /scopes/:scope
pub async fn put_scope_handler(
    State(state): State<AppState>,
    Path(scope): Path<String>,
    Json(req): Json<PutScopeRequest>,
) -> Result<Json<PutScopeResponse>> {
    let scope: ScopeKey = scope.parse()?;
    let count = req.records.len();
    state.cache.put_scope(scope, req.records)?;

    Ok(Json(PutScopeResponse::new(scope, count)))
}

/// Handler for DELETE /scopes/:scope
pub async fn invalidate_scope_handler(
    State(state): State<AppState>,
    Path(scope): Path<String>,
) -> Result<Json<RemoveResponse>> {
    let scope: ScopeKey = scope.parse()?;
    let removed = state.cache.invalidate_scope(&scope);

    Ok(Json(RemoveResponse::new(scope, removed)))
}

/// Handler for GET /records/:id
pub async fn get_record_handler(
    State(state): State<AppState>,
    Path(request_id): Path<u64>,
) -> Result<Json<RecommendationRecord>> {
    state
        .cache
        .get_record(request_id)
        .map(Json)
        .ok_or_else(|| CacheError::NotFound(format!("recommendation for request {}", request_id)))
}

/// Handler for DELETE /records/:id
///
/// Idempotent: removing an uncached record still succeeds.
pub async fn remove_record_handler(
    State(state): State<AppState>,
    Path(request_id): Path<u64>,
) -> Json<RemoveResponse> {
    let removed = state.cache.remove_record(request_id);
    Json(RemoveResponse::new(request_id, removed))
}

/// Handler for GET /processing
pub async fn list_processing_handler(State(state): State<AppState>) -> Json<ProcessingListResponse> {
    Json(ProcessingListResponse {
        processing: state.cache.all_processing(),
    })
}

/// Handler for GET /processing/:id
pub async fn processing_status_handler(
    State(state): State<AppState>,
    Path(request_id): Path<u64>,
) -> Json<ProcessingResponse> {
    Json(ProcessingResponse::new(
        request_id,
        state.cache.processing_status(request_id),
    ))
}

/// Handler for PUT /processing/:id
pub async fn mark_processing_handler(
    State(state): State<AppState>,
    Path(request_id): Path<u64>,
) -> Json<ProcessingResponse> {
    state.cache.mark_processing(request_id);
    processing_status_handler(State(state), Path(request_id)).await
}

/// Handler for POST /processing/:id/complete
pub async fn mark_completed_handler(
    State(state): State<AppState>,
    Path(request_id): Path<u64>,
) -> Json<ProcessingResponse> {
    state.cache.mark_completed(request_id);
    processing_status_handler(State(state), Path(request_id)).await
}

/// Handler for POST /processing/:id/fail
pub async fn mark_failed_handler(
    State(state): State<AppState>,
    Path(request_id): Path<u64>,
    Json(req): Json<FailRequest>,
) -> Result<Json<ProcessingResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    state.cache.mark_failed(request_id, req.error);
    Ok(processing_status_handler(State(state), Path(request_id)).await)
}

/// Handler for DELETE /cache
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    state.cache.clear();
    Json(ClearResponse::cleared())
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::new(state.cache.stats()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
