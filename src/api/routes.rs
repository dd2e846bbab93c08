//! API Routes
//!
//! Configures the Axum router with all cache service endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, get_record_handler, get_scope_handler, health_handler,
    invalidate_scope_handler, list_processing_handler, mark_completed_handler,
    mark_failed_handler, mark_processing_handler, processing_status_handler,
    put_scope_handler, remove_record_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET|PUT|DELETE /scopes/:scope` - Read, populate or invalidate a scope
/// - `GET|DELETE /records/:id` - Read or drop one recommendation
/// - `GET /processing` - Request IDs with enrichment in flight
/// - `GET|PUT /processing/:id` - Read status / mark processing
/// - `POST /processing/:id/complete`, `POST /processing/:id/fail`
/// - `DELETE /cache` - Drop all state
/// - `GET /stats`, `GET /health`
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/scopes/:scope",
            get(get_scope_handler)
                .put(put_scope_handler)
                .delete(invalidate_scope_handler),
        )
        .route(
            "/records/:id",
            get(get_record_handler).delete(remove_record_handler),
        )
        .route("/processing", get(list_processing_handler))
        .route(
            "/processing/:id",
            get(processing_status_handler).put(mark_processing_handler),
        )
        .route("/processing/:id/complete", post(mark_completed_handler))
        .route("/processing/:id/fail", post(mark_failed_handler))
        .route("/cache", delete(clear_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
