//! API Module
//!
//! HTTP handlers and routing exposing the recommendation cache as a service.
//!
//! # Endpoints
//! - `/scopes/:scope` - Scoped reads, populates and invalidation
//! - `/records/:id` - Single recommendation lookup and removal
//! - `/processing` - Enrichment job tracking
//! - `/cache`, `/stats`, `/health` - Maintenance and diagnostics

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
