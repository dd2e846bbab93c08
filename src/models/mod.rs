//! Request and Response models for the cache service API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{FailRequest, PutScopeRequest, ScopeQuery};
pub use responses::{
    ClearResponse, HealthResponse, ProcessingListResponse, ProcessingResponse,
    PutScopeResponse, RemoveResponse, ScopeResponse, StatsResponse,
};
