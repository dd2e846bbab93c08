//! Background Tasks Module
//!
//! Contains background tasks that run periodically while a cache is alive.
//!
//! # Tasks
//! - Sweep: reclaims stale scopes and unreferenced records at a fixed interval

mod sweep;

pub use sweep::spawn_sweep_task;
