//! Configuration Module
//!
//! Handles loading and validating cache configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Cache and server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// TTL applied by scope lookups that don't pass their own
    pub default_ttl: Duration,
    /// Soft upper bound on cached records
    pub max_entries: usize,
    /// Interval between background sweeps
    pub sweep_interval: Duration,
    /// Share of scopes dropped per capacity eviction round
    pub eviction_fraction: f64,
    /// Jobs stuck in `processing` longer than this are failed by the sweep
    pub processing_timeout: Option<Duration>,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `DEFAULT_TTL_MS` - Scope freshness window (default: 300000)
    /// - `MAX_ENTRIES` - Maximum cached records (default: 1000)
    /// - `SWEEP_INTERVAL_MS` - Background sweep frequency (default: 60000)
    /// - `EVICTION_FRACTION` - Scopes dropped per eviction round (default: 0.10)
    /// - `PROCESSING_TIMEOUT_MS` - Dead-man's switch for jobs (default: unset)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_ttl: env_parse::<u64>("DEFAULT_TTL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.default_ttl),
            max_entries: env_parse("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            sweep_interval: env_parse::<u64>("SWEEP_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.sweep_interval),
            eviction_fraction: env_parse("EVICTION_FRACTION")
                .unwrap_or(defaults.eviction_fraction),
            processing_timeout: env_parse::<u64>("PROCESSING_TIMEOUT_MS")
                .map(Duration::from_millis)
                .or(defaults.processing_timeout),
            server_port: env_parse("SERVER_PORT").unwrap_or(defaults.server_port),
        }
    }

    /// Checks that the configured values describe a usable cache.
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(CacheError::InvalidRequest(
                "max_entries must be greater than zero".to_string(),
            ));
        }
        if self.sweep_interval.is_zero() {
            return Err(CacheError::InvalidRequest(
                "sweep_interval must be greater than zero".to_string(),
            ));
        }
        if !(self.eviction_fraction > 0.0 && self.eviction_fraction <= 1.0) {
            return Err(CacheError::InvalidRequest(format!(
                "eviction_fraction must be within (0, 1], got {}",
                self.eviction_fraction
            )));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_millis(300_000),
            max_entries: 1000,
            sweep_interval: Duration::from_millis(60_000),
            eviction_fraction: 0.10,
            processing_timeout: None,
            server_port: 3000,
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
