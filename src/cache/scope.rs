//! Scope Index Module
//!
//! Named, ordered views over cached records ("all" or one user's list),
//! each with its own refresh timestamp. Freshness is tracked per scope,
//! never per record.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CacheError;

const USER_PREFIX: &str = "user-";

// == Scope Key ==
/// Identifies a scope: the global listing or one user's listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScopeKey {
    All,
    User(u64),
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKey::All => f.write_str("all"),
            ScopeKey::User(id) => write!(f, "{}{}", USER_PREFIX, id),
        }
    }
}

impl FromStr for ScopeKey {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(ScopeKey::All);
        }
        let invalid = || CacheError::InvalidScopeKey(s.to_string());
        let digits = s.strip_prefix(USER_PREFIX).ok_or_else(invalid)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        digits.parse().map(ScopeKey::User).map_err(|_| invalid())
    }
}

impl Serialize for ScopeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ScopeKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// == Freshness ==
/// True when `now - refreshed_at < ttl`. A zero TTL is never fresh.
pub fn is_fresh_at(refreshed_at: u64, ttl: Duration, now: u64) -> bool {
    let age = u128::from(now.saturating_sub(refreshed_at));
    age < ttl.as_millis()
}

// == Scope Entry ==
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeEntry {
    /// Request IDs in producer rank order, no duplicates
    pub request_ids: Vec<u64>,
    /// When the scope was last populated (Unix milliseconds)
    pub last_refreshed_at: u64,
    /// Registration order, used to break timestamp ties
    seq: u64,
}

// == Scope Index ==
#[derive(Debug, Default)]
pub struct ScopeIndex {
    scopes: HashMap<ScopeKey, ScopeEntry>,
    next_seq: u64,
}

impl ScopeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    // == Get If Fresh ==
    /// Returns the scope's ID list only while it is fresh.
    pub fn get_if_fresh(&self, key: &ScopeKey, ttl: Duration, now: u64) -> Option<Vec<u64>> {
        self.scopes
            .get(key)
            .filter(|entry| is_fresh_at(entry.last_refreshed_at, ttl, now))
            .map(|entry| entry.request_ids.clone())
    }

    pub fn is_fresh(&self, key: &ScopeKey, ttl: Duration, now: u64) -> bool {
        self.get_if_fresh(key, ttl, now).is_some()
    }

    pub fn get(&self, key: &ScopeKey) -> Option<&ScopeEntry> {
        self.scopes.get(key)
    }

    // == Set ==
    /// Replaces the scope's ID list and stamps it fresh as of `now`.
    ///
    /// A scope that is already registered keeps its registration order.
    pub fn set(&mut self, key: ScopeKey, request_ids: Vec<u64>, now: u64) {
        match self.scopes.get_mut(&key) {
            Some(entry) => {
                entry.request_ids = request_ids;
                entry.last_refreshed_at = now;
            }
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.scopes.insert(
                    key,
                    ScopeEntry {
                        request_ids,
                        last_refreshed_at: now,
                        seq,
                    },
                );
            }
        }
    }

    // == Invalidate ==
    /// Removes the scope entry only; its records stay in the store.
    pub fn invalidate(&mut self, key: &ScopeKey) -> bool {
        self.scopes.remove(key).is_some()
    }

    // == References ==
    pub fn scope_keys_referencing(&self, request_id: u64) -> HashSet<ScopeKey> {
        self.scopes
            .iter()
            .filter(|(_, entry)| entry.request_ids.contains(&request_id))
            .map(|(key, _)| *key)
            .collect()
    }

    /// Every request ID referenced by at least one scope.
    pub fn referenced_ids(&self) -> HashSet<u64> {
        self.scopes
            .values()
            .flat_map(|entry| entry.request_ids.iter().copied())
            .collect()
    }

    /// Like `referenced_ids`, ignoring one scope's current list.
    pub fn referenced_ids_except(&self, skip: &ScopeKey) -> HashSet<u64> {
        self.scopes
            .iter()
            .filter(|(key, _)| *key != skip)
            .flat_map(|(_, entry)| entry.request_ids.iter().copied())
            .collect()
    }

    // == Ordering ==
    /// Scopes whose TTL has elapsed as of `now`.
    pub fn stale_keys(&self, ttl: Duration, now: u64) -> Vec<ScopeKey> {
        self.scopes
            .iter()
            .filter(|(_, entry)| !is_fresh_at(entry.last_refreshed_at, ttl, now))
            .map(|(key, _)| *key)
            .collect()
    }

    /// Scope keys from oldest refresh to newest; ties go to the first registered.
    pub fn keys_oldest_first(&self) -> Vec<ScopeKey> {
        let mut keyed: Vec<(u64, u64, ScopeKey)> = self
            .scopes
            .iter()
            .map(|(key, entry)| (entry.last_refreshed_at, entry.seq, *key))
            .collect();
        keyed.sort_unstable();
        keyed.into_iter().map(|(_, _, key)| key).collect()
    }

    pub fn oldest_refreshed_at(&self) -> Option<u64> {
        self.scopes.values().map(|e| e.last_refreshed_at).min()
    }

    pub fn newest_refreshed_at(&self) -> Option<u64> {
        self.scopes.values().map(|e| e.last_refreshed_at).max()
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn clear(&mut self) {
        self.scopes.clear();
    }
}
