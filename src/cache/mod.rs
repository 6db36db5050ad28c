//! Response cache for upstream API payloads.
//!
//! [`ResponseCache`] stores parsed JSON keyed on [`CacheKey`] with a
//! per-entry lifetime chosen by [`ttl::ttl_for_endpoint()`]. Freshness is
//! judged against `tokio::time::Instant`, so tests running on a paused
//! clock control expiry exactly. Stale entries are removed lazily, on the
//! next lookup of the same key.
//!
//! Storage is a bounded moka cache. Its own time-to-live is set to
//! [`ttl::MAX_TTL`] so entries nobody reads again are eventually reclaimed.

pub mod ttl;

pub use ttl::{DEFAULT_TTL, MAX_TTL, ttl_for_endpoint};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use crate::telemetry;

/// Default maximum number of cached responses.
pub const DEFAULT_MAX_ENTRIES: u64 = 1_000;

/// Identity of a request for caching and loop detection.
///
/// Built from method, endpoint (path plus query) and body text. Bodies are
/// compared verbatim: two bodies that differ only in whitespace or field
/// order produce different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Arc<str>);

impl CacheKey {
    /// Build the key for a call; the method is upper-cased.
    pub fn new(method: &str, endpoint: &str, body: Option<&str>) -> Self {
        let key = format!(
            "{}:{}:{}",
            method.to_ascii_uppercase(),
            endpoint,
            body.unwrap_or("")
        );
        Self(key.into())
    }

    /// The key as `METHOD:endpoint:body`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A cached payload and its lifetime.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: Value,
    pub stored_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    /// Valid iff `now < stored_at + ttl`.
    pub fn is_fresh_at(&self, now: Instant) -> bool {
        now < self.stored_at + self.ttl
    }
}

/// In-memory cache of upstream responses.
pub struct ResponseCache {
    entries: moka::sync::Cache<CacheKey, CacheEntry>,
}

impl ResponseCache {
    /// Create a cache holding at most [`DEFAULT_MAX_ENTRIES`] responses.
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }

    /// Create a cache holding at most `max` responses.
    pub fn with_max_entries(max: u64) -> Self {
        let entries = moka::sync::Cache::builder()
            .max_capacity(max)
            .time_to_live(MAX_TTL)
            .build();
        Self { entries }
    }

    /// Look up a fresh payload. An expired entry is removed and reported as
    /// a miss.
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        let Some(entry) = self.entries.get(key) else {
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
            return None;
        };

        if entry.is_fresh_at(Instant::now()) {
            metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
            debug!(key = %key, "cache hit");
            Some(entry.data)
        } else {
            debug!(key = %key, "cache entry expired");
            self.entries.invalidate(key);
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
            None
        }
    }

    /// Store (or replace) a payload, stamped with the current time.
    pub fn insert(&self, key: CacheKey, data: Value, ttl: Duration) {
        debug!(key = %key, ttl_ms = ttl.as_millis() as u64, "caching response");
        self.entries.insert(
            key,
            CacheEntry {
                data,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Number of entries currently held (including not-yet-purged stale ones).
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict all entries.
    pub fn clear(&self) {
        self.entries.invalidate_all();
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}
