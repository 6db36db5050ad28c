//! Upstream rate-limit bookkeeping.
//!
//! The API reports quota state on every response through three headers.
//! A [`RateLimitSnapshot`] is only built when all three are present and
//! numeric; partial or malformed headers leave the previous snapshot alone.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::transport::HttpResponse;

pub const LIMIT_HEADER: &str = "X-RateLimit-Limit";
pub const REMAINING_HEADER: &str = "X-RateLimit-Remaining";
pub const RESET_HEADER: &str = "X-RateLimit-Reset";
pub const RETRY_AFTER_HEADER: &str = "Retry-After";

/// Most recently observed quota state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitSnapshot {
    pub remaining: u64,
    pub limit: u64,
    /// Unix epoch seconds at which the quota resets.
    pub reset_at: u64,
}

impl RateLimitSnapshot {
    /// Extract a snapshot from response headers.
    pub fn from_response(response: &HttpResponse) -> Option<Self> {
        let parse = |name: &str| response.header(name)?.trim().parse::<u64>().ok();
        Some(Self {
            limit: parse(LIMIT_HEADER)?,
            remaining: parse(REMAINING_HEADER)?,
            reset_at: parse(RESET_HEADER)?,
        })
    }

    /// Reset instant as wall-clock time.
    pub fn reset_time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(self.reset_at)
    }

    /// Time left until reset, zero if already past.
    pub fn resets_in(&self) -> Duration {
        self.reset_time()
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO)
    }

    /// No requests left before the reset.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

/// Parse a `Retry-After` header given in delta-seconds.
///
/// HTTP-date values are not used by the upstream and yield `None`.
pub fn retry_after(response: &HttpResponse) -> Option<Duration> {
    response
        .header(RETRY_AFTER_HEADER)?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
