//! Retry policy, backoff calculation, and the retrying send loop.
//!
//! [`RetryPolicy`] controls how many times a request is re-sent and how
//! long to wait in between. [`send_with_retry()`] is the single place that
//! applies it. Waiting goes through the [`Delay`] trait so tests can record
//! or skip backoff instead of sleeping on the wall clock.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::Result;
use crate::telemetry;
use crate::transport::{HttpRequest, HttpResponse, Transport};

/// Configuration for retry behaviour on transient failures.
///
/// Uses capped exponential backoff:
///
/// ```rust
/// # use screeps_gateway::RetryPolicy;
/// # use std::time::Duration;
/// let policy = RetryPolicy::new()
///     .max_retries(5)
///     .initial_delay(Duration::from_millis(200))
///     .max_delay(Duration::from_secs(5));
/// assert_eq!(policy.delay_for_retry(0), Duration::from_millis(200));
/// assert_eq!(policy.delay_for_retry(10), Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the initial request. 0 = single attempt. Default: 3.
    pub max_retries: u32,
    /// Delay before the first retry. Default: 1s.
    #[serde(rename = "initial_delay_ms", with = "duration_ms")]
    pub initial_delay: Duration,
    /// Upper bound on any single delay. Default: 10s.
    #[serde(rename = "max_delay_ms", with = "duration_ms")]
    pub max_delay: Duration,
    /// Response statuses that trigger a retry.
    /// Default: 408, 429, 500, 502, 503, 504.
    pub retryable_status_codes: BTreeSet<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            retryable_status_codes: [408, 429, 500, 502, 503, 504].into_iter().collect(),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Set retries after the initial request (0 disables retrying).
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Set the wait before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the upper bound on any single backoff wait.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Replace the set of retryable statuses.
    pub fn retryable_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_status_codes = codes.into_iter().collect();
        self
    }

    /// Total attempts, including the initial request.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Whether a response with this status should be retried.
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }

    /// Delay before retry number `retry` (0-indexed), i.e. before attempt
    /// `retry + 2`.
    ///
    /// `initial_delay * 2^retry`, capped at `max_delay`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(retry));
        delay.min(self.max_delay)
    }
}

/// Serde adapter for durations written as integer milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

// ============================================================================
// Delay
// ============================================================================

/// Cooperative wait used between attempts.
#[async_trait]
pub trait Delay: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// [`Delay`] backed by `tokio::time::sleep`.
///
/// Honours tokio's paused test clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Shared handle used by the client.
pub(crate) fn default_delay() -> Arc<dyn Delay> {
    Arc::new(TokioDelay)
}

// ============================================================================
// Retrying send
// ============================================================================

/// Send `request`, re-sending on retryable statuses and network errors.
///
/// Makes at most `policy.total_attempts()` attempts. A retryable status on
/// the final attempt is returned as a normal response for the caller to
/// classify; a network error on the final attempt is returned as `Err`.
/// Non-retryable statuses (including successes) return immediately.
pub async fn send_with_retry(
    transport: &dyn Transport,
    delay: &dyn Delay,
    policy: &RetryPolicy,
    request: &HttpRequest,
) -> Result<HttpResponse> {
    let attempts = policy.total_attempts();
    let mut attempt = 0;
    loop {
        attempt += 1;
        let is_last = attempt >= attempts;

        let reason = match transport.send(request).await {
            Ok(response) if is_last || !policy.is_retryable_status(response.status) => {
                return Ok(response);
            }
            Ok(response) => format!("status {}", response.status),
            Err(e) if is_last => return Err(e),
            Err(e) => e.to_string(),
        };

        metrics::counter!(telemetry::RETRIES_TOTAL).increment(1);
        let wait = policy.delay_for_retry(attempt - 1);
        warn!(
            url = %request.url,
            attempt,
            max_attempts = attempts,
            delay_ms = wait.as_millis() as u64,
            reason = %reason,
            "retrying request"
        );
        delay.sleep(wait).await;
    }
}
