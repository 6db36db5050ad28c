//! Telemetry metric name constants.
//!
//! Consumers install their own `metrics` recorder (e.g. prometheus,
//! statsd); without a recorder installed, all metric calls are no-ops.
//!
//! All metrics are prefixed with `screeps_gateway_`. Counters end in
//! `_total`, histograms use meaningful units (e.g. `_seconds`).

/// Network requests completed (after retries), cache hits excluded.
///
/// Labels: `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "screeps_gateway_requests_total";

/// Wall time spent in the retrying send, including backoff.
pub const REQUEST_DURATION_SECONDS: &str = "screeps_gateway_request_duration_seconds";

/// Retry attempts (not counting the initial request).
pub const RETRIES_TOTAL: &str = "screeps_gateway_retries_total";

pub const CACHE_HITS_TOTAL: &str = "screeps_gateway_cache_hits_total";

pub const CACHE_MISSES_TOTAL: &str = "screeps_gateway_cache_misses_total";

/// Calls rejected by loop detection.
pub const LOOPS_DETECTED_TOTAL: &str = "screeps_gateway_loops_detected_total";
