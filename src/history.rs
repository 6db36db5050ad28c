//! Recent-call history and loop detection.
//!
//! Agents driving the API sometimes get stuck re-issuing the same request.
//! Every call is recorded in a bounded [`CallHistory`]; [`detect_loop()`]
//! inspects it without any I/O and reports:
//!
//! - a **loop** when the same [`CacheKey`] appears [`LOOP_THRESHOLD`] or
//!   more times within [`LOOP_WINDOW`]. Loops fail the call.
//! - an **overuse** warning when one endpoint path appears
//!   [`OVERUSE_THRESHOLD`] or more times anywhere in the retained history.
//!   Overuse is advisory only.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use crate::cache::CacheKey;

/// Number of records retained; older records are dropped first.
pub const HISTORY_CAPACITY: usize = 20;

/// Window in which repeated identical calls count as a loop.
pub const LOOP_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Identical calls within [`LOOP_WINDOW`] that constitute a loop.
pub const LOOP_THRESHOLD: usize = 2;

/// Calls to one endpoint path that trigger an overuse warning.
pub const OVERUSE_THRESHOLD: usize = 5;

/// One invocation of the access layer.
#[derive(Debug, Clone)]
pub struct CallRecord {
    /// Endpoint path without query string.
    pub endpoint: String,
    pub cache_key: CacheKey,
    pub timestamp: Instant,
}

impl CallRecord {
    /// Record a call to `endpoint` (query string is stripped) made now.
    pub fn new(endpoint: &str, cache_key: CacheKey) -> Self {
        Self::at(endpoint, cache_key, Instant::now())
    }

    pub fn at(endpoint: &str, cache_key: CacheKey, timestamp: Instant) -> Self {
        Self {
            endpoint: endpoint_path(endpoint).to_string(),
            cache_key,
            timestamp,
        }
    }
}

fn endpoint_path(endpoint: &str) -> &str {
    endpoint.split_once('?').map_or(endpoint, |(path, _)| path)
}

/// Outcome of a loop check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopCheck {
    /// Whether the call must be rejected.
    pub is_loop: bool,
    /// Human-readable loop and overuse warnings, loop warnings first.
    pub warnings: Vec<String>,
}

impl LoopCheck {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Bounded FIFO of recent calls.
#[derive(Debug, Clone)]
pub struct CallHistory {
    records: VecDeque<CallRecord>,
    capacity: usize,
}

impl CallHistory {
    /// Create a history holding the last [`HISTORY_CAPACITY`] calls.
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    /// Create a history holding the last `capacity` calls.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a record, evicting the oldest when full.
    pub fn push(&mut self, record: CallRecord) {
        if self.capacity == 0 {
            return;
        }
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Records from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &CallRecord> {
        self.records.iter()
    }

    /// Run [`detect_loop()`] over the retained records.
    pub fn detect_loop(&self, now: Instant) -> LoopCheck {
        detect_loop(self.records.iter(), now)
    }
}

impl Default for CallHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// Tally items in first-seen order. History is small, so a linear scan is
/// enough and keeps warning order stable.
fn tally<'a, T>(items: impl Iterator<Item = &'a T>) -> Vec<(&'a T, usize)>
where
    T: PartialEq + ?Sized + 'a,
{
    let mut counts: Vec<(&T, usize)> = Vec::new();
    for item in items {
        match counts.iter_mut().find(|entry| entry.0 == item) {
            Some(entry) => entry.1 += 1,
            None => counts.push((item, 1)),
        }
    }
    counts
}

/// Inspect `records` for loops and overuse as of `now`.
pub fn detect_loop<'a>(
    records: impl IntoIterator<Item = &'a CallRecord>,
    now: Instant,
) -> LoopCheck {
    let records: Vec<&CallRecord> = records.into_iter().collect();
    let mut check = LoopCheck::default();

    let recent = records
        .iter()
        .filter(|r| now.saturating_duration_since(r.timestamp) < LOOP_WINDOW)
        .map(|r| &r.cache_key);
    for (key, count) in tally(recent) {
        if count >= LOOP_THRESHOLD {
            check.is_loop = true;
            check.warnings.push(format!(
                "LOOP DETECTED: `{key}` was requested {count} times in the last {} minutes. \
                 Use the data already retrieved instead of repeating the same call.",
                LOOP_WINDOW.as_secs() / 60
            ));
        }
    }

    for (endpoint, count) in tally(records.iter().map(|r| r.endpoint.as_str())) {
        if count >= OVERUSE_THRESHOLD {
            check.warnings.push(format!(
                "Endpoint `{endpoint}` has been called {count} times recently. \
                 Consider whether further calls are needed."
            ));
        }
    }

    check
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(endpoint: &str, at: Instant) -> CallRecord {
        CallRecord::at(endpoint, CacheKey::new("GET", endpoint, None), at)
    }

    #[test]
    fn query_is_stripped_from_endpoint() {
        let r = record("/game/room-objects?room=W1N1", Instant::now());
        assert_eq!(r.endpoint, "/game/room-objects");
        assert!(r.cache_key.as_str().contains("room=W1N1"));
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let now = Instant::now();
        let mut history = CallHistory::with_capacity(3);
        for i in 0..5 {
            history.push(record(&format!("/e{i}"), now));
        }
        assert_eq!(history.len(), 3);
        let endpoints: Vec<_> = history.iter().map(|r| r.endpoint.as_str()).collect();
        assert_eq!(endpoints, ["/e2", "/e3", "/e4"]);
    }

    #[test]
    fn zero_capacity_retains_nothing() {
        let mut history = CallHistory::with_capacity(0);
        history.push(record("/e", Instant::now()));
        assert!(history.is_empty());
    }

    #[test]
    fn distinct_calls_are_not_a_loop() {
        let now = Instant::now();
        let records = [record("/user/rooms", now), record("/game/time", now)];
        let check = detect_loop(&records, now);
        assert!(!check.is_loop);
        assert!(!check.has_warnings());
    }

    #[test]
    fn repeated_key_in_window_is_a_loop() {
        let now = Instant::now();
        let records = [record("/user/rooms", now), record("/user/rooms", now)];
        let check = detect_loop(&records, now);
        assert!(check.is_loop);
        assert_eq!(check.warnings.len(), 1);
        assert!(check.warnings[0].contains("GET:/user/rooms:"));
    }

    #[test]
    fn repeats_outside_window_are_ignored() {
        let start = Instant::now();
        let later = start + LOOP_WINDOW;
        let records = [record("/user/rooms", start), record("/user/rooms", later)];
        assert!(!detect_loop(&records, later).is_loop);
    }

    #[test]
    fn overuse_is_advisory_and_window_free() {
        let start = Instant::now();
        let now = start + Duration::from_secs(3600);
        let records: Vec<_> = (0..5)
            .map(|i| {
                record(
                    &format!("/game/room-objects?room=W{i}N1"),
                    start + Duration::from_secs(i),
                )
            })
            .collect();
        let check = detect_loop(&records, now);
        assert!(!check.is_loop);
        assert_eq!(check.warnings.len(), 1);
        assert!(check.warnings[0].contains("/game/room-objects"));
        assert!(check.warnings[0].contains("5 times"));
    }
}
