//! Call results and the metadata attached to them.

use std::time::{Duration, SystemTime};

use serde::Serialize;
use serde_json::Value;

use crate::rate_limit::RateLimitSnapshot;

/// Metadata about how a call was served.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CallMeta {
    /// Served from cache without a network request.
    pub from_cache: bool,
    /// Quota state after this call. Always `None` for cache hits.
    pub rate_limit: Option<RateLimitSnapshot>,
    /// Advisory loop/overuse warnings raised while handling the call.
    pub warnings: Vec<String>,
}

impl CallMeta {
    /// Plain-text lines suitable for appending to a formatted reply.
    pub fn notes(&self) -> Vec<String> {
        self.notes_at(SystemTime::now())
    }

    fn notes_at(&self, now: SystemTime) -> Vec<String> {
        let mut notes = Vec::new();
        if self.from_cache {
            notes.push("Served from cache".to_string());
        }
        if let Some(rl) = &self.rate_limit {
            let resets_in = rl
                .reset_time()
                .duration_since(now)
                .unwrap_or(Duration::ZERO)
                .as_secs();
            notes.push(format!(
                "Rate limit: {}/{} remaining, resets in {resets_in}s",
                rl.remaining, rl.limit
            ));
        }
        notes.extend(self.warnings.iter().cloned());
        notes
    }
}

/// A successful call: the parsed payload plus [`CallMeta`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub data: Value,
    pub meta: CallMeta,
}

impl ApiResponse {
    pub fn is_cached(&self) -> bool {
        self.meta.from_cache
    }

    /// Discard metadata and keep the payload.
    pub fn into_data(self) -> Value {
        self.data
    }
}
