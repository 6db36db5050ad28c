//! Gateway error types

use std::time::Duration;

/// Gateway error types
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    // Access layer policy errors
    /// The same request was repeated within the loop-detection window.
    /// Never retried by the access layer.
    #[error("loop detected: {warning}")]
    LoopDetected { warning: String },

    // Upstream/network errors
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("HTTP error ({status}): {status_text}")]
    Http { status: u16, status_text: String },

    #[error("network error: {0}")]
    Network(String),

    /// Parameter validation failure raised by tool handlers above the
    /// access layer. Carried through unchanged.
    #[error("invalid value for '{field}': {value}")]
    Validation { field: String, value: String },

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("sign-in failed: {0}")]
    SignIn(String),
}

impl GatewayError {
    /// Whether a caller may reasonably retry the failed operation later.
    ///
    /// Loop detection, authentication and validation failures are permanent:
    /// repeating the same request will fail the same way.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::RateLimited { .. } | GatewayError::Network(_) => true,
            GatewayError::Http { status, .. } => *status == 408 || *status >= 500,
            _ => false,
        }
    }

    /// The `Retry-After` hint carried by a [`GatewayError::RateLimited`] error.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GatewayError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// HTTP status associated with this error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::RateLimited { .. } => Some(429),
            GatewayError::AuthenticationFailed => Some(401),
            GatewayError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            GatewayError::RateLimited { retry_after: None }.status(),
            Some(429)
        );
        assert_eq!(GatewayError::AuthenticationFailed.status(), Some(401));
        assert_eq!(GatewayError::Network("reset".into()).status(), None);
    }
}
