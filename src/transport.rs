//! Outbound HTTP transport.
//!
//! [`Transport`] is the request/response primitive the access layer is
//! written against. [`ReqwestTransport`] is the production implementation;
//! tests substitute scripted transports to drive status sequences and
//! connection failures without a network.
//!
//! Network-level failures are returned as [`GatewayError::Network`]. Non-2xx
//! statuses are *not* errors at this level; they come back as an
//! [`HttpResponse`] so the retry engine can classify them.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

use crate::{GatewayError, Result};

/// A fully resolved outbound request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Absolute URL, including any query string.
    pub url: String,
    pub method: Method,
    /// Header name/value pairs, sent in order.
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// A received response with its body already buffered.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    /// Keyed on lower-cased header name.
    headers: HashMap<String, String>,
    body: String,
}

impl HttpResponse {
    /// Create an empty-bodied response with the canonical reason phrase.
    pub fn new(status: u16) -> Self {
        let status_text = StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("")
            .to_string();
        Self {
            status,
            status_text,
            headers: HashMap::new(),
            body: String::new(),
        }
    }

    /// Add a header (names are case-insensitive).
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Set a raw body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a JSON body.
    pub fn with_json(self, value: &Value) -> Self {
        self.with_body(value.to_string())
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON.
    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// The raw body text.
    pub fn text(&self) -> &str {
        &self.body
    }
}

/// Request/response primitive consumed by the access layer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request. Returns `Err` only for transport-level failures.
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// [`Transport`] backed by a shared `reqwest` client.
///
/// No per-request timeout is applied; the retry policy bounds total effort.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client (proxies, TLS roots, timeouts).
    pub fn with_client(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut builder = self.http.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = response.status();
        let mut out = HttpResponse::new(status.as_u16());
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                out = out.with_header(name.as_str(), value);
            }
        }
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        Ok(out.with_body(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let response = HttpResponse::new(200).with_header("X-RateLimit-Limit", "100");
        assert_eq!(response.header("x-ratelimit-limit"), Some("100"));
        assert_eq!(response.header("X-RATELIMIT-LIMIT"), Some("100"));
        assert_eq!(response.header("x-ratelimit-reset"), None);
    }

    #[test]
    fn canonical_status_text() {
        assert_eq!(HttpResponse::new(404).status_text, "Not Found");
        assert!(HttpResponse::new(204).is_success());
        assert!(!HttpResponse::new(429).is_success());
    }

    #[test]
    fn invalid_json_body_is_json_error() {
        let response = HttpResponse::new(200).with_body("<html>");
        assert!(matches!(response.json(), Err(GatewayError::Json(_))));
    }
}
