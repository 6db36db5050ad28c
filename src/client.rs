//! The API access layer.
//!
//! [`ApiClient`] is the single choke point for outbound calls. Each
//! [`call()`](ApiClient::call) runs these steps in order:
//!
//! 1. derive the [`CacheKey`] from method, endpoint and body
//! 2. record the call in the history (cache hits count too)
//! 3. reject with [`GatewayError::LoopDetected`] if the history shows a loop,
//!    even when a fresh cache entry exists
//! 4. serve a fresh cache entry, clearing the rate-limit snapshot
//! 5. otherwise send through the retry engine and classify the final status
//! 6. cache the parsed payload with an endpoint-specific TTL
//!
//! Concurrent calls for the same uncached key are not coalesced; each one
//! reaches the network.
//!
//! # Example
//!
//! ```rust,no_run
//! use screeps_gateway::{ApiClient, CallOptions, GatewayConfig};
//!
//! # async fn run() -> screeps_gateway::Result<()> {
//! let client = ApiClient::new(GatewayConfig::default().token("my-token"));
//! let reply = client.call("/game/time?shard=shard0", &CallOptions::get()).await?;
//! println!("tick {}", reply.data["time"]);
//! for note in reply.meta.notes() {
//!     println!("{note}");
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use reqwest::Method;
use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheKey, ResponseCache, ttl_for_endpoint};
use crate::config::{GatewayConfig, TOKEN_HEADER};
use crate::history::{CallHistory, CallRecord, LoopCheck};
use crate::rate_limit::{self, RateLimitSnapshot};
use crate::response::{ApiResponse, CallMeta};
use crate::retry::{Delay, default_delay, send_with_retry};
use crate::telemetry;
use crate::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
use crate::{GatewayError, Result};

/// Endpoint used by [`ApiClient::sign_in()`].
pub const SIGN_IN_ENDPOINT: &str = "/auth/signin";

/// Per-call request options.
#[derive(Debug, Clone)]
pub struct CallOptions {
    pub method: Method,
    /// Serialized request body. Compared verbatim when keying the cache.
    pub body: Option<String>,
    /// Extra headers, sent after the authentication headers.
    pub headers: Vec<(String, String)>,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            body: None,
            headers: Vec::new(),
        }
    }
}

impl CallOptions {
    /// A plain GET.
    pub fn get() -> Self {
        Self::default()
    }

    /// A POST with a pre-serialized body.
    pub fn post(body: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            body: Some(body.into()),
            headers: Vec::new(),
        }
    }

    /// A POST with a JSON body.
    pub fn post_json(body: &Value) -> Self {
        Self::post(body.to_string())
    }

    /// Set the HTTP method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Add an extra request header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Builder for [`ApiClient`].
pub struct ApiClientBuilder {
    config: GatewayConfig,
    transport: Option<Arc<dyn Transport>>,
    delay: Option<Arc<dyn Delay>>,
    cache_capacity: Option<u64>,
    history_capacity: Option<usize>,
}

impl ApiClientBuilder {
    fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            transport: None,
            delay: None,
            cache_capacity: None,
            history_capacity: None,
        }
    }

    /// Replace the HTTP transport (default: [`ReqwestTransport`]).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace the backoff wait (default: `tokio::time::sleep`).
    pub fn delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Set the maximum number of cached responses.
    pub fn cache_capacity(mut self, max_entries: u64) -> Self {
        self.cache_capacity = Some(max_entries);
        self
    }

    /// Set how many recent calls are kept for loop detection.
    pub fn history_capacity(mut self, records: usize) -> Self {
        self.history_capacity = Some(records);
        self
    }

    pub fn build(self) -> ApiClient {
        ApiClient {
            config: RwLock::new(self.config),
            transport: self
                .transport
                .unwrap_or_else(|| Arc::new(ReqwestTransport::new())),
            delay: self.delay.unwrap_or_else(default_delay),
            cache: self
                .cache_capacity
                .map_or_else(ResponseCache::new, ResponseCache::with_max_entries),
            history: Mutex::new(
                self.history_capacity
                    .map_or_else(CallHistory::new, CallHistory::with_capacity),
            ),
            rate_limit: Mutex::new(None),
        }
    }
}

/// Cached, retrying, loop-aware client for the upstream API.
///
/// Construct once and share (e.g. behind an `Arc`) between all handlers.
/// All state is internal and guarded; no lock is held across an `.await`.
pub struct ApiClient {
    config: RwLock<GatewayConfig>,
    transport: Arc<dyn Transport>,
    delay: Arc<dyn Delay>,
    cache: ResponseCache,
    history: Mutex<CallHistory>,
    rate_limit: Mutex<Option<RateLimitSnapshot>>,
}

impl ApiClient {
    /// Create a client using the default transport.
    pub fn new(config: GatewayConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: GatewayConfig) -> ApiClientBuilder {
        ApiClientBuilder::new(config)
    }

    /// Issue a call through cache, loop detection and retry.
    #[instrument(skip_all, fields(method = %options.method, endpoint = %endpoint))]
    pub async fn call(&self, endpoint: &str, options: &CallOptions) -> Result<ApiResponse> {
        let key = CacheKey::new(options.method.as_str(), endpoint, options.body.as_deref());

        let check = {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            history.push(CallRecord::new(endpoint, key.clone()));
            history.detect_loop(Instant::now())
        };

        if check.is_loop {
            metrics::counter!(telemetry::LOOPS_DETECTED_TOTAL).increment(1);
            let warning = check.warnings.join("\n");
            warn!(key = %key, "rejecting repeated call");
            return Err(GatewayError::LoopDetected { warning });
        }
        for warning in &check.warnings {
            warn!(%warning, "endpoint overuse");
        }

        if let Some(data) = self.cache.get(&key) {
            self.set_rate_limit(None);
            return Ok(ApiResponse {
                data,
                meta: CallMeta {
                    from_cache: true,
                    rate_limit: None,
                    warnings: check.warnings,
                },
            });
        }

        let request = self.build_request(endpoint, options);
        let response = self.send(&request).await?;

        if !response.is_success() {
            return Err(classify_failure(&response));
        }
        self.rotate_token(&response);

        let data = response.json()?;
        let ttl = ttl_for_endpoint(endpoint);
        self.cache.insert(key, data.clone(), ttl);

        Ok(ApiResponse {
            data,
            meta: CallMeta {
                from_cache: false,
                rate_limit: self.rate_limit(),
                warnings: check.warnings,
            },
        })
    }

    /// Shorthand for a GET [`call()`](Self::call).
    pub async fn get(&self, endpoint: &str) -> Result<ApiResponse> {
        self.call(endpoint, &CallOptions::get()).await
    }

    /// Exchange credentials for a session token and use it from now on.
    ///
    /// Bypasses the cache and loop detection; the retry policy still applies.
    #[instrument(skip_all)]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<()> {
        let options = CallOptions::post_json(&json!({ "email": email, "password": password }));
        let request = self.build_request(SIGN_IN_ENDPOINT, &options);
        let response = self.send(&request).await?;

        if !response.is_success() {
            return Err(classify_failure(&response));
        }

        let body = response.json()?;
        let ok = body.get("ok").and_then(Value::as_i64) == Some(1);
        match body.get("token").and_then(Value::as_str) {
            Some(token) if ok => {
                self.set_token(token);
                info!("signed in");
                Ok(())
            }
            _ => Err(GatewayError::SignIn(
                body.get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("no token in response")
                    .to_string(),
            )),
        }
    }

    /// Replace the auth token used for subsequent calls.
    pub fn set_token(&self, token: impl Into<String>) {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        config.token = Some(token.into());
    }

    /// The auth token currently in use.
    pub fn token(&self) -> Option<String> {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .token
            .clone()
    }

    /// Quota state from the most recent network response.
    ///
    /// `None` after a cache hit, or before any response carried the headers.
    pub fn rate_limit(&self) -> Option<RateLimitSnapshot> {
        *self.rate_limit.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loop/overuse state of the current history, without recording a call.
    pub fn loop_check(&self) -> LoopCheck {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .detect_loop(Instant::now())
    }

    /// Forget recorded calls, re-arming loop detection.
    pub fn clear_history(&self) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn history_len(&self) -> usize {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Drop every cached response.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_len(&self) -> u64 {
        self.cache.len()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn build_request(&self, endpoint: &str, options: &CallOptions) -> HttpRequest {
        let config = self.config.read().unwrap_or_else(PoisonError::into_inner);

        let mut headers = Vec::with_capacity(options.headers.len() + 3);
        if options.body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        headers.extend(config.auth_headers());
        headers.extend(options.headers.iter().cloned());

        HttpRequest {
            url: config.url_for(endpoint),
            method: options.method.clone(),
            headers,
            body: options.body.clone(),
        }
    }

    /// Retrying send with metrics and rate-limit bookkeeping.
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let policy = self
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .retry
            .clone();

        let start = std::time::Instant::now();
        let result = send_with_retry(
            self.transport.as_ref(),
            self.delay.as_ref(),
            &policy,
            request,
        )
        .await;
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS)
            .record(start.elapsed().as_secs_f64());

        let status = match &result {
            Ok(response) if response.is_success() => "ok",
            _ => "error",
        };
        metrics::counter!(telemetry::REQUESTS_TOTAL, "status" => status).increment(1);

        let response = result?;
        debug!(url = %request.url, status = response.status, "response received");
        if let Some(snapshot) = RateLimitSnapshot::from_response(&response) {
            self.set_rate_limit(Some(snapshot));
        }
        Ok(response)
    }

    fn set_rate_limit(&self, snapshot: Option<RateLimitSnapshot>) {
        *self.rate_limit.lock().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    /// The upstream may hand out a refreshed session token on any response.
    fn rotate_token(&self, response: &HttpResponse) {
        if let Some(token) = response.header(TOKEN_HEADER) {
            if self.token().as_deref() != Some(token) {
                debug!("session token rotated");
                self.set_token(token);
            }
        }
    }
}

/// Map a final non-2xx response to its error kind.
fn classify_failure(response: &HttpResponse) -> GatewayError {
    match response.status {
        429 => GatewayError::RateLimited {
            retry_after: rate_limit::retry_after(response),
        },
        401 => GatewayError::AuthenticationFailed,
        status => GatewayError::Http {
            status,
            status_text: response.status_text.clone(),
        },
    }
}
