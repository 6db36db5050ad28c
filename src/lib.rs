//! screeps-gateway - access layer for the Screeps Web API
//!
//! Every outbound call made on behalf of an agent goes through one
//! [`ApiClient`], which adds:
//!
//! - a response cache with endpoint-specific lifetimes
//! - retry with capped exponential backoff on transient failures
//! - rate-limit tracking from response headers
//! - loop detection that rejects an agent re-issuing the same request
//!
//! Failures surface as typed [`GatewayError`] variants so callers can
//! react by kind.
//!
//! # Example
//!
//! ```rust,no_run
//! use screeps_gateway::{ApiClient, GatewayConfig, GatewayError, build_endpoint_with_query};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> screeps_gateway::Result<()> {
//!     let client = ApiClient::new(GatewayConfig::load(None)?);
//!
//!     let endpoint = build_endpoint_with_query(
//!         "/game/room-terrain",
//!         [("room", json!("W7N3")), ("shard", json!("shard0"))],
//!     );
//!     match client.get(&endpoint).await {
//!         Ok(reply) => println!("{}", reply.data),
//!         Err(GatewayError::LoopDetected { warning }) => eprintln!("{warning}"),
//!         Err(e) => return Err(e),
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod history;
pub mod query;
pub mod rate_limit;
pub mod response;
pub mod retry;
pub mod telemetry;
pub mod transport;

// Re-export main types at crate root
pub use client::{ApiClient, ApiClientBuilder, CallOptions};
pub use config::GatewayConfig;
pub use error::{GatewayError, Result};
pub use history::LoopCheck;
pub use query::build_endpoint_with_query;
pub use rate_limit::RateLimitSnapshot;
pub use response::{ApiResponse, CallMeta};
pub use retry::{Delay, RetryPolicy, TokioDelay};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
