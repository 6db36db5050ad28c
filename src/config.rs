//! Gateway configuration.
//!
//! Configuration is loaded from TOML with the following resolution order:
//! 1. explicit path (must exist)
//! 2. `~/.screeps-gateway/config.toml` (user)
//! 3. `/etc/screeps-gateway/config.toml` (system)
//! 4. built-in defaults
//!
//! Environment variables are applied on top of whichever source was used:
//! `SCREEPS_API_URL`, `SCREEPS_TOKEN`, `SCREEPS_USERNAME`, `SCREEPS_SHARD`.
//!
//! ```toml
//! base_url = "https://screeps.com/api"
//! shard = "shard3"
//!
//! [retry]
//! max_retries = 2
//! initial_delay_ms = 500
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::retry::RetryPolicy;
use crate::{GatewayError, Result};

/// Official server API root.
pub const DEFAULT_BASE_URL: &str = "https://screeps.com/api";

pub const DEFAULT_SHARD: &str = "shard0";

pub const TOKEN_HEADER: &str = "X-Token";
pub const USERNAME_HEADER: &str = "X-Username";

const ENV_BASE_URL: &str = "SCREEPS_API_URL";
const ENV_TOKEN: &str = "SCREEPS_TOKEN";
const ENV_USERNAME: &str = "SCREEPS_USERNAME";
const ENV_SHARD: &str = "SCREEPS_SHARD";

/// Connection and policy settings consumed by the access layer.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// API root; endpoints are appended to it.
    pub base_url: String,
    /// Auth token, sent as `X-Token`.
    pub token: Option<String>,
    /// Sent as `X-Username` (used by private servers).
    pub username: Option<String>,
    /// Default shard for handlers that take one.
    pub shard: String,
    pub retry: RetryPolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            username: None,
            shard: DEFAULT_SHARD.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("username", &self.username)
            .field("shard", &self.shard)
            .field("retry", &self.retry)
            .finish()
    }
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn shard(mut self, shard: impl Into<String>) -> Self {
        self.shard = shard.into();
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Load configuration from the standard locations, then apply
    /// environment overrides.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Parse a TOML file without environment overrides.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            GatewayError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            GatewayError::Configuration(msg) => {
                GatewayError::Configuration(format!("{msg} in {path:?}"))
            }
            other => other,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| GatewayError::Configuration(format!("Failed to parse config: {e}")))
    }

    /// Override fields from an environment lookup. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v: &String| !v.is_empty());
        if let Some(url) = get(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(token) = get(ENV_TOKEN) {
            self.token = Some(token);
        }
        if let Some(username) = get(ENV_USERNAME) {
            self.username = Some(username);
        }
        if let Some(shard) = get(ENV_SHARD) {
            self.shard = shard;
        }
    }

    /// Authentication headers for the current credentials.
    pub fn auth_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::new();
        if let Some(token) = &self.token {
            headers.push((TOKEN_HEADER.to_string(), token.clone()));
        }
        if let Some(username) = &self.username {
            headers.push((USERNAME_HEADER.to_string(), username.clone()));
        }
        headers
    }

    /// Join the base URL and an endpoint with exactly one slash.
    pub fn url_for(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(GatewayError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".screeps-gateway").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/screeps-gateway/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = GatewayConfig::default();
        assert_eq!(config.base_url, "https://screeps.com/api");
        assert_eq!(config.shard, "shard0");
        assert!(config.token.is_none());
        assert!(config.auth_headers().is_empty());
    }

    #[test]
    fn url_for_normalizes_slashes() {
        let config = GatewayConfig::new("http://localhost:21025/api/");
        assert_eq!(
            config.url_for("/game/time"),
            "http://localhost:21025/api/game/time"
        );
        assert_eq!(
            config.url_for("game/time"),
            "http://localhost:21025/api/game/time"
        );
    }

    #[test]
    fn env_overrides_skip_empty_values() {
        let mut config = GatewayConfig::default().token("from-file");
        config.apply_env(|name| match name {
            "SCREEPS_TOKEN" => Some(String::new()),
            "SCREEPS_SHARD" => Some("shard3".into()),
            _ => None,
        });
        assert_eq!(config.token.as_deref(), Some("from-file"));
        assert_eq!(config.shard, "shard3");
    }

    #[test]
    fn debug_output_redacts_token() {
        let config = GatewayConfig::default().token("s3cr3t-token").username("tester");
        let debug = format!("{config:?}");
        assert!(!debug.contains("s3cr3t-token"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("tester"));
    }
}
