//! Configuration management for the Zipzy gateway.
//!
//! The gateway reads an optional JSON file at `~/.zipzy/gateway.json` and then
//! applies environment variable overrides on top of it.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! ## Upstreams
//! - `BACKEND_URL` (or `NEXT_PUBLIC_API_URL`) → upstream.backend_url
//! - `LEGACY_SERVER_URL` → upstream.legacy_url
//! - `ZIPZY_UPSTREAM_TIMEOUT_SECS` → upstream.timeout_secs
//!
//! ## Security
//! - `PROXY_INTERNAL_TOKEN` → security.internal_proxy_token
//!
//! ## Server
//! - `ZIPZY_BIND_ADDRESS` → gateway.host
//! - `ZIPZY_GATEWAY_PORT` → gateway.port
//!
//! ## Rate limiting
//! - `ZIPZY_RATE_LIMIT_MAX` → rate_limit.max_requests
//! - `ZIPZY_RATE_LIMIT_WINDOW_SECS` → rate_limit.window_secs
//! - `ZIPZY_RATE_LIMIT_CAPACITY` → rate_limit.capacity
//!
//! ## Misc
//! - `ZIPZY_SUPABASE_SETUP_PATH` → assets.supabase_setup_path
//! - `ZIPZY_LOG_LEVEL` / `ZIPZY_LOG_FORMAT` → observability.*

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".zipzy"),
        |dirs| dirs.home_dir().join(".zipzy"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("gateway.json")
}

// ============================================================================
// Gateway (listener) Configuration
// ============================================================================

/// Listener settings for the gateway process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Bind address. Default "127.0.0.1" (local only).
    #[serde(default = "default_bind_address")]
    pub host: String,

    /// Listen port.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Maximum inbound request body size in bytes.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_bind_address(),
            port: default_gateway_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".into()
}

fn default_gateway_port() -> u16 {
    3000
}

fn default_body_limit() -> usize {
    10 * 1024 * 1024
}

// ============================================================================
// Upstream Configuration
// ============================================================================

/// Upstream origins the gateway forwards to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Primary backend base URL (serves `/api/...`).
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Legacy backend base URL (serves the stripped `/legacy/server` family).
    #[serde(default = "default_legacy_url")]
    pub legacy_url: String,

    /// Timeout applied to every upstream call, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            legacy_url: default_legacy_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl UpstreamConfig {
    /// Upstream timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_backend_url() -> String {
    "http://localhost:8000".into()
}

fn default_legacy_url() -> String {
    "http://localhost:4001".into()
}

fn default_timeout_secs() -> u64 {
    30
}

// ============================================================================
// Security Configuration
// ============================================================================

/// Shared secrets used by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityConfig {
    /// Expected value of the `x-internal-proxy-token` header.
    /// When unset, every request to a token-gated family is rejected.
    #[serde(default)]
    pub internal_proxy_token: Option<String>,
}

// ============================================================================
// Rate Limit Configuration
// ============================================================================

/// Fixed-window rate limit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per window per client.
    #[serde(default = "default_rate_limit_max")]
    pub max_requests: u32,

    /// Window length in seconds.
    #[serde(default = "default_rate_limit_window")]
    pub window_secs: u64,

    /// Maximum number of distinct clients tracked at once.
    #[serde(default = "default_rate_limit_capacity")]
    pub capacity: usize,

    /// How often stale entries are swept, in seconds. 0 disables the sweeper.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_rate_limit_max(),
            window_secs: default_rate_limit_window(),
            capacity: default_rate_limit_capacity(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

fn default_rate_limit_max() -> u32 {
    60
}

fn default_rate_limit_window() -> u64 {
    60
}

fn default_rate_limit_capacity() -> usize {
    10_000
}

fn default_sweep_interval() -> u64 {
    300
}

// ============================================================================
// Static Assets
// ============================================================================

/// Files served directly by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    /// SQL setup script served at `/api/legacy/supabase-setup`.
    #[serde(default = "default_supabase_setup_path")]
    pub supabase_setup_path: PathBuf,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            supabase_setup_path: default_supabase_setup_path(),
        }
    }
}

fn default_supabase_setup_path() -> PathBuf {
    PathBuf::from("frontend/zipzy-unified/supabase-setup.sql")
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration for the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub assets: AssetsConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = config_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            tracing::debug!("Config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path (no environment overrides).
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Apply environment variable overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using a custom variable lookup.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("BACKEND_URL").or_else(|| lookup("NEXT_PUBLIC_API_URL")) {
            self.upstream.backend_url = url;
        }
        if let Some(url) = lookup("LEGACY_SERVER_URL") {
            self.upstream.legacy_url = url;
        }
        if let Some(secs) = lookup("ZIPZY_UPSTREAM_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.upstream.timeout_secs = secs;
        }

        // An empty token is kept as-is; the gate treats it the same as unset.
        if let Some(token) = lookup("PROXY_INTERNAL_TOKEN") {
            self.security.internal_proxy_token = Some(token);
        }

        if let Some(bind) = lookup("ZIPZY_BIND_ADDRESS") {
            self.gateway.host = bind;
        }
        if let Some(port) = lookup("ZIPZY_GATEWAY_PORT").and_then(|v| v.parse().ok()) {
            self.gateway.port = port;
        }

        if let Some(max) = lookup("ZIPZY_RATE_LIMIT_MAX").and_then(|v| v.parse().ok()) {
            self.rate_limit.max_requests = max;
        }
        if let Some(secs) = lookup("ZIPZY_RATE_LIMIT_WINDOW_SECS").and_then(|v| v.parse().ok()) {
            self.rate_limit.window_secs = secs;
        }
        if let Some(cap) = lookup("ZIPZY_RATE_LIMIT_CAPACITY").and_then(|v| v.parse().ok()) {
            self.rate_limit.capacity = cap;
        }

        if let Some(path) = lookup("ZIPZY_SUPABASE_SETUP_PATH") {
            self.assets.supabase_setup_path = PathBuf::from(path);
        }

        if let Some(level) = lookup("ZIPZY_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("ZIPZY_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }

    /// Check that the configuration can drive a gateway.
    pub fn validate(&self) -> crate::error::Result<()> {
        validate_upstream_url("upstream.backend_url", &self.upstream.backend_url)?;
        validate_upstream_url("upstream.legacy_url", &self.upstream.legacy_url)?;

        if self.upstream.timeout_secs == 0 {
            return Err(Error::Config("upstream.timeout_secs must be > 0".into()));
        }
        if self.rate_limit.max_requests == 0 {
            return Err(Error::Config("rate_limit.max_requests must be > 0".into()));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(Error::Config("rate_limit.window_secs must be > 0".into()));
        }
        if self.rate_limit.capacity == 0 {
            return Err(Error::Config("rate_limit.capacity must be > 0".into()));
        }

        Ok(())
    }
}

fn validate_upstream_url(field: &str, value: &str) -> crate::error::Result<()> {
    let parsed = url::Url::parse(value)
        .map_err(|e| Error::Config(format!("{field} is not a valid URL: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::Config(format!(
            "{field} must use http or https, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.upstream.backend_url, "http://localhost:8000");
        assert_eq!(config.upstream.legacy_url, "http://localhost:4001");
        assert_eq!(config.upstream.timeout(), Duration::from_secs(30));
        assert_eq!(config.rate_limit.max_requests, 60);
        assert_eq!(config.rate_limit.window(), Duration::from_secs(60));
        assert!(config.security.internal_proxy_token.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env_overrides_from(lookup_from(&[
            ("BACKEND_URL", "http://backend:9000"),
            ("LEGACY_SERVER_URL", "http://legacy:4001"),
            ("PROXY_INTERNAL_TOKEN", "s3cret"),
            ("ZIPZY_GATEWAY_PORT", "8080"),
            ("ZIPZY_RATE_LIMIT_MAX", "5"),
            ("ZIPZY_UPSTREAM_TIMEOUT_SECS", "not-a-number"),
        ]));

        assert_eq!(config.upstream.backend_url, "http://backend:9000");
        assert_eq!(config.upstream.legacy_url, "http://legacy:4001");
        assert_eq!(config.security.internal_proxy_token.as_deref(), Some("s3cret"));
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.rate_limit.max_requests, 5);
        // Unparseable values leave the default untouched
        assert_eq!(config.upstream.timeout_secs, 30);
    }

    #[test]
    fn test_next_public_api_url_fallback() {
        let mut config = Config::default();
        config.apply_env_overrides_from(lookup_from(&[("NEXT_PUBLIC_API_URL", "http://api:1")]));
        assert_eq!(config.upstream.backend_url, "http://api:1");

        config.apply_env_overrides_from(lookup_from(&[
            ("NEXT_PUBLIC_API_URL", "http://api:1"),
            ("BACKEND_URL", "http://backend:2"),
        ]));
        assert_eq!(config.upstream.backend_url, "http://backend:2");
    }

    #[test]
    fn test_empty_token_is_not_usable() {
        let mut config = Config::default();
        config.apply_env_overrides_from(lookup_from(&[("PROXY_INTERNAL_TOKEN", "")]));
        assert!(config
            .security
            .internal_proxy_token
            .as_deref()
            .map_or(true, str::is_empty));
    }

    #[test]
    fn test_validate_rejects_bad_upstream() {
        let mut config = Config::default();
        config.upstream.backend_url = "ftp://files.example".into();
        assert!(config.validate().is_err());

        config.upstream.backend_url = "not a url".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = Config::default();
        config.rate_limit.window_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, crate::error::Error::Config(_)));
        assert!(err.to_string().contains("window_secs"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.json");
        fs::write(
            &path,
            r#"{
                "upstream": { "backend_url": "http://10.0.0.5:8000" },
                "rate_limit": { "max_requests": 10 },
                "observability": { "level": "debug" }
            }"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.upstream.backend_url, "http://10.0.0.5:8000");
        assert_eq!(config.upstream.legacy_url, "http://localhost:4001");
        assert_eq!(config.rate_limit.max_requests, 10);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn test_load_from_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
