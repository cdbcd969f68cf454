//! Configuration management for Gatekeeper.
//!
//! Settings are layered: compiled-in defaults, then an optional YAML file,
//! then `GATEKEEPER__<SECTION>__<FIELD>` environment variables.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::Result;
use crate::ratelimit::FailurePolicy;

/// Prefix for environment overrides.
const ENV_PREFIX: &str = "GATEKEEPER";

/// Main configuration for the Gatekeeper service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatekeeperConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// How callers are identified
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Exercise catalog upstream
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Identity resolution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Cookie carrying the device correlation id
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
        }
    }
}

fn default_cookie_name() -> String {
    "deviceId".to_string()
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Path to per-operation rule overrides
    #[serde(default)]
    pub rules_path: Option<String>,

    /// What to do when the counter store fails
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Counters whose window ended this long ago are evicted
    #[serde(default = "default_idle_eviction")]
    pub idle_eviction_secs: u64,

    /// How often the sweeper runs
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Upper bound on one counter store round-trip
    #[serde(default = "default_store_timeout")]
    pub store_timeout_ms: u64,

    /// How often the rules file is re-read; 0 disables reloading
    #[serde(default = "default_reload_interval")]
    pub rules_reload_interval_secs: u64,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            rules_path: None,
            failure_policy: FailurePolicy::default(),
            idle_eviction_secs: default_idle_eviction(),
            sweep_interval_secs: default_sweep_interval(),
            store_timeout_ms: default_store_timeout(),
            rules_reload_interval_secs: default_reload_interval(),
        }
    }
}

impl RateLimitingConfig {
    pub fn idle_eviction(&self) -> Duration {
        Duration::from_secs(self.idle_eviction_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn rules_reload_interval(&self) -> Option<Duration> {
        (self.rules_reload_interval_secs > 0)
            .then(|| Duration::from_secs(self.rules_reload_interval_secs))
    }
}

fn default_idle_eviction() -> u64 {
    300
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_store_timeout() -> u64 {
    250
}

fn default_reload_interval() -> u64 {
    60
}

/// Exercise catalog upstream configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the catalog API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Sent as `X-Api-Key` when present
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:9000".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

impl GatekeeperConfig {
    /// Load configuration from an optional YAML file plus environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Yaml)
                    .required(true),
            );
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: GatekeeperConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| crate::error::GatekeeperError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatekeeperConfig::default();
        assert_eq!(config.server.http_addr.port(), 8080);
        assert_eq!(config.identity.cookie_name, "deviceId");
        assert_eq!(config.rate_limiting.failure_policy, FailurePolicy::Open);
        assert!(config.rate_limiting.rules_path.is_none());
        assert_eq!(config.upstream.timeout(), Duration::from_secs(5));
        assert_eq!(
            config.rate_limiting.store_timeout(),
            Duration::from_millis(250)
        );
        assert_eq!(
            config.rate_limiting.rules_reload_interval(),
            Some(Duration::from_secs(60))
        );
    }

    #[test]
    fn test_reload_disabled_with_zero() {
        let config = RateLimitingConfig {
            rules_reload_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.rules_reload_interval(), None);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
rate_limiting:
  failure_policy: closed
upstream:
  base_url: "https://catalog.internal"
  api_key: "secret"
"#;
        let config = GatekeeperConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.rate_limiting.failure_policy, FailurePolicy::Closed);
        assert_eq!(config.rate_limiting.idle_eviction_secs, 300);
        assert_eq!(config.upstream.base_url, "https://catalog.internal");
        assert_eq!(config.upstream.api_key.as_deref(), Some("secret"));
        assert_eq!(config.server.http_addr.port(), 8080);
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let result = GatekeeperConfig::from_yaml("server: [unterminated");
        assert!(matches!(
            result,
            Err(crate::error::GatekeeperError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("gatekeeper-{}.yaml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            "server:\n  http_addr: \"127.0.0.1:9191\"\nidentity:\n  cookie_name: did\n",
        )
        .unwrap();

        let loaded = GatekeeperConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded.server.http_addr.port(), 9191);
        assert_eq!(loaded.identity.cookie_name, "did");
        assert_eq!(loaded.rate_limiting.sweep_interval_secs, 60);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let path = std::env::temp_dir().join("gatekeeper-does-not-exist.yaml");
        assert!(matches!(
            GatekeeperConfig::load(Some(&path)),
            Err(crate::error::GatekeeperError::Config(_))
        ));
    }

    #[test]
    fn test_sweep_interval_never_zero() {
        let config = RateLimitingConfig {
            sweep_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.sweep_interval(), Duration::from_secs(1));
    }
}
