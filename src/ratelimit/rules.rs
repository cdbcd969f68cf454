//! Per-operation rate limit rules.
//!
//! Every protected operation ships with compiled-in limits. A YAML rules
//! file may override the limit and window of any operation by key:
//!
//! ```yaml
//! operations:
//!   - key: "exercises:bodyParts"
//!     rate_limit:
//!       requests_per_unit: 120
//!       unit: minute
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{GatekeeperError, Result};

/// A protected operation and its admission limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    /// Hierarchical operation key, e.g. `exercises:bodyParts`
    pub key: &'static str,
    /// Admitted calls per window
    pub limit: u32,
    /// Window length in seconds
    pub window_secs: u64,
}

impl Operation {
    pub const fn new(key: &'static str, limit: u32, window_secs: u64) -> Self {
        Self {
            key,
            limit,
            window_secs,
        }
    }
}

/// Rule overrides loaded from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRules {
    /// Overrides, one per operation key
    #[serde(default)]
    pub operations: Vec<OperationConfig>,
}

/// Configuration for one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationConfig {
    /// The operation key to match
    pub key: String,
    /// Rate limit to apply
    pub rate_limit: RateLimitRule,
}

/// A rate limit rule specifying the limit and time window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
    /// Number of requests allowed per unit of time
    pub requests_per_unit: u32,
    /// The time unit
    pub unit: TimeUnit,
    /// Optional name/description for this limit
    #[serde(default)]
    pub name: Option<String>,
}

/// Time unit for rate limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
}

impl TimeUnit {
    /// Get the duration of this time unit.
    pub fn duration(&self) -> Duration {
        match self {
            TimeUnit::Second => Duration::from_secs(1),
            TimeUnit::Minute => Duration::from_secs(60),
            TimeUnit::Hour => Duration::from_secs(3600),
            TimeUnit::Day => Duration::from_secs(86400),
        }
    }
}

impl RateLimitRules {
    /// Create an empty rule set; every operation keeps its built-in limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load rules from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rate limit rules");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load rules from a YAML file without blocking the runtime.
    pub async fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        Self::from_yaml(&contents)
    }

    /// Load rules from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let rules: RateLimitRules = serde_yaml::from_str(yaml).map_err(|e| {
            GatekeeperError::Config(format!("Failed to parse rate limit rules: {}", e))
        })?;
        rules.validate()?;
        Ok(rules)
    }

    fn validate(&self) -> Result<()> {
        for op in &self.operations {
            if op.rate_limit.requests_per_unit == 0 {
                return Err(GatekeeperError::Config(format!(
                    "operation {} must allow at least one request per unit",
                    op.key
                )));
            }
        }
        Ok(())
    }

    /// Find the rule for an operation key.
    ///
    /// When a key is listed more than once the last entry wins.
    pub fn find(&self, key: &str) -> Option<&RateLimitRule> {
        self.operations
            .iter()
            .rev()
            .find(|op| op.key == key)
            .map(|op| &op.rate_limit)
    }

    /// Apply any override for `op`, keeping its key.
    pub fn resolve(&self, op: &Operation) -> Operation {
        match self.find(op.key) {
            Some(rule) => Operation {
                key: op.key,
                limit: rule.requests_per_unit,
                window_secs: rule.unit.duration().as_secs(),
            },
            None => *op,
        }
    }

    /// Index the overrides by key, for logging.
    pub fn summary(&self) -> HashMap<&str, (u32, TimeUnit)> {
        self.operations
            .iter()
            .map(|op| {
                (
                    op.key.as_str(),
                    (op.rate_limit.requests_per_unit, op.rate_limit.unit),
                )
            })
            .collect()
    }
}
