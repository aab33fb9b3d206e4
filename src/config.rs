//! Configuration management for Turnstile.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, TurnstileError};
use crate::ratelimit::{FailurePolicy, PolicySet};

/// Environment variable prefix for configuration overrides.
///
/// `TURNSTILE__SWEEPER__INTERVAL_MS=5000` overrides `sweeper.interval_ms`.
pub const ENV_PREFIX: &str = "TURNSTILE";

/// Main configuration for a Turnstile deployment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnstileConfig {
    /// Background sweep configuration
    #[serde(default)]
    pub sweeper: SweeperConfig,

    /// What guarded operations do when the bucket store is unavailable
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Named quota policies
    #[serde(default)]
    pub policies: PolicySet,
}

/// Background sweep configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweeperConfig {
    /// Whether to run the sweeper at all
    #[serde(default = "default_sweeper_enabled")]
    pub enabled: bool,

    /// Time between sweeps in milliseconds
    #[serde(default = "default_sweep_interval")]
    pub interval_ms: u64,

    /// How long past its window a bucket is kept before it may be removed
    #[serde(default)]
    pub idle_grace_ms: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: default_sweeper_enabled(),
            interval_ms: default_sweep_interval(),
            idle_grace_ms: 0,
        }
    }
}

impl SweeperConfig {
    /// The sweep interval as a `Duration`.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_sweeper_enabled() -> bool {
    true
}

fn default_sweep_interval() -> u64 {
    60_000
}

impl TurnstileConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: TurnstileConfig =
            serde_yaml::from_str(yaml).map_err(|e| TurnstileError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an optional file layered under
    /// `TURNSTILE__*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: TurnstileConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        if self.sweeper.enabled && self.sweeper.interval_ms == 0 {
            return Err(TurnstileError::Config(
                "sweeper.interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
