//! Named quota policies.
//!
//! Policies live outside the core: the limiter itself takes a limit and a
//! window on every call. A `PolicySet` is just a convenient way for callers to
//! keep "anonymous IPs get 60/minute, API keys get 1000/minute" in a YAML file.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use super::window::TimeWindow;
use crate::error::{Result, TurnstileError};

/// A validated quota: at most `limit` admissions per `window_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PolicySpec")]
pub struct Policy {
    /// Maximum admissions per window
    pub limit: u64,
    /// Window length in milliseconds
    pub window_ms: u64,
}

/// The two accepted shapes of a policy entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum PolicySpec {
    /// `{ limit: 100, window_ms: 60000 }`
    Millis { limit: i64, window_ms: i64 },
    /// `{ requests_per_unit: 100, unit: minute }`
    PerUnit {
        requests_per_unit: i64,
        unit: TimeWindow,
    },
}

impl TryFrom<PolicySpec> for Policy {
    type Error = String;

    fn try_from(spec: PolicySpec) -> std::result::Result<Self, Self::Error> {
        let (limit, window_ms) = match spec {
            PolicySpec::Millis { limit, window_ms } => (limit, window_ms),
            PolicySpec::PerUnit {
                requests_per_unit,
                unit,
            } => (requests_per_unit, unit.as_millis() as i64),
        };
        Policy::new(limit, window_ms).map_err(|e| e.to_string())
    }
}

impl Policy {
    /// Validate a raw limit and window.
    ///
    /// Both must be strictly positive.
    pub fn new(limit: i64, window_ms: i64) -> Result<Self> {
        if limit <= 0 {
            return Err(TurnstileError::InvalidConfiguration(format!(
                "limit must be greater than zero, got {}",
                limit
            )));
        }
        if window_ms <= 0 {
            return Err(TurnstileError::InvalidConfiguration(format!(
                "window_ms must be greater than zero, got {}",
                window_ms
            )));
        }

        Ok(Self {
            limit: limit as u64,
            window_ms: window_ms as u64,
        })
    }
}

/// A set of policies keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicySet {
    policies: HashMap<String, Policy>,
}

impl PolicySet {
    /// Create an empty policy set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load policies from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading quota policies");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load policies from a YAML mapping of name to policy.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| TurnstileError::Config(format!("Failed to parse quota policies: {}", e)))
    }

    /// Add or replace a policy.
    pub fn insert(&mut self, name: impl Into<String>, policy: Policy) {
        self.policies.insert(name.into(), policy);
    }

    /// Look up a policy by name.
    pub fn get(&self, name: &str) -> Option<Policy> {
        self.policies.get(name).copied()
    }

    /// Policy names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.policies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of policies.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
