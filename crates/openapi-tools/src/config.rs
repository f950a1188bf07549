use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default budget for fetching, validating and resolving the spec at startup.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the `OpenAPI` document comes from and how it is checked.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecSourceConfig {
    /// `OpenAPI` spec location (URL or file path).
    pub spec: String,

    /// Optional spec hash (`sha256:<hex>`) for version detection.
    #[serde(default)]
    pub spec_hash: Option<String>,

    /// Hash policy: warn, fail, or ignore.
    #[serde(default)]
    pub spec_hash_policy: HashPolicy,

    /// Replaces the spec's first `servers[].url` when composing operation URLs.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Startup timeout in seconds (spec fetch + reference resolution).
    #[serde(default)]
    pub startup_timeout_secs: Option<u64>,
}

impl SpecSourceConfig {
    #[must_use]
    pub fn new(spec: impl Into<String>) -> Self {
        Self {
            spec: spec.into(),
            spec_hash: None,
            spec_hash_policy: HashPolicy::default(),
            base_url: None,
            startup_timeout_secs: None,
        }
    }

    #[must_use]
    pub fn startup_timeout(&self) -> Duration {
        self.startup_timeout_secs
            .map_or(DEFAULT_STARTUP_TIMEOUT, Duration::from_secs)
    }
}

/// Hash verification policy.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HashPolicy {
    /// Log warning if hash doesn't match.
    #[default]
    Warn,
    /// Fail startup if hash doesn't match.
    Fail,
    /// Ignore hash verification.
    Ignore,
}
