use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outbound policy for `call_api`.
///
/// Every field is optional and the defaults are permissive: no timeout override, no size cap,
/// any host, redirects followed.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InvokerConfig {
    /// Per-request timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Maximum response body size (bytes).
    #[serde(default)]
    pub max_response_bytes: Option<usize>,

    /// If set, only these hosts may be called (case-insensitive).
    #[serde(default)]
    pub allowed_hosts: Option<Vec<String>>,

    /// Allow loopback/private/link-local destinations.
    #[serde(default = "default_true")]
    pub allow_private_networks: bool,

    #[serde(default)]
    pub redirects: RedirectPolicy,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            max_response_bytes: None,
            allowed_hosts: None,
            allow_private_networks: true,
            redirects: RedirectPolicy::default(),
        }
    }
}

impl InvokerConfig {
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RedirectPolicy {
    /// Do not follow redirects.
    None,
    /// Follow redirects, but re-check the destination URL on each hop.
    #[default]
    Checked,
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_is_permissive() {
        let cfg: InvokerConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg, InvokerConfig::default());
        assert!(cfg.allow_private_networks);
        assert_eq!(cfg.redirects, RedirectPolicy::Checked);
        assert!(cfg.timeout().is_none());
    }

    #[test]
    fn deserializes_camel_case_keys() {
        let cfg: InvokerConfig = serde_yaml::from_str(
            r"
timeoutSecs: 10
maxResponseBytes: 4096
allowedHosts: [api.example.com]
allowPrivateNetworks: false
redirects: none
",
        )
        .unwrap();
        assert_eq!(cfg.timeout(), Some(Duration::from_secs(10)));
        assert_eq!(cfg.max_response_bytes, Some(4096));
        assert_eq!(cfg.allowed_hosts, Some(vec!["api.example.com".to_string()]));
        assert!(!cfg.allow_private_networks);
        assert_eq!(cfg.redirects, RedirectPolicy::None);
    }
}
