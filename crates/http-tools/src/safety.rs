//! Outbound HTTP safety controls (scheme check, host allowlist, private networks, redaction).
//!
//! The default policy is permissive: `call_api` may target any `http(s)` URL. Operators can
//! narrow it through [`InvokerConfig`].

use crate::config::{InvokerConfig, RedirectPolicy};
use crate::runtime::HttpToolsError;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tokio::net::lookup_host;
use url::Url;

#[derive(Debug, Clone)]
pub struct OutboundHttpSafety {
    /// If set, only these hosts are allowed (lowercased).
    pub allowed_hosts: Option<HashSet<String>>,
    /// If true, allow private/loopback/link-local/reserved destination IPs.
    pub allow_private_networks: bool,
    /// Maximum response body size (bytes). `None` = unlimited.
    pub max_response_bytes: Option<usize>,
    pub redirects: RedirectPolicy,
}

impl OutboundHttpSafety {
    /// Most permissive policy.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            allowed_hosts: None,
            allow_private_networks: true,
            max_response_bytes: None,
            redirects: RedirectPolicy::Checked,
        }
    }

    #[must_use]
    pub fn from_config(config: &InvokerConfig) -> Self {
        Self {
            allowed_hosts: config.allowed_hosts.as_ref().map(|hosts| {
                hosts
                    .iter()
                    .map(|h| h.trim().to_ascii_lowercase())
                    .filter(|h| !h.is_empty())
                    .collect()
            }),
            allow_private_networks: config.allow_private_networks,
            max_response_bytes: config.max_response_bytes,
            redirects: config.redirects,
        }
    }

    /// Validate a URL before making an outbound request.
    ///
    /// # Errors
    ///
    /// Returns [`HttpToolsError::Blocked`] if the URL is disallowed by the policy (unsupported
    /// scheme, host not in allowlist, or hostname resolves to a disallowed IP range).
    pub async fn check_url(&self, url: &Url) -> Result<(), HttpToolsError> {
        let host = self.check_static(url)?;

        if self.allow_private_networks || host.parse::<IpAddr>().is_ok() {
            return Ok(());
        }

        // Resolve hostname and validate every resolved address.
        let port = url.port_or_known_default().unwrap_or(443);
        let addrs = lookup_host((host.as_str(), port)).await.map_err(|e| {
            HttpToolsError::Transport(format!("DNS lookup failed for host '{host}': {e}"))
        })?;

        let mut saw_any = false;
        for addr in addrs {
            saw_any = true;
            if is_denied_ip(addr.ip()) {
                return Err(HttpToolsError::Blocked(format!(
                    "host '{host}' resolved to disallowed IP '{}'",
                    addr.ip()
                )));
            }
        }

        if !saw_any {
            return Err(HttpToolsError::Transport(format!(
                "DNS lookup returned no addresses for host '{host}'"
            )));
        }

        Ok(())
    }

    /// Checks that need no DNS: scheme, allowlist and IP literals.
    ///
    /// # Errors
    ///
    /// Returns [`HttpToolsError::Blocked`] when the URL is disallowed.
    pub fn check_static(&self, url: &Url) -> Result<String, HttpToolsError> {
        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(HttpToolsError::Blocked(format!(
                "unsupported URL scheme '{scheme}'"
            )));
        }

        let Some(host) = url.host_str() else {
            return Err(HttpToolsError::Blocked("missing URL host".to_string()));
        };
        let host = host.trim_start_matches('[').trim_end_matches(']').to_string();

        if let Some(allowed) = &self.allowed_hosts
            && !allowed.contains(&host.to_ascii_lowercase())
        {
            return Err(HttpToolsError::Blocked(format!(
                "host '{host}' not in allowlist"
            )));
        }

        if !self.allow_private_networks
            && let Ok(ip) = host.parse::<IpAddr>()
            && is_denied_ip(ip)
        {
            return Err(HttpToolsError::Blocked(format!(
                "destination IP '{ip}' is not allowed"
            )));
        }

        Ok(host)
    }
}

impl Default for OutboundHttpSafety {
    fn default() -> Self {
        Self::permissive()
    }
}

/// Drop credentials, query and fragment so secrets never reach logs or tool output.
#[must_use]
pub fn redact_url(url: &Url) -> String {
    let mut u = url.clone();
    let _ = u.set_username("");
    let _ = u.set_password(None);
    u.set_query(None);
    u.set_fragment(None);
    u.to_string()
}

#[must_use]
pub fn sanitize_reqwest_error(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    if let Some(u) = e.url() {
        msg = msg.replace(u.as_str(), &redact_url(u));
    }
    msg
}

fn is_denied_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_denied_ipv4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_denied_ipv4(v4),
            None => is_denied_ipv6(v6),
        },
    }
}

fn is_denied_ipv4(ip: Ipv4Addr) -> bool {
    if ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_multicast()
    {
        return true;
    }

    let oct = ip.octets();
    // CGNAT 100.64.0.0/10
    if oct[0] == 100 && (64..=127).contains(&oct[1]) {
        return true;
    }

    oct[0] >= 240
}

fn is_denied_ipv6(ip: Ipv6Addr) -> bool {
    ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        || ip.is_unique_local()
        || ip.is_unicast_link_local()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn restrictive() -> OutboundHttpSafety {
        OutboundHttpSafety::from_config(&InvokerConfig {
            allow_private_networks: false,
            ..InvokerConfig::default()
        })
    }

    #[tokio::test]
    async fn restrictive_policy_blocks_loopback_and_metadata_ips() {
        for raw in [
            "http://127.0.0.1:1234/",
            "http://169.254.169.254/latest/meta-data",
            "http://[::1]:8080/",
            "http://100.100.1.1/",
        ] {
            let url = Url::parse(raw).unwrap();
            let err = restrictive().check_url(&url).await.unwrap_err();
            assert!(matches!(err, HttpToolsError::Blocked(_)), "{raw}: {err}");
        }
    }

    #[tokio::test]
    async fn restrictive_policy_resolves_hostnames() {
        let url = Url::parse("http://localhost:8080/admin").unwrap();
        assert!(restrictive().check_static(&url).is_ok());

        let err = restrictive().check_url(&url).await.unwrap_err();
        assert!(matches!(err, HttpToolsError::Blocked(_)), "{err}");
        assert!(err.to_string().contains("localhost"), "{err}");
    }

    #[tokio::test]
    async fn permissive_policy_allows_loopback() {
        let url = Url::parse("http://127.0.0.1:1234/").unwrap();
        OutboundHttpSafety::permissive().check_url(&url).await.unwrap();
    }

    #[test]
    fn non_http_schemes_are_blocked() {
        for raw in ["ftp://example.com/x", "file:///etc/passwd", "data:text/plain,hi"] {
            let url = Url::parse(raw).unwrap();
            let err = OutboundHttpSafety::permissive()
                .check_static(&url)
                .unwrap_err();
            assert!(matches!(err, HttpToolsError::Blocked(_)), "{raw}");
        }
    }

    #[test]
    fn allowlist_is_case_insensitive() {
        let safety = OutboundHttpSafety::from_config(&InvokerConfig {
            allowed_hosts: Some(vec!["API.Example.com".to_string()]),
            ..InvokerConfig::default()
        });

        let ok = Url::parse("https://api.example.COM/pets").unwrap();
        assert_eq!(safety.check_static(&ok).unwrap(), "api.example.com");

        let other = Url::parse("https://evil.test/pets").unwrap();
        let err = safety.check_static(&other).unwrap_err();
        assert!(err.to_string().contains("not in allowlist"));
    }

    #[test]
    fn redaction_drops_credentials_and_query() {
        let url = Url::parse("https://user:pw@api.example.com/pets?token=secret#frag").unwrap();
        assert_eq!(redact_url(&url), "https://api.example.com/pets");
    }
}
