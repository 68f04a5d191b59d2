use std::fmt;
use std::time::Duration;

use url::Url;

use crate::ldap_probe::client::SearchRequest;

/// Everything a probe cycle needs to reach and query the directory.
/// Resolved once at startup and shared read-only between cycles.
#[derive(Clone)]
pub struct ProbeConfig {
    /// The directory URL, e.g. `ldap://ldap.example.org:389`.
    pub url: Url,

    /// DN or user name used for the simple bind.
    pub bind_user: String,

    pub bind_password: String,

    /// Root of the subtree searched by the search phase.
    pub base_dn: String,

    pub search_filter: String,

    /// Attributes requested by the search phase, in order.
    pub search_attributes: Vec<String>,

    /// Pause between the end of one cycle and the start of the next.
    pub interval: Duration,

    /// Upper bound on each individual phase.
    pub phase_timeout: Duration,
}

impl ProbeConfig {
    pub fn search_request(&self) -> SearchRequest<'_> {
        SearchRequest {
            base: &self.base_dn,
            filter: &self.search_filter,
            attributes: &self.search_attributes,
        }
    }

    /// `host:port` of the probed directory, used as the `instance` label.
    pub fn instance(&self) -> String {
        match (self.url.host_str(), self.url.port_or_known_default()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            _ => self.url.to_string(),
        }
    }

    #[cfg(test)]
    pub fn sample() -> Self {
        Self {
            url: Url::parse("ldap://ldap.example.org:389").expect("valid url"),
            bind_user: "cn=monitor,dc=example,dc=org".to_string(),
            bind_password: "s3cret".to_string(),
            base_dn: "dc=example,dc=org".to_string(),
            search_filter: "(&(objectclass=*))".to_string(),
            search_attributes: vec!["cn".to_string(), "dn".to_string()],
            interval: Duration::from_secs(10),
            phase_timeout: Duration::from_secs(10),
        }
    }
}

impl fmt::Debug for ProbeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeConfig")
            .field("url", &self.url.as_str())
            .field("bind_user", &self.bind_user)
            .field("bind_password", &"<redacted>")
            .field("base_dn", &self.base_dn)
            .field("search_filter", &self.search_filter)
            .field("search_attributes", &self.search_attributes)
            .field("interval", &self.interval)
            .field("phase_timeout", &self.phase_timeout)
            .finish()
    }
}
