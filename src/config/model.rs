use serde::Deserialize;

/// Settings as read from the optional YAML file named by `CONFIG_FILE`.
/// Every field is optional here; environment variables take precedence and
/// required values are checked once both sources are merged.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSettings {
    pub ldap_addr: Option<String>,
    pub ldap_port: Option<u16>,
    pub ldap_scheme: Option<String>,
    pub bind_user: Option<String>,
    pub bind_password: Option<String>,
    pub base_dn: Option<String>,
    pub search_filter: Option<String>,
    pub search_attributes: Option<String>,
    pub probe_interval_seconds: Option<u64>,
    pub probe_timeout_seconds: Option<u64>,
    pub listen_addr: Option<String>,
    pub mimir_endpoint: Option<String>,
    pub mimir_tenant: Option<String>,
}
