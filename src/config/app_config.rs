use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use super::error::ConfigError;
use super::model::FileSettings;
use super::probe_config::ProbeConfig;
use crate::ldap_probe::attributes::parse_attributes_list;

pub const DEFAULT_LDAP_PORT: u16 = 389;
pub const DEFAULT_LDAP_SCHEME: &str = "ldap";
pub const DEFAULT_SEARCH_FILTER: &str = "(&(objectclass=*))";
pub const DEFAULT_SEARCH_ATTRIBUTES: &str = "cn dn";
pub const DEFAULT_PROBE_INTERVAL_SECONDS: u64 = 10;
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:2112";

pub struct AppConfig {
    pub probe: ProbeConfig,
    /// Address the `/metrics` endpoint listens on.
    pub listen_addr: SocketAddr,
    /// Set when probe results should also be pushed to a Mimir remote-write endpoint.
    pub remote_write: Option<RemoteWriteConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteWriteConfig {
    /// Base URL of the Mimir instance, e.g. `http://localhost:9009`.
    pub endpoint: String,
    /// Sent as the `X-Scope-OrgID` header when present.
    pub tenant: Option<String>,
}

/// Load the application configuration from the process environment.
///
/// When `CONFIG_FILE` points at a YAML file its settings are used as a base and
/// any non-empty environment variable overrides them.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let lookup = |key: &str| env::var(key).ok();

    let file = match non_empty(lookup("CONFIG_FILE")) {
        Some(path) => read_file_settings(&path)?,
        None => FileSettings::default(),
    };

    resolve(file, lookup)
}

pub fn read_file_settings(path: &str) -> Result<FileSettings, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })
}

/// Merge file settings with values from `lookup`, apply defaults and validate.
pub fn resolve<F>(file: FileSettings, lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let src = Sources { env: lookup };

    let bind_user = src.required("BIND_USER", file.bind_user)?;
    let bind_password = src.required("BIND_PASSWORD", file.bind_password)?;
    let ldap_addr = src.required("LDAP_ADDR", file.ldap_addr)?;
    let base_dn = src.required("BASE_DN", file.base_dn)?;

    let ldap_port = src
        .number("LDAP_PORT", file.ldap_port)?
        .unwrap_or(DEFAULT_LDAP_PORT);

    let scheme = src
        .text("LDAP_SCHEME", file.ldap_scheme)
        .unwrap_or_else(|| DEFAULT_LDAP_SCHEME.to_string())
        .to_ascii_lowercase();
    if scheme != "ldap" && scheme != "ldaps" {
        return Err(ConfigError::Invalid {
            key: "LDAP_SCHEME",
            reason: format!("expected ldap or ldaps, got {scheme}"),
        });
    }

    let url = Url::parse(&format!("{scheme}://{}:{ldap_port}", ldap_addr.trim())).map_err(|e| {
        ConfigError::Invalid {
            key: "LDAP_ADDR",
            reason: e.to_string(),
        }
    })?;

    let search_filter = src
        .text("SEARCH_FILTER", file.search_filter)
        .unwrap_or_else(|| DEFAULT_SEARCH_FILTER.to_string());
    let search_attributes = parse_attributes_list(
        &src.text("SEARCH_ATTRIBUTES", file.search_attributes)
            .unwrap_or_else(|| DEFAULT_SEARCH_ATTRIBUTES.to_string()),
    );

    let interval_secs = src
        .number("PROBE_INTERVAL_SECONDS", file.probe_interval_seconds)?
        .unwrap_or(DEFAULT_PROBE_INTERVAL_SECONDS);
    let timeout_secs = src
        .number("PROBE_TIMEOUT_SECONDS", file.probe_timeout_seconds)?
        .unwrap_or(interval_secs);
    let interval = positive_seconds("PROBE_INTERVAL_SECONDS", interval_secs)?;
    let phase_timeout = positive_seconds("PROBE_TIMEOUT_SECONDS", timeout_secs)?;

    let listen_addr = src
        .text("LISTEN_ADDR", file.listen_addr)
        .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
    let listen_addr = listen_addr
        .trim()
        .parse::<SocketAddr>()
        .map_err(|e| ConfigError::Invalid {
            key: "LISTEN_ADDR",
            reason: e.to_string(),
        })?;

    let remote_write = match src.text("MIMIR_ENDPOINT", file.mimir_endpoint) {
        Some(endpoint) => {
            let endpoint = endpoint.trim().trim_end_matches('/').to_string();
            Url::parse(&endpoint).map_err(|e| ConfigError::Invalid {
                key: "MIMIR_ENDPOINT",
                reason: e.to_string(),
            })?;
            Some(RemoteWriteConfig {
                endpoint,
                tenant: src.text("MIMIR_TENANT", file.mimir_tenant),
            })
        }
        None => None,
    };

    Ok(AppConfig {
        probe: ProbeConfig {
            url,
            bind_user,
            bind_password,
            base_dn,
            search_filter,
            search_attributes,
            interval,
            phase_timeout,
        },
        listen_addr,
        remote_write,
    })
}

struct Sources<F> {
    env: F,
}

impl<F: Fn(&str) -> Option<String>> Sources<F> {
    fn text(&self, key: &'static str, file: Option<String>) -> Option<String> {
        non_empty((self.env)(key)).or_else(|| non_empty(file))
    }

    fn required(&self, key: &'static str, file: Option<String>) -> Result<String, ConfigError> {
        self.text(key, file).ok_or(ConfigError::Missing(key))
    }

    fn number<T>(&self, key: &'static str, file: Option<T>) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match non_empty((self.env)(key)) {
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|e: T::Err| ConfigError::Invalid {
                    key,
                    reason: e.to_string(),
                }),
            None => Ok(file),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn positive_seconds(key: &'static str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::Invalid {
            key,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}
