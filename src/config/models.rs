use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::handlers::HttpSettings;
use crate::initializers::UnsupportedPolicy;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub registry: RegistrySettings,
    #[serde(default)]
    pub http: HttpConfig,
    /// Scoped initializers, applied in file order
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// Registry assembly options
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistrySettings {
    /// Register the stock file/http/https handlers
    #[serde(default = "default_true")]
    pub builtin_handlers: bool,
    /// Install the assembled registry as the process-wide factory target
    #[serde(default)]
    pub install: bool,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            builtin_handlers: true,
            install: false,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Defaults for connections opened by the stock HTTP handler
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            timeout_ms: default_timeout_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl HttpConfig {
    pub fn to_settings(&self) -> HttpSettings {
        HttpSettings {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.timeout_ms),
            user_agent: self.user_agent.clone(),
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_user_agent() -> String {
    HttpSettings::default().user_agent
}

/// One scoped set of connection initializers
///
/// The match fields are AND-ed together; a rule with none of them applies to
/// every connection.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RuleConfig {
    pub name: String,
    pub protocol: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path_prefix: Option<String>,
    /// Headers added to matching HTTP connections
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Tolerate certificate hostname mismatches for the rule's host
    #[serde(default)]
    pub accept_invalid_hostnames: bool,
    /// Enable the cookie store on matching HTTP connections
    #[serde(default)]
    pub cookies: bool,
    /// Extra PEM root certificates to trust
    #[serde(default)]
    pub root_certificates: Vec<PathBuf>,
    pub client_identity: Option<IdentityConfig>,
    /// Behaviour when a TLS action meets a connection without TLS
    #[serde(default)]
    pub on_unsupported: UnsupportedPolicy,
}

impl RuleConfig {
    pub fn has_actions(&self) -> bool {
        !self.headers.is_empty()
            || self.accept_invalid_hostnames
            || self.cookies
            || !self.root_certificates.is_empty()
            || self.client_identity.is_some()
    }
}

/// Client identity files; either `certificate` + `key` (PEM) or `pkcs12`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IdentityConfig {
    pub certificate: Option<PathBuf>,
    pub key: Option<PathBuf>,
    pub pkcs12: Option<PathBuf>,
    /// Environment variable holding the PKCS#12 password
    pub password_env: Option<String>,
}
