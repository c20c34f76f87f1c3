use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "PROTOREG_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/protoreg.toml";
const ENV_PREFIX: &str = "PROTOREG";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    // Missing .env is fine
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_from_sources(config_path)
}

/// Load configuration from a specific path and environment
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // PROTOREG__HTTP__TIMEOUT_MS -> http.timeout_ms
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

/// Resolve a secret held in the named environment variable
pub fn secret(var: &str) -> Option<String> {
    env::var(var).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert!(config.registry.builtin_handlers);
        assert!(config.rules.is_empty());
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[registry]
builtin_handlers = false

[http]
timeout_ms = 5000
user_agent = "probe/2.0"

[[rules]]
name = "tenant-header"
protocol = "https"
host = "internal.example"
port = 8443
path_prefix = "/api"
headers = { "X-Tenant" = "ops" }

[[rules]]
name = "mtls"
protocol = "https"
host = "internal.example"
cookies = true
on_unsupported = "fatal"

[rules.client_identity]
certificate = "certs/client.crt"
key = "certs/client.key"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert!(!config.registry.builtin_handlers);
        assert_eq!(config.http.timeout_ms, 5000);
        assert_eq!(config.http.connect_timeout_ms, 10_000);
        assert_eq!(config.http.user_agent, "probe/2.0");

        assert_eq!(config.rules.len(), 2);
        assert_eq!(config.rules[0].name, "tenant-header");
        assert_eq!(config.rules[0].port, Some(8443));
        assert!(
            config.rules[0]
                .headers
                .iter()
                .any(|(name, value)| name.eq_ignore_ascii_case("x-tenant") && value == "ops")
        );

        let identity = config.rules[1].client_identity.as_ref().unwrap();
        assert!(identity.certificate.is_some());
        assert_eq!(
            config.rules[1].on_unsupported,
            crate::initializers::UnsupportedPolicy::Fatal
        );
    }
}
