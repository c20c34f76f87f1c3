use super::models::{Config, IdentityConfig, RuleConfig};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Rule #{index} has an empty name")]
    EmptyRuleName { index: usize },

    #[error("Rule name '{name}' is used more than once")]
    DuplicateRuleName { name: String },

    #[error("Rule '{rule}' configures no actions")]
    EmptyRule { rule: String },

    #[error("Rule '{rule}' path_prefix '{prefix}' must start with '/'")]
    InvalidPathPrefix { rule: String, prefix: String },

    #[error("Rule '{rule}' sets accept_invalid_hostnames without a host")]
    HostnamePolicyWithoutHost { rule: String },

    #[error("Rule '{rule}' client_identity: {reason}")]
    InvalidIdentity { rule: String, reason: String },

    #[error("HTTP timeout must be positive: {field} = 0")]
    ZeroTimeout { field: String },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_http(config)?;
    validate_rules(config)?;
    Ok(())
}

fn validate_http(config: &Config) -> Result<(), ValidationError> {
    if config.http.connect_timeout_ms == 0 {
        return Err(ValidationError::ZeroTimeout {
            field: "connect_timeout_ms".to_string(),
        });
    }
    if config.http.timeout_ms == 0 {
        return Err(ValidationError::ZeroTimeout {
            field: "timeout_ms".to_string(),
        });
    }
    Ok(())
}

fn validate_rules(config: &Config) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();

    for (index, rule) in config.rules.iter().enumerate() {
        if rule.name.trim().is_empty() {
            return Err(ValidationError::EmptyRuleName { index });
        }
        if !seen.insert(rule.name.as_str()) {
            return Err(ValidationError::DuplicateRuleName {
                name: rule.name.clone(),
            });
        }
        validate_rule(rule)?;
    }

    Ok(())
}

fn validate_rule(rule: &RuleConfig) -> Result<(), ValidationError> {
    if !rule.has_actions() {
        return Err(ValidationError::EmptyRule {
            rule: rule.name.clone(),
        });
    }

    if let Some(prefix) = &rule.path_prefix {
        if !prefix.starts_with('/') {
            return Err(ValidationError::InvalidPathPrefix {
                rule: rule.name.clone(),
                prefix: prefix.clone(),
            });
        }
    }

    if rule.accept_invalid_hostnames && rule.host.is_none() {
        return Err(ValidationError::HostnamePolicyWithoutHost {
            rule: rule.name.clone(),
        });
    }

    if let Some(identity) = &rule.client_identity {
        validate_identity(&rule.name, identity)?;
    }

    Ok(())
}

fn validate_identity(rule: &str, identity: &IdentityConfig) -> Result<(), ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidIdentity {
        rule: rule.to_string(),
        reason: reason.to_string(),
    };

    match (&identity.certificate, &identity.key, &identity.pkcs12) {
        (Some(_), Some(_), None) => {
            if identity.password_env.is_some() {
                return Err(invalid("password_env only applies to pkcs12 identities"));
            }
            Ok(())
        }
        (None, None, Some(_)) => Ok(()),
        (Some(_), None, None) | (None, Some(_), None) => {
            Err(invalid("certificate and key must be given together"))
        }
        (None, None, None) => Err(invalid("either certificate + key or pkcs12 is required")),
        _ => Err(invalid("certificate + key and pkcs12 are mutually exclusive")),
    }
}

#[cfg(test)]
mod tests {
    use super::super::models::*;
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn create_test_config() -> Config {
        let mut headers = BTreeMap::new();
        headers.insert("X-Marker".to_string(), "1".to_string());

        Config {
            rules: vec![RuleConfig {
                name: "marker".to_string(),
                protocol: Some("http".to_string()),
                headers,
                ..RuleConfig::default()
            }],
            ..Config::default()
        }
    }

    #[test]
    fn test_valid_config() {
        let config = create_test_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_duplicate_rule_name() {
        let mut config = create_test_config();
        let duplicate = config.rules[0].clone();
        config.rules.push(duplicate);

        let result = validate(&config);
        assert!(matches!(
            result,
            Err(ValidationError::DuplicateRuleName { .. })
        ));
    }

    #[test]
    fn test_empty_rule() {
        let mut config = create_test_config();
        config.rules[0].headers.clear();

        let result = validate(&config);
        assert!(matches!(result, Err(ValidationError::EmptyRule { .. })));
    }

    #[test]
    fn test_path_prefix_must_be_absolute() {
        let mut config = create_test_config();
        config.rules[0].path_prefix = Some("api".to_string());

        let result = validate(&config);
        assert!(matches!(
            result,
            Err(ValidationError::InvalidPathPrefix { .. })
        ));
    }

    #[test]
    fn test_hostname_policy_requires_host() {
        let mut config = create_test_config();
        config.rules[0].accept_invalid_hostnames = true;

        let result = validate(&config);
        assert!(matches!(
            result,
            Err(ValidationError::HostnamePolicyWithoutHost { .. })
        ));
    }

    #[test]
    fn test_identity_shapes() {
        let mut config = create_test_config();
        config.rules[0].client_identity = Some(IdentityConfig {
            certificate: Some(PathBuf::from("client.crt")),
            ..IdentityConfig::default()
        });
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidIdentity { .. })
        ));

        config.rules[0].client_identity = Some(IdentityConfig {
            certificate: Some(PathBuf::from("client.crt")),
            key: Some(PathBuf::from("client.key")),
            pkcs12: Some(PathBuf::from("client.p12")),
            password_env: None,
        });
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidIdentity { .. })
        ));

        config.rules[0].client_identity = Some(IdentityConfig {
            pkcs12: Some(PathBuf::from("client.p12")),
            password_env: Some("CLIENT_P12_PASSWORD".to_string()),
            ..IdentityConfig::default()
        });
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_timeout() {
        let mut config = create_test_config();
        config.http.timeout_ms = 0;

        let result = validate(&config);
        assert!(matches!(result, Err(ValidationError::ZeroTimeout { .. })));
    }
}
