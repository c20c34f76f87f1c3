use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use super::models::{Config, IdentityConfig, RuleConfig};
use super::sources;
use crate::handlers::{
    Connection, HttpConnection, ProtocolRegistry, RegistryError, register_builtin_handlers,
};
use crate::initializers::{
    FnInitializer, GuardedInitializer, HeaderError, HeaderInitializer,
    HostnameVerifierInitializer, InitializerError, MatchPredicate, MutualTlsInitializer,
    TlsSetupError,
};

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("Rule '{rule}': {source}")]
    Header {
        rule: String,
        #[source]
        source: HeaderError,
    },

    #[error("Rule '{rule}': {source}")]
    Tls {
        rule: String,
        #[source]
        source: TlsSetupError,
    },

    #[error("Rule '{rule}': environment variable {var} is not set")]
    MissingSecret { rule: String, var: String },

    #[error("Rule '{rule}': client identity needs certificate + key or pkcs12")]
    IncompleteIdentity { rule: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Match predicate for a rule; the present fields are AND-ed
pub fn rule_predicate(rule: &RuleConfig) -> MatchPredicate {
    let parts = [
        rule.protocol.clone().map(MatchPredicate::protocol),
        rule.host.clone().map(MatchPredicate::host),
        rule.port.map(MatchPredicate::port),
        rule.path_prefix.clone().map(MatchPredicate::path_prefix),
    ];

    parts
        .into_iter()
        .flatten()
        .reduce(MatchPredicate::and)
        .unwrap_or_else(MatchPredicate::always)
}

/// Guarded initializers for one rule, in the order they run
pub fn rule_initializers(rule: &RuleConfig) -> Result<Vec<GuardedInitializer>, AssemblyError> {
    let predicate = rule_predicate(rule);
    let mut initializers = Vec::new();

    if !rule.headers.is_empty() {
        let mut headers = HeaderInitializer::new();
        for (name, value) in &rule.headers {
            headers = headers
                .header(name, value)
                .map_err(|source| AssemblyError::Header {
                    rule: rule.name.clone(),
                    source,
                })?;
        }
        initializers.push(GuardedInitializer::new(headers, predicate.clone()));
    }

    if rule.accept_invalid_hostnames {
        if let Some(host) = &rule.host {
            initializers.push(GuardedInitializer::new(
                HostnameVerifierInitializer::accept_hosts([host.clone()]),
                predicate.clone(),
            ));
        }
    }

    if let Some(identity) = &rule.client_identity {
        let mut tls = identity_initializer(&rule.name, identity)?
            .with_cookie_store(rule.cookies)
            .on_unsupported(rule.on_unsupported);
        for path in &rule.root_certificates {
            tls = tls
                .with_root_certificate_file(path)
                .map_err(|source| AssemblyError::Tls {
                    rule: rule.name.clone(),
                    source,
                })?;
        }
        initializers.push(GuardedInitializer::new(tls, predicate.clone()));
    } else {
        if !rule.root_certificates.is_empty() {
            initializers.push(GuardedInitializer::new(
                root_certificate_initializer(rule)?,
                predicate.clone(),
            ));
        }
        if rule.cookies {
            initializers.push(GuardedInitializer::new(
                FnInitializer::new("CookieStoreInitializer", |connection: &mut dyn Connection| {
                    if let Some(http) = connection.downcast_mut::<HttpConnection>() {
                        http.set_cookie_store(true);
                    }
                    Ok(())
                }),
                predicate,
            ));
        }
    }

    Ok(initializers)
}

fn identity_initializer(
    rule: &str,
    identity: &IdentityConfig,
) -> Result<MutualTlsInitializer, AssemblyError> {
    let tls_error = |source| AssemblyError::Tls {
        rule: rule.to_string(),
        source,
    };

    match identity {
        IdentityConfig {
            certificate: Some(certificate),
            key: Some(key),
            ..
        } => MutualTlsInitializer::from_pem_files(certificate, key).map_err(tls_error),
        IdentityConfig {
            pkcs12: Some(path),
            password_env,
            ..
        } => {
            let password = match password_env {
                Some(var) => sources::secret(var).ok_or_else(|| AssemblyError::MissingSecret {
                    rule: rule.to_string(),
                    var: var.clone(),
                })?,
                None => String::new(),
            };
            MutualTlsInitializer::from_pkcs12_file(path, password).map_err(tls_error)
        }
        _ => Err(AssemblyError::IncompleteIdentity {
            rule: rule.to_string(),
        }),
    }
}

type InitFn = Box<dyn Fn(&mut dyn Connection) -> Result<(), InitializerError> + Send + Sync>;

fn root_certificate_initializer(rule: &RuleConfig) -> Result<FnInitializer<InitFn>, AssemblyError> {
    let certificates = rule
        .root_certificates
        .iter()
        .map(|path| read_pem(&rule.name, path))
        .collect::<Result<Vec<_>, _>>()?;
    let policy = rule.on_unsupported;

    let apply: InitFn = Box::new(move |connection: &mut dyn Connection| {
        let Some(tls) = connection.tls_mut() else {
            return policy.apply("RootCertificateInitializer", connection);
        };
        for pem in &certificates {
            tls.add_root_certificate(pem.clone());
        }
        Ok(())
    });

    Ok(FnInitializer::new("RootCertificateInitializer", apply))
}

fn read_pem(rule: &str, path: &Path) -> Result<Vec<u8>, AssemblyError> {
    std::fs::read(path).map_err(|source| AssemblyError::Tls {
        rule: rule.to_string(),
        source: TlsSetupError::Read {
            path: path.to_path_buf(),
            source,
        },
    })
}

/// Assemble a registry from `config`; installs it when `registry.install` is set
pub fn build_registry(config: &Config) -> Result<ProtocolRegistry, AssemblyError> {
    let registry = ProtocolRegistry::new();

    if config.registry.builtin_handlers {
        register_builtin_handlers(&registry, &config.http.to_settings())?;
    }

    for rule in &config.rules {
        let initializers = rule_initializers(rule)?;
        debug!(
            rule = %rule.name,
            predicate = rule_predicate(rule).label(),
            initializers = initializers.len(),
            "Adding rule"
        );
        for initializer in initializers {
            registry.add_guarded(initializer);
        }
    }

    if config.registry.install {
        registry.install()?;
    }

    info!(
        protocols = ?registry.protocols(),
        initializers = registry.initializer_count(),
        installed = config.registry.install,
        "Registry assembled"
    );

    Ok(registry)
}
