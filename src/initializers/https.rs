use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::{ConnectionInitializer, InitializerError};
use crate::handlers::{ClientIdentity, Connection, HostnameVerifier, HttpConnection};

#[derive(Debug, Error)]
pub enum TlsSetupError {
    #[error("failed to read TLS material from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What a TLS initializer does with a connection that has no TLS settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnsupportedPolicy {
    /// Log a warning and leave the connection alone
    #[default]
    Skip,
    Incomplete,
    Fatal,
}

impl UnsupportedPolicy {
    pub(crate) fn apply(self, initializer: &str, connection: &dyn Connection) -> Result<(), InitializerError> {
        let message = format!(
            "{initializer} cannot configure a '{}' connection for {}",
            connection.kind(),
            connection.url()
        );
        match self {
            UnsupportedPolicy::Skip => {
                warn!(
                    url = %connection.url(),
                    kind = connection.kind(),
                    "Unable to configure TLS on connection, the registry may be misconfigured"
                );
                Ok(())
            }
            UnsupportedPolicy::Incomplete => Err(InitializerError::incomplete(message)),
            UnsupportedPolicy::Fatal => Err(InitializerError::fatal(message)),
        }
    }
}

fn read(path: &Path) -> Result<Vec<u8>, TlsSetupError> {
    fs::read(path).map_err(|source| TlsSetupError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Installs a client identity for mutually authenticated TLS
///
/// Also enables the cookie store on HTTP connections so session cookies set
/// after the handshake survive redirects.
#[derive(Debug, Clone)]
pub struct MutualTlsInitializer {
    identity: ClientIdentity,
    root_certificates: Vec<Vec<u8>>,
    cookie_store: bool,
    on_unsupported: UnsupportedPolicy,
}

impl MutualTlsInitializer {
    pub fn new(identity: ClientIdentity) -> Self {
        Self {
            identity,
            root_certificates: Vec::new(),
            cookie_store: true,
            on_unsupported: UnsupportedPolicy::default(),
        }
    }

    pub fn from_pem_files(certificate: &Path, key: &Path) -> Result<Self, TlsSetupError> {
        Ok(Self::new(ClientIdentity::Pem {
            certificate: read(certificate)?,
            key: read(key)?,
        }))
    }

    pub fn from_pkcs12_file(path: &Path, password: impl Into<String>) -> Result<Self, TlsSetupError> {
        Ok(Self::new(ClientIdentity::Pkcs12 {
            der: read(path)?,
            password: password.into(),
        }))
    }

    pub fn with_root_certificate(mut self, pem: Vec<u8>) -> Self {
        self.root_certificates.push(pem);
        self
    }

    pub fn with_root_certificate_file(self, path: &Path) -> Result<Self, TlsSetupError> {
        Ok(self.with_root_certificate(read(path)?))
    }

    pub fn with_cookie_store(mut self, enabled: bool) -> Self {
        self.cookie_store = enabled;
        self
    }

    pub fn on_unsupported(mut self, policy: UnsupportedPolicy) -> Self {
        self.on_unsupported = policy;
        self
    }
}

impl ConnectionInitializer for MutualTlsInitializer {
    fn initialize(&self, connection: &mut dyn Connection) -> Result<(), InitializerError> {
        let Some(tls) = connection.tls_mut() else {
            return self.on_unsupported.apply(self.name(), connection);
        };

        tls.set_identity(self.identity.clone());
        for pem in &self.root_certificates {
            tls.add_root_certificate(pem.clone());
        }

        if self.cookie_store {
            if let Some(http) = connection.downcast_mut::<HttpConnection>() {
                http.set_cookie_store(true);
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "MutualTlsInitializer"
    }
}

/// Installs a hostname-mismatch policy on TLS connections
///
/// Non-TLS connections are left untouched.
#[derive(Clone)]
pub struct HostnameVerifierInitializer {
    verifier: HostnameVerifier,
}

impl HostnameVerifierInitializer {
    pub fn new<F>(verifier: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            verifier: Arc::new(verifier),
        }
    }

    /// Tolerate certificate name mismatches for exactly these hosts
    pub fn accept_hosts<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let hosts: Vec<String> = hosts.into_iter().map(Into::into).collect();
        Self::new(move |host| hosts.iter().any(|h| h.eq_ignore_ascii_case(host)))
    }
}

impl ConnectionInitializer for HostnameVerifierInitializer {
    fn initialize(&self, connection: &mut dyn Connection) -> Result<(), InitializerError> {
        if let Some(tls) = connection.tls_mut() {
            tls.set_hostname_verifier(self.verifier.clone());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "HostnameVerifierInitializer"
    }
}

impl std::fmt::Debug for HostnameVerifierInitializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostnameVerifierInitializer").finish_non_exhaustive()
    }
}
