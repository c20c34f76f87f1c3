//! HTTP(S) delegate handler and its connection type

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Certificate, Client, Identity};
use tracing::debug;
use url::Url;

use super::error::{OpenError, Result};
use super::traits::{Connection, ProtocolHandler};
use super::types::Proxy;

/// Decides whether a certificate whose name does not match `host` is accepted
pub type HostnameVerifier = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Defaults applied to every connection an [`HttpHandler`] opens
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            user_agent: format!("protoreg/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Client key material presented during the TLS handshake
#[derive(Clone)]
pub enum ClientIdentity {
    /// PEM certificate chain plus PKCS#8 PEM private key
    Pem { certificate: Vec<u8>, key: Vec<u8> },
    /// DER-encoded PKCS#12 archive
    Pkcs12 { der: Vec<u8>, password: String },
}

impl ClientIdentity {
    pub fn format(&self) -> &'static str {
        match self {
            ClientIdentity::Pem { .. } => "pem",
            ClientIdentity::Pkcs12 { .. } => "pkcs12",
        }
    }

    pub fn to_reqwest(&self) -> reqwest::Result<Identity> {
        match self {
            ClientIdentity::Pem { certificate, key } => Identity::from_pkcs8_pem(certificate, key),
            ClientIdentity::Pkcs12 { der, password } => Identity::from_pkcs12_der(der, password),
        }
    }
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("format", &self.format())
            .finish_non_exhaustive()
    }
}

/// TLS configuration carried by secured connections
#[derive(Clone, Default)]
pub struct TlsSettings {
    identity: Option<ClientIdentity>,
    root_certificates: Vec<Vec<u8>>,
    hostname_verifier: Option<HostnameVerifier>,
}

impl TlsSettings {
    pub fn identity(&self) -> Option<&ClientIdentity> {
        self.identity.as_ref()
    }

    pub fn set_identity(&mut self, identity: ClientIdentity) {
        self.identity = Some(identity);
    }

    /// Extra PEM root certificates trusted in addition to the system store
    pub fn root_certificates(&self) -> &[Vec<u8>] {
        &self.root_certificates
    }

    pub fn add_root_certificate(&mut self, pem: Vec<u8>) {
        self.root_certificates.push(pem);
    }

    pub fn has_hostname_verifier(&self) -> bool {
        self.hostname_verifier.is_some()
    }

    pub fn set_hostname_verifier(&mut self, verifier: HostnameVerifier) {
        self.hostname_verifier = Some(verifier);
    }

    /// Whether a hostname mismatch for `host` should be tolerated
    pub fn accepts_mismatched_hostname(&self, host: &str) -> bool {
        self.hostname_verifier
            .as_ref()
            .is_some_and(|verify| verify(host))
    }
}

impl fmt::Debug for TlsSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsSettings")
            .field("identity", &self.identity)
            .field("root_certificates", &self.root_certificates.len())
            .field("hostname_verifier", &self.hostname_verifier.is_some())
            .finish()
    }
}

/// An unsent HTTP(S) request description
///
/// Nothing touches the network until [`send`](HttpConnection::send) is called,
/// so initializers are free to rewrite any of the settings below.
#[derive(Debug, Clone)]
pub struct HttpConnection {
    url: Url,
    proxy: Proxy,
    headers: HeaderMap,
    connect_timeout: Duration,
    request_timeout: Duration,
    user_agent: String,
    cookie_store: bool,
    tls: Option<TlsSettings>,
}

impl HttpConnection {
    pub fn new(url: Url, proxy: Proxy, settings: &HttpSettings) -> Self {
        let tls = (url.scheme() == "https").then(TlsSettings::default);
        Self {
            url,
            proxy,
            headers: HeaderMap::new(),
            connect_timeout: settings.connect_timeout,
            request_timeout: settings.request_timeout,
            user_agent: settings.user_agent.clone(),
            cookie_store: false,
            tls,
        }
    }

    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn set_connect_timeout(&mut self, timeout: Duration) {
        self.connect_timeout = timeout;
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn set_request_timeout(&mut self, timeout: Duration) {
        self.request_timeout = timeout;
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn set_user_agent(&mut self, user_agent: impl Into<String>) {
        self.user_agent = user_agent.into();
    }

    pub fn cookie_store(&self) -> bool {
        self.cookie_store
    }

    pub fn set_cookie_store(&mut self, enabled: bool) {
        self.cookie_store = enabled;
    }

    pub fn is_secure(&self) -> bool {
        self.tls.is_some()
    }

    pub fn tls(&self) -> Option<&TlsSettings> {
        self.tls.as_ref()
    }

    /// Build a client reflecting the current settings
    pub fn build_client(&self) -> Result<Client> {
        let mut builder = Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .user_agent(&self.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .cookie_store(self.cookie_store);

        builder = match &self.proxy {
            Proxy::Direct => builder.no_proxy(),
            Proxy::Http(url) => {
                let proxy = reqwest::Proxy::all(url.as_str()).map_err(|e| {
                    OpenError::InvalidProxy {
                        proxy: url.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                builder.proxy(proxy)
            }
        };

        if let Some(tls) = &self.tls {
            if let Some(identity) = &tls.identity {
                builder = builder.identity(identity.to_reqwest()?);
            }
            for pem in &tls.root_certificates {
                builder = builder.add_root_certificate(Certificate::from_pem(pem)?);
            }
            let host = self.url.host_str().unwrap_or_default();
            if tls.accepts_mismatched_hostname(host) {
                builder = builder.danger_accept_invalid_hostnames(true);
            }
        }

        Ok(builder.build()?)
    }

    /// Issue a GET request with the configured settings
    pub async fn send(&self) -> Result<reqwest::Response> {
        let client = self.build_client()?;
        debug!(url = %self.url, proxy = %self.proxy, "Sending request");

        let response = client
            .get(self.url.clone())
            .headers(self.headers.clone())
            .send()
            .await?;

        debug!(url = %self.url, status = %response.status(), "Response received");
        Ok(response)
    }
}

impl Connection for HttpConnection {
    fn url(&self) -> &Url {
        &self.url
    }

    fn kind(&self) -> &'static str {
        if self.is_secure() { "https" } else { "http" }
    }

    fn headers_mut(&mut self) -> Option<&mut HeaderMap> {
        Some(&mut self.headers)
    }

    fn tls_mut(&mut self) -> Option<&mut TlsSettings> {
        self.tls.as_mut()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Stock handler for `http` and `https`
#[derive(Debug, Clone, Default)]
pub struct HttpHandler {
    settings: HttpSettings,
}

impl HttpHandler {
    pub fn new(settings: HttpSettings) -> Self {
        Self { settings }
    }
}

impl ProtocolHandler for HttpHandler {
    fn open(&self, url: &Url) -> Result<Box<dyn Connection>> {
        self.open_with_proxy(url, &Proxy::Direct)
    }

    fn open_with_proxy(&self, url: &Url, proxy: &Proxy) -> Result<Box<dyn Connection>> {
        Ok(Box::new(HttpConnection::new(
            url.clone(),
            proxy.clone(),
            &self.settings,
        )))
    }
}
