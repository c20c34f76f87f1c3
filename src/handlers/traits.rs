use std::any::Any;
use std::fmt;

use reqwest::header::HeaderMap;
use url::Url;

use super::error::{OpenError, Result};
use super::http::TlsSettings;
use super::types::Proxy;

/// An opened, not yet used connection
///
/// Connections are owned by whoever asked for them. Initializers only get a
/// mutable borrow between creation and hand-off, and use the capability
/// accessors below to decide whether they have anything to configure.
pub trait Connection: Any + Send + fmt::Debug {
    /// Target of this connection
    fn url(&self) -> &Url;

    /// Short label for logs and summaries ("file", "http", ...)
    fn kind(&self) -> &'static str;

    /// Request headers, when the connection carries any
    fn headers_mut(&mut self) -> Option<&mut HeaderMap> {
        None
    }

    /// TLS settings, when the connection is secured
    fn tls_mut(&mut self) -> Option<&mut TlsSettings> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<'a> dyn Connection + 'a {
    /// Downcast to a concrete connection type
    pub fn downcast_ref<T: Connection>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Downcast to a concrete connection type, mutably
    pub fn downcast_mut<T: Connection>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Delegate handler that knows how to open connections for one protocol
///
/// Implementations provide [`open`](ProtocolHandler::open). Handlers that can
/// route through a proxy also override
/// [`open_with_proxy`](ProtocolHandler::open_with_proxy); the default rejects
/// the call with [`OpenError::DelegateIncompatible`].
pub trait ProtocolHandler: Send + Sync {
    /// Open a connection to `url`
    fn open(&self, url: &Url) -> Result<Box<dyn Connection>>;

    /// Open a connection to `url` through `proxy`
    fn open_with_proxy(&self, url: &Url, proxy: &Proxy) -> Result<Box<dyn Connection>> {
        Err(OpenError::DelegateIncompatible {
            handler: self.name(),
            operation: "open_with_proxy",
            url: url.to_string(),
            source: format!("handler does not support proxy '{proxy}'").into(),
        })
    }

    /// Name used in conflict reports and logs
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
