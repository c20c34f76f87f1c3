use std::fmt;
use std::sync::Arc;

use url::Url;

use super::error::{OpenError, Result};
use super::traits::{Connection, ProtocolHandler};

/// Factory producing a fresh delegate handler per open call
pub type HandlerSupplier = Arc<dyn Fn() -> Box<dyn ProtocolHandler> + Send + Sync>;

/// Route a connection takes to its target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Proxy {
    Direct,
    Http(Url),
}

impl Proxy {
    /// Parse `direct` or an `http://`/`https://` proxy URL
    pub fn parse(value: &str) -> Result<Self> {
        if value.eq_ignore_ascii_case("direct") {
            return Ok(Proxy::Direct);
        }

        let url = parse_url(value)?;
        match url.scheme() {
            "http" | "https" => Ok(Proxy::Http(url)),
            other => Err(OpenError::InvalidProxy {
                proxy: value.to_string(),
                reason: format!("unsupported proxy scheme '{other}'"),
            }),
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, Proxy::Direct)
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Proxy::Direct => f.write_str("DIRECT"),
            Proxy::Http(url) => write!(f, "HTTP @ {url}"),
        }
    }
}

/// Binding of a protocol name to the supplier of its delegate handler
pub struct HandlerEntry {
    protocol: String,
    handler_name: &'static str,
    supplier: HandlerSupplier,
}

impl HandlerEntry {
    pub fn new<H, F>(protocol: impl Into<String>, supplier: F) -> Self
    where
        H: ProtocolHandler + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        Self {
            protocol: protocol.into(),
            handler_name: std::any::type_name::<H>(),
            supplier: Arc::new(move || Box::new(supplier()) as Box<dyn ProtocolHandler>),
        }
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Type name of the handlers this entry supplies
    pub fn handler_name(&self) -> &'static str {
        self.handler_name
    }

    /// Build a new delegate instance
    pub fn instantiate(&self) -> Box<dyn ProtocolHandler> {
        (self.supplier)()
    }
}

impl fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("protocol", &self.protocol)
            .field("handler", &self.handler_name)
            .finish()
    }
}

/// A parsed URL bound to the handler that will open it
#[derive(Clone)]
pub struct BoundUrl {
    url: Url,
    handler: Arc<dyn ProtocolHandler>,
}

impl BoundUrl {
    pub fn new(url: Url, handler: Arc<dyn ProtocolHandler>) -> Self {
        Self { url, handler }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn handler_name(&self) -> &'static str {
        self.handler.name()
    }

    pub fn open_connection(&self) -> Result<Box<dyn Connection>> {
        self.handler.open(&self.url)
    }

    pub fn open_connection_with_proxy(&self, proxy: &Proxy) -> Result<Box<dyn Connection>> {
        self.handler.open_with_proxy(&self.url, proxy)
    }
}

impl fmt::Debug for BoundUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundUrl")
            .field("url", &self.url.as_str())
            .field("handler", &self.handler.name())
            .finish()
    }
}

impl fmt::Display for BoundUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

pub(crate) fn parse_url(spec: &str) -> Result<Url> {
    Url::parse(spec).map_err(|source| OpenError::InvalidUrl {
        url: spec.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_parse_direct() {
        assert_eq!(Proxy::parse("DIRECT").unwrap(), Proxy::Direct);
        assert!(Proxy::parse("direct").unwrap().is_direct());
    }

    #[test]
    fn test_proxy_parse_http() {
        let proxy = Proxy::parse("http://proxy.internal:3128").unwrap();
        assert!(matches!(proxy, Proxy::Http(ref url) if url.port() == Some(3128)));
        assert_eq!(proxy.to_string(), "HTTP @ http://proxy.internal:3128/");
    }

    #[test]
    fn test_proxy_parse_rejects_other_schemes() {
        let result = Proxy::parse("ftp://proxy.internal");
        assert!(matches!(result, Err(OpenError::InvalidProxy { .. })));

        let result = Proxy::parse("not a url");
        assert!(matches!(result, Err(OpenError::InvalidUrl { .. })));
    }
}
