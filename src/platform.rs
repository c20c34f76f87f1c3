//! Process-global connection factory hook
//!
//! Stands in for the runtime's own URL-opening machinery: a single factory may
//! be set for the life of the process, and every URL opened through
//! [`url`] or [`open_connection`] asks that factory for a handler first,
//! falling back to the built-in `file`/`http`/`https` handlers.

use std::sync::{Arc, OnceLock};

use thiserror::Error;
use tracing::trace;

use crate::handlers::{BoundUrl, Connection, OpenError, ProtocolHandler, builtin_handler};
use crate::handlers::types::parse_url;

static FACTORY: OnceLock<&'static dyn ConnectionFactory> = OnceLock::new();

/// Source of protocol handlers consulted on every URL resolution
pub trait ConnectionFactory: Send + Sync {
    /// Handler for `protocol`, or `None` to use the platform default
    fn create_handler(&self, protocol: &str) -> Option<Arc<dyn ProtocolHandler>>;
}

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("a connection factory has already been set for this process")]
    FactoryAlreadySet,
}

/// Set the process-wide factory; succeeds at most once
pub fn set_connection_factory(factory: &'static dyn ConnectionFactory) -> Result<(), PlatformError> {
    FACTORY
        .set(factory)
        .map_err(|_| PlatformError::FactoryAlreadySet)
}

pub fn is_factory_set() -> bool {
    FACTORY.get().is_some()
}

/// Handler the platform would use for `protocol`
pub fn handler_for(protocol: &str) -> Option<Arc<dyn ProtocolHandler>> {
    let protocol = protocol.to_ascii_lowercase();
    FACTORY
        .get()
        .and_then(|factory| factory.create_handler(&protocol))
        .or_else(|| {
            trace!(protocol = %protocol, "Falling back to built-in handler");
            builtin_handler(&protocol)
        })
}

/// Parse `spec` and bind it to the platform's handler for its scheme
pub fn url(spec: &str) -> Result<BoundUrl, OpenError> {
    let url = parse_url(spec)?;
    let handler = handler_for(url.scheme())
        .ok_or_else(|| OpenError::UnknownProtocol(url.scheme().to_string()))?;
    Ok(BoundUrl::new(url, handler))
}

pub fn open_connection(spec: &str) -> Result<Box<dyn Connection>, OpenError> {
    url(spec)?.open_connection()
}
