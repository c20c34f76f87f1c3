use thiserror::Error;

use crate::initializers::InitializerError;
use crate::platform::PlatformError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while mutating a [`ProtocolRegistry`](super::ProtocolRegistry)
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(
        "handler '{conflicting}' cannot be registered for protocol '{protocol}', '{registered}' is already registered"
    )]
    HandlerConflict {
        protocol: String,
        registered: &'static str,
        conflicting: &'static str,
    },

    #[error("platform factory registration failed: {0}")]
    Platform(#[from] PlatformError),
}

/// Errors surfaced to the caller of a connection-open request
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("no handler available for protocol '{0}'")]
    UnknownProtocol(String),

    #[error("URL '{0}' does not name a local file")]
    NotAFilePath(String),

    #[error("unable to execute {operation} on delegate handler '{handler}' for URL '{url}'")]
    DelegateIncompatible {
        handler: &'static str,
        operation: &'static str,
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("connection initialization failed for URL '{url}' in initializer '{initializer}'")]
    InitializationFailed {
        initializer: &'static str,
        url: String,
        #[source]
        source: InitializerError,
    },

    #[error("I/O error for URL '{url}': {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid proxy '{proxy}': {reason}")]
    InvalidProxy { proxy: String, reason: String },
}

impl OpenError {
    /// True when the failure came out of the initializer pipeline
    pub fn is_initialization_failure(&self) -> bool {
        matches!(self, OpenError::InitializationFailed { .. })
    }
}

pub type Result<T> = std::result::Result<T, OpenError>;
