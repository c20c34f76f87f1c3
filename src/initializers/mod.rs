//! Connection initializers and the guard that scopes them
//!
//! An initializer configures a freshly opened [`Connection`] before it is
//! handed to the caller. Registries wrap each one in a [`GuardedInitializer`],
//! which pairs it with a [`MatchPredicate`] and maps its failure signals onto
//! pipeline outcomes:
//!
//! - [`InitializerError::Incomplete`]: logged, the pipeline continues and the
//!   connection is still returned
//! - [`InitializerError::Fatal`]: logged, the pipeline stops and the open
//!   request fails with [`OpenError::InitializationFailed`]
//!
//! Panics raised by initializer code are not intercepted.

mod headers;
mod https;
mod matcher;

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, warn};

use crate::handlers::{BoxError, Connection, OpenError};

pub use headers::{HeaderError, HeaderInitializer};
pub use https::{HostnameVerifierInitializer, MutualTlsInitializer, TlsSetupError, UnsupportedPolicy};
pub use matcher::{MatchPredicate, Scope};

/// Failure signals an initializer may raise
#[derive(Debug, Error)]
pub enum InitializerError {
    #[error("initialization incomplete: {message}")]
    Incomplete {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("initialization failed: {message}")]
    Fatal {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl InitializerError {
    pub fn incomplete(message: impl Into<String>) -> Self {
        InitializerError::Incomplete {
            message: message.into(),
            source: None,
        }
    }

    pub fn incomplete_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        InitializerError::Incomplete {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        InitializerError::Fatal {
            message: message.into(),
            source: None,
        }
    }

    pub fn fatal_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        InitializerError::Fatal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, InitializerError::Fatal { .. })
    }
}

/// A configuration step applied to every connection it is scoped to
pub trait ConnectionInitializer: Send + Sync {
    fn initialize(&self, connection: &mut dyn Connection) -> Result<(), InitializerError>;

    /// Name reported in logs and failures
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl<I: ConnectionInitializer + ?Sized> ConnectionInitializer for Arc<I> {
    fn initialize(&self, connection: &mut dyn Connection) -> Result<(), InitializerError> {
        (**self).initialize(connection)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Initializer backed by a closure
pub struct FnInitializer<F> {
    name: &'static str,
    f: F,
}

impl<F> FnInitializer<F>
where
    F: Fn(&mut dyn Connection) -> Result<(), InitializerError> + Send + Sync,
{
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

impl<F> ConnectionInitializer for FnInitializer<F>
where
    F: Fn(&mut dyn Connection) -> Result<(), InitializerError> + Send + Sync,
{
    fn initialize(&self, connection: &mut dyn Connection) -> Result<(), InitializerError> {
        (self.f)(connection)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// What happened when a guarded initializer met a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// Predicate did not match; initializer not invoked
    Skipped,
    Applied,
    /// Initializer signalled a partial failure; connection still usable
    Incomplete,
}

/// An initializer paired with the predicate that scopes it
pub struct GuardedInitializer {
    delegate: Box<dyn ConnectionInitializer>,
    predicate: MatchPredicate,
}

impl GuardedInitializer {
    pub fn new(delegate: impl ConnectionInitializer + 'static, predicate: MatchPredicate) -> Self {
        Self {
            delegate: Box::new(delegate),
            predicate,
        }
    }

    /// Applies to every connection
    pub fn unconditional(delegate: impl ConnectionInitializer + 'static) -> Self {
        Self::new(delegate, MatchPredicate::always())
    }

    pub fn name(&self) -> &'static str {
        self.delegate.name()
    }

    pub fn predicate(&self) -> &MatchPredicate {
        &self.predicate
    }

    /// Run the delegate if the connection is in scope
    pub fn apply(&self, connection: &mut dyn Connection) -> Result<InitOutcome, OpenError> {
        if !self.predicate.matches(connection.url()) {
            return Ok(InitOutcome::Skipped);
        }

        match self.delegate.initialize(connection) {
            Ok(()) => Ok(InitOutcome::Applied),
            Err(err @ InitializerError::Incomplete { .. }) => {
                warn!(
                    url = %connection.url(),
                    initializer = self.name(),
                    error = %err,
                    "Connection initialization was incomplete"
                );
                Ok(InitOutcome::Incomplete)
            }
            Err(err @ InitializerError::Fatal { .. }) => {
                error!(
                    url = %connection.url(),
                    initializer = self.name(),
                    error = %err,
                    "Connection initialization failed"
                );
                Err(OpenError::InitializationFailed {
                    initializer: self.name(),
                    url: connection.url().to_string(),
                    source: err,
                })
            }
        }
    }
}

impl std::fmt::Debug for GuardedInitializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedInitializer")
            .field("delegate", &self.name())
            .field("predicate", &self.predicate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{HttpHandler, ProtocolHandler};
    use url::Url;

    fn open(url: &str) -> Box<dyn Connection> {
        HttpHandler::default().open(&Url::parse(url).unwrap()).unwrap()
    }

    #[test]
    fn test_skipped_when_predicate_rejects() {
        let guarded = GuardedInitializer::new(
            FnInitializer::new(
                "panics",
                |_: &mut dyn Connection| -> Result<(), InitializerError> { panic!("must not run") },
            ),
            MatchPredicate::host("internal.example"),
        );

        let mut conn = open("http://public.example/");
        assert_eq!(guarded.apply(conn.as_mut()).unwrap(), InitOutcome::Skipped);
    }

    #[test]
    fn test_incomplete_is_absorbed() {
        let guarded =
            GuardedInitializer::unconditional(FnInitializer::new("partial", |_: &mut dyn Connection| {
                Err(InitializerError::incomplete("no key material"))
            }));

        let mut conn = open("http://public.example/");
        assert_eq!(guarded.apply(conn.as_mut()).unwrap(), InitOutcome::Incomplete);
    }

    #[test]
    fn test_fatal_becomes_open_error() {
        let strict = FnInitializer::new("strict", |_: &mut dyn Connection| {
            Err(InitializerError::fatal_with(
                "policy violated",
                std::io::Error::other("keystore unreadable"),
            ))
        });
        let guarded = GuardedInitializer::unconditional(strict);

        let mut conn = open("http://public.example/path");
        let err = guarded.apply(conn.as_mut()).unwrap_err();
        match err {
            OpenError::InitializationFailed {
                initializer,
                url,
                source,
            } => {
                assert_eq!(initializer, "strict");
                assert_eq!(url, "http://public.example/path");
                assert!(source.is_fatal());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_arc_initializer_keeps_inner_name() {
        let inner = Arc::new(FnInitializer::new("shared", |_: &mut dyn Connection| Ok(())));
        let guarded = GuardedInitializer::unconditional(inner.clone());
        assert_eq!(guarded.name(), "shared");

        let mut conn = open("http://public.example/");
        assert_eq!(guarded.apply(conn.as_mut()).unwrap(), InitOutcome::Applied);
    }
}
