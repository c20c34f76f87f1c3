use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, error};
use url::Url;

use super::default;
use super::error::{OpenError, RegistryError, Result};
use super::http::HttpSettings;
use super::slot;
use super::traits::{Connection, ProtocolHandler};
use super::types::{BoundUrl, HandlerEntry, Proxy, parse_url};
use crate::initializers::{
    ConnectionInitializer, GuardedInitializer, InitOutcome, MatchPredicate,
};
use crate::observability::{MetricsSnapshot, PipelineMetrics};

struct RegistryInner {
    handlers: RwLock<HashMap<String, Arc<HandlerEntry>>>,
    initializers: RwLock<Vec<Arc<GuardedInitializer>>>,
    metrics: PipelineMetrics,
}

/// Registry of protocol handlers and the initializers applied to their connections
///
/// Cloning is cheap and yields a handle to the same registry. Handler and
/// initializer tables are locked independently, so registering a handler
/// never waits on initializer registration and the other way around.
#[derive(Clone)]
pub struct ProtocolRegistry {
    inner: Arc<RegistryInner>,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                handlers: RwLock::new(HashMap::new()),
                initializers: RwLock::new(Vec::new()),
                metrics: PipelineMetrics::new(),
            }),
        }
    }

    /// Registry pre-populated with the stock `file`, `http` and `https` handlers
    pub fn with_builtin_handlers(settings: HttpSettings) -> Self {
        let registry = Self::new();
        for entry in default::builtin_entries(&settings) {
            registry.replace_entry(entry);
        }
        registry
    }

    /// The registry currently installed as the process-wide factory target
    pub fn active() -> Option<ProtocolRegistry> {
        slot::active_registry()
    }

    /// Make this registry the target of every platform handler lookup
    ///
    /// The first install in a process also performs the one-time platform
    /// factory registration; later installs only swap the target.
    pub fn install(&self) -> std::result::Result<(), RegistryError> {
        slot::install(self)
    }

    pub fn ptr_eq(&self, other: &ProtocolRegistry) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Register `supplier` for `protocol`, failing if one is already present
    pub fn register_handler<H, F>(
        &self,
        protocol: &str,
        supplier: F,
    ) -> std::result::Result<(), RegistryError>
    where
        H: ProtocolHandler + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        self.register_entry(HandlerEntry::new(normalize(protocol), supplier))
    }

    pub fn register_entry(&self, entry: HandlerEntry) -> std::result::Result<(), RegistryError> {
        let protocol = normalize(entry.protocol());
        let mut handlers = self.inner.handlers.write();
        match handlers.entry(protocol) {
            Entry::Occupied(existing) => Err(RegistryError::HandlerConflict {
                protocol: existing.key().clone(),
                registered: existing.get().handler_name(),
                conflicting: entry.handler_name(),
            }),
            Entry::Vacant(slot) => {
                debug!(
                    protocol = %slot.key(),
                    handler = entry.handler_name(),
                    "Protocol handler registered"
                );
                slot.insert(Arc::new(entry));
                Ok(())
            }
        }
    }

    /// Register `supplier` for `protocol`, replacing any existing handler
    pub fn replace_handler<H, F>(&self, protocol: &str, supplier: F)
    where
        H: ProtocolHandler + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        self.replace_entry(HandlerEntry::new(normalize(protocol), supplier));
    }

    pub fn replace_entry(&self, entry: HandlerEntry) {
        let protocol = normalize(entry.protocol());
        debug!(
            protocol = %protocol,
            handler = entry.handler_name(),
            "Protocol handler replaced"
        );
        self.inner.handlers.write().insert(protocol, Arc::new(entry));
    }

    pub fn remove_handler(&self, protocol: &str) {
        if self.inner.handlers.write().remove(&normalize(protocol)).is_some() {
            debug!(protocol, "Protocol handler removed");
        }
    }

    pub fn has_handler(&self, protocol: &str) -> bool {
        self.inner.handlers.read().contains_key(&normalize(protocol))
    }

    /// Type name of the delegate registered for `protocol`
    pub fn handler_name(&self, protocol: &str) -> Option<&'static str> {
        self.inner
            .handlers
            .read()
            .get(&normalize(protocol))
            .map(|entry| entry.handler_name())
    }

    /// Registered protocol names, sorted
    pub fn protocols(&self) -> Vec<String> {
        let mut protocols: Vec<String> = self.inner.handlers.read().keys().cloned().collect();
        protocols.sort();
        protocols
    }

    /// Add an initializer applied to every connection
    pub fn add_initializer(&self, initializer: impl ConnectionInitializer + 'static) {
        self.add_guarded(GuardedInitializer::unconditional(initializer));
    }

    /// Add an initializer applied to connections whose URL matches `predicate`
    ///
    /// Accepts a [`MatchPredicate`] or a [`Scope`](crate::initializers::Scope).
    pub fn add_initializer_when(
        &self,
        initializer: impl ConnectionInitializer + 'static,
        predicate: impl Into<MatchPredicate>,
    ) {
        self.add_guarded(GuardedInitializer::new(initializer, predicate.into()));
    }

    pub fn add_guarded(&self, initializer: GuardedInitializer) {
        debug!(
            initializer = initializer.name(),
            predicate = initializer.predicate().label(),
            "Connection initializer added"
        );
        self.inner.initializers.write().push(Arc::new(initializer));
    }

    pub fn initializer_count(&self) -> usize {
        self.inner.initializers.read().len()
    }

    /// Context-aware handler for `protocol`, or `None` to fall through to the
    /// platform default
    pub fn create_handler(&self, protocol: &str) -> Option<Arc<dyn ProtocolHandler>> {
        let entry = self.inner.handlers.read().get(&normalize(protocol)).cloned()?;
        Some(Arc::new(ContextHandler {
            entry,
            registry: self.clone(),
        }))
    }

    /// Run every in-scope initializer against `connection`, in insertion order
    ///
    /// Iterates over a snapshot of the initializer list; initializers added
    /// while a pass is running are picked up by the next pass.
    pub fn initialize(&self, connection: &mut dyn Connection) -> Result<()> {
        let initializers = self.inner.initializers.read().clone();
        let metrics = &self.inner.metrics;

        for initializer in &initializers {
            match initializer.apply(connection) {
                Ok(InitOutcome::Skipped) => metrics.initializer_skipped(),
                Ok(InitOutcome::Applied) => metrics.initializer_applied(),
                Ok(InitOutcome::Incomplete) => metrics.initializer_incomplete(),
                Err(err) => {
                    metrics.initializer_failed();
                    return Err(err);
                }
            }
        }

        Ok(())
    }

    /// Parse `spec` and bind it to this registry's handler for its scheme
    ///
    /// Schemes without a registered handler bind to the platform default.
    pub fn resolve_url(&self, spec: &str) -> Result<BoundUrl> {
        let url = parse_url(spec)?;
        let handler = self
            .create_handler(url.scheme())
            .or_else(|| default::builtin_handler(url.scheme()))
            .ok_or_else(|| OpenError::UnknownProtocol(url.scheme().to_string()))?;
        Ok(BoundUrl::new(url, handler))
    }

    /// Shortcut for `resolve_url(spec)?.open_connection()`
    pub fn open_connection(&self, spec: &str) -> Result<Box<dyn Connection>> {
        self.resolve_url(spec)?.open_connection()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }
}

impl Default for ProtocolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProtocolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolRegistry")
            .field("protocols", &self.protocols())
            .field("initializers", &self.initializer_count())
            .finish()
    }
}

/// Handler returned by [`ProtocolRegistry::create_handler`]
///
/// Each open call builds a fresh delegate, lets it open the connection, then
/// runs the registry's initializer pipeline before returning it.
pub struct ContextHandler {
    entry: Arc<HandlerEntry>,
    registry: ProtocolRegistry,
}

impl ContextHandler {
    fn finish(
        &self,
        url: &Url,
        opened: Result<Box<dyn Connection>>,
    ) -> Result<Box<dyn Connection>> {
        let mut connection = opened.inspect_err(|err| {
            if matches!(err, OpenError::DelegateIncompatible { .. }) {
                error!(
                    url = %url,
                    handler = self.entry.handler_name(),
                    error = %err,
                    "Delegate handler cannot open connection"
                );
            }
        })?;

        self.registry.initialize(connection.as_mut())?;
        self.registry.inner.metrics.connection_opened();
        Ok(connection)
    }
}

impl ProtocolHandler for ContextHandler {
    fn open(&self, url: &Url) -> Result<Box<dyn Connection>> {
        let delegate = self.entry.instantiate();
        self.finish(url, delegate.open(url))
    }

    fn open_with_proxy(&self, url: &Url, proxy: &Proxy) -> Result<Box<dyn Connection>> {
        let delegate = self.entry.instantiate();
        self.finish(url, delegate.open_with_proxy(url, proxy))
    }

    fn name(&self) -> &'static str {
        self.entry.handler_name()
    }
}

fn normalize(protocol: &str) -> String {
    protocol.to_ascii_lowercase()
}
