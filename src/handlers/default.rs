use std::sync::Arc;

use super::error::RegistryError;
use super::file::FileHandler;
use super::http::{HttpHandler, HttpSettings};
use super::registry::ProtocolRegistry;
use super::traits::ProtocolHandler;
use super::types::HandlerEntry;

/// Protocols served by the stock handlers
pub const BUILTIN_PROTOCOLS: [&str; 3] = ["file", "http", "https"];

pub(crate) fn builtin_entries(settings: &HttpSettings) -> [HandlerEntry; 3] {
    let http = settings.clone();
    let https = settings.clone();
    [
        HandlerEntry::new("file", || FileHandler),
        HandlerEntry::new("http", move || HttpHandler::new(http.clone())),
        HandlerEntry::new("https", move || HttpHandler::new(https.clone())),
    ]
}

/// Register the stock `file`, `http` and `https` handlers
///
/// Stops at the first protocol that already has a handler.
pub fn register_builtin_handlers(
    registry: &ProtocolRegistry,
    settings: &HttpSettings,
) -> Result<(), RegistryError> {
    for entry in builtin_entries(settings) {
        registry.register_entry(entry)?;
    }
    Ok(())
}

/// Platform default handler for `protocol`, used when no registry claims it
pub fn builtin_handler(protocol: &str) -> Option<Arc<dyn ProtocolHandler>> {
    match protocol.to_ascii_lowercase().as_str() {
        "file" => Some(Arc::new(FileHandler)),
        "http" | "https" => Some(Arc::new(HttpHandler::default())),
        _ => None,
    }
}
