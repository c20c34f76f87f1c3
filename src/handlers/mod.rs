//! Protocol handler registry
//!
//! This module lets several handler registrations coexist behind the single
//! process-wide factory slot, and runs a chain of scoped initializers over
//! every connection those handlers open.
//!
//! ## Key Components
//!
//! - [`ProtocolRegistry`] - protocol → handler table plus the initializer chain
//! - [`ProtocolHandler`] - contract delegates implement to open connections
//! - [`Connection`] - an opened connection, configurable until first use
//! - [`ContextHandler`] - wraps a delegate and runs the initializer chain
//! - [`FileHandler`], [`HttpHandler`] - stock delegates
//!
//! ## Example
//!
//! ```rust,no_run
//! use protoreg::handlers::{HttpHandler, ProtocolRegistry};
//! use protoreg::initializers::{HeaderInitializer, Scope};
//!
//! let registry = ProtocolRegistry::new();
//! registry.register_handler("https", HttpHandler::default)?;
//! registry.add_initializer_when(
//!     HeaderInitializer::new().header("X-Tenant", "ops")?,
//!     Scope::builder().protocol("https").host("internal.example").build(),
//! );
//! registry.install()?;
//!
//! let conn = protoreg::platform::open_connection("https://internal.example/")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod default;
mod error;
mod file;
mod http;
mod registry;
mod slot;
mod traits;
pub(crate) mod types;

pub use default::{BUILTIN_PROTOCOLS, builtin_handler, register_builtin_handlers};
pub use error::{BoxError, OpenError, RegistryError};
pub use file::{FileConnection, FileHandler};
pub use http::{
    ClientIdentity, HostnameVerifier, HttpConnection, HttpHandler, HttpSettings, TlsSettings,
};
pub use registry::{ContextHandler, ProtocolRegistry};
pub use traits::{Connection, ProtocolHandler};
pub use types::{BoundUrl, HandlerEntry, HandlerSupplier, Proxy};
