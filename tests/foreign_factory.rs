//! A factory set by someone else blocks registry installation

use std::sync::Arc;

use protoreg::handlers::{
    Connection, HttpSettings, ProtocolHandler, ProtocolRegistry, RegistryError,
};
use protoreg::platform::{self, ConnectionFactory, PlatformError};

struct Foreign;

impl ConnectionFactory for Foreign {
    fn create_handler(&self, _protocol: &str) -> Option<Arc<dyn ProtocolHandler>> {
        None
    }
}

static FOREIGN: Foreign = Foreign;

#[test]
fn install_fails_when_platform_factory_is_taken() {
    platform::set_connection_factory(&FOREIGN).unwrap();
    assert!(platform::is_factory_set());

    let registry = ProtocolRegistry::with_builtin_handlers(HttpSettings::default());
    let result = registry.install();
    assert!(matches!(
        result,
        Err(RegistryError::Platform(PlatformError::FactoryAlreadySet))
    ));
    assert!(ProtocolRegistry::active().is_none());

    // Still refused on retry
    assert!(registry.install().is_err());

    // Lookups reach the foreign factory, which defers to the built-ins
    assert!(platform::handler_for("https").is_some());
    assert!(platform::handler_for("gopher").is_none());

    // The registry remains usable directly
    let conn = registry.open_connection("https://example.com/").unwrap();
    assert_eq!(conn.kind(), "https");
}
