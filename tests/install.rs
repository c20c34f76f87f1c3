//! Installing registries through the process-wide factory slot
//!
//! The platform factory can only be set once per process, so this binary holds
//! a single test that walks the whole lifecycle in order.

use std::sync::Arc;

use protoreg::handlers::{
    Connection, HttpConnection, HttpHandler, OpenError, ProtocolHandler, ProtocolRegistry,
};
use protoreg::initializers::HeaderInitializer;
use protoreg::platform::{self, ConnectionFactory, PlatformError};

struct Foreign;

impl ConnectionFactory for Foreign {
    fn create_handler(&self, _protocol: &str) -> Option<Arc<dyn ProtocolHandler>> {
        None
    }
}

static FOREIGN: Foreign = Foreign;

fn tagged_registry(tag: &str) -> ProtocolRegistry {
    let registry = ProtocolRegistry::new();
    registry.register_handler("http", HttpHandler::default).unwrap();
    registry.add_initializer(HeaderInitializer::new().header("X-Registry", tag).unwrap());
    registry
}

fn registry_tag(conn: &dyn Connection) -> Option<String> {
    conn.downcast_ref::<HttpConnection>()
        .unwrap()
        .headers()
        .get("X-Registry")
        .map(|value| value.to_str().unwrap().to_string())
}

#[test]
fn install_registers_once_and_swaps_target() {
    // Platform defaults before anything is installed
    assert!(!platform::is_factory_set());
    assert!(ProtocolRegistry::active().is_none());

    let conn = platform::open_connection("http://example.com/").unwrap();
    assert_eq!(registry_tag(conn.as_ref()), None);
    assert!(matches!(
        platform::open_connection("custom://example.com/"),
        Err(OpenError::UnknownProtocol(protocol)) if protocol == "custom"
    ));

    let first = tagged_registry("first");
    first.install().unwrap();
    assert!(platform::is_factory_set());

    let conn = platform::open_connection("http://example.com/").unwrap();
    assert_eq!(registry_tag(conn.as_ref()).as_deref(), Some("first"));

    let second = tagged_registry("second");
    second.install().unwrap();
    assert!(ProtocolRegistry::active().unwrap().ptr_eq(&second));

    let conn = platform::open_connection("HTTP://example.com/").unwrap();
    assert_eq!(registry_tag(conn.as_ref()).as_deref(), Some("second"));
    assert_eq!(first.metrics().connections_opened, 1);
    assert_eq!(second.metrics().connections_opened, 1);

    // Protocols the active registry does not claim fall through to the platform
    let bound = platform::url("file:///etc/hosts").unwrap();
    assert!(bound.handler_name().ends_with("FileHandler"));

    // Re-installing the same registry is allowed
    second.install().unwrap();

    // The platform slot itself is now taken
    assert!(matches!(
        platform::set_connection_factory(&FOREIGN),
        Err(PlatformError::FactoryAlreadySet)
    ));
}
