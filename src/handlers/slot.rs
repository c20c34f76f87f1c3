//! Process-wide forwarding target for the platform connection factory
//!
//! The platform accepts a factory once per process. The slot is that factory:
//! it is registered on the first [`install`] and from then on forwards every
//! lookup to whichever registry was installed most recently.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::{Mutex, const_mutex};
use tracing::info;

use super::error::RegistryError;
use super::registry::ProtocolRegistry;
use super::traits::ProtocolHandler;
use crate::platform::{self, ConnectionFactory};

struct FactorySlot {
    active: ArcSwapOption<ProtocolRegistry>,
    registered: Mutex<bool>,
}

static SLOT: FactorySlot = FactorySlot {
    active: ArcSwapOption::const_empty(),
    registered: const_mutex(false),
};

impl ConnectionFactory for FactorySlot {
    fn create_handler(&self, protocol: &str) -> Option<Arc<dyn ProtocolHandler>> {
        let active = self.active.load_full()?;
        active.create_handler(protocol)
    }
}

/// Point the slot at `registry`, registering the slot with the platform first
/// if this is the first install in the process
pub(crate) fn install(registry: &ProtocolRegistry) -> Result<(), RegistryError> {
    let mut registered = SLOT.registered.lock();
    let first = !*registered;
    if first {
        platform::set_connection_factory(&SLOT)?;
        *registered = true;
    }

    SLOT.active.store(Some(Arc::new(registry.clone())));
    info!(
        first_install = first,
        protocols = ?registry.protocols(),
        "Protocol registry installed"
    );
    Ok(())
}

pub(crate) fn active_registry() -> Option<ProtocolRegistry> {
    SLOT.active.load_full().map(|registry| (*registry).clone())
}
