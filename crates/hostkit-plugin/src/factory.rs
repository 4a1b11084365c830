//! Type-erased plugin constructors and the process-wide registration list.
//!
//! Plugin crates call [`register`] once (typically from `main`) so that
//! every orchestrator created afterwards knows about them without central
//! coordination.

use std::any::TypeId;
use std::fmt;

use parking_lot::{Mutex, const_mutex};
use tracing::debug;

use crate::registry::{Plugin, short_type_name};

/// Builds fresh instances of one plugin type.
#[derive(Clone, Copy)]
pub struct PluginFactory {
    type_id: TypeId,
    name: &'static str,
    create: fn() -> Box<dyn Plugin>,
}

impl PluginFactory {
    /// Factory for `P`, built with `P::default()`.
    pub fn of<P: Plugin + Default>() -> Self {
        Self {
            type_id: TypeId::of::<P>(),
            name: short_type_name(std::any::type_name::<P>()),
            create: create_default::<P>,
        }
    }

    /// Concrete type produced by this factory.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Type name of the plugin, used in diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Creates a new instance.
    pub fn create(&self) -> Box<dyn Plugin> {
        (self.create)()
    }
}

fn create_default<P: Plugin + Default>() -> Box<dyn Plugin> {
    Box::new(P::default())
}

impl fmt::Debug for PluginFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginFactory").field("name", &self.name).finish()
    }
}

static REGISTRATIONS: Mutex<Vec<PluginFactory>> = const_mutex(Vec::new());

/// Adds `P` to the process-wide registration list. Idempotent.
pub fn register<P: Plugin + Default>() {
    let factory = PluginFactory::of::<P>();
    let mut list = REGISTRATIONS.lock();
    if list.iter().all(|f| f.type_id != factory.type_id) {
        debug!(plugin = %factory.name, "Plugin registered process-wide");
        list.push(factory);
    }
}

/// Snapshot of the process-wide registration list.
pub fn registrations() -> Vec<PluginFactory> {
    REGISTRATIONS.lock().clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Probe;
    impl Plugin for Probe {}

    #[test]
    fn test_register_is_idempotent() {
        register::<Probe>();
        register::<Probe>();
        let count = registrations()
            .iter()
            .filter(|f| f.type_id() == TypeId::of::<Probe>())
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_factory_creates_fresh_instances() {
        let factory = PluginFactory::of::<Probe>();
        assert_eq!(factory.name(), "Probe");
        let plugin = factory.create();
        assert_eq!(plugin.name(), "Probe");
    }
}
