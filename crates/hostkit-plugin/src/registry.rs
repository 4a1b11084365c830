//! Plugin registry: stores plugin instances of one orchestrator.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use tracing::{debug, info, warn};

use hostkit_core::error::AppError;
use hostkit_core::options::{Options, OptionsSchema};
use hostkit_core::result::AppResult;

use crate::api::context::PluginContext;
use crate::dependencies::{Dependencies, DependencyRef};
use crate::factory::PluginFactory;
use crate::state::{PluginSlot, PluginState};

/// Upcast helper so trait objects can be downcast to their concrete type.
pub trait AsAny: Any {
    /// `self` as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
    /// `self` as `&mut dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Returns the last path segment of a type name, without generics.
pub fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Trait that all plugins must implement.
///
/// Every hook runs on the run-loop thread, one at a time. Hooks that are
/// not overridden do nothing.
pub trait Plugin: AsAny + Send + fmt::Debug {
    /// Stable identity. Defaults to the type name.
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Declares the options this plugin understands.
    fn declare_options(&self, _schema: &mut OptionsSchema) {}

    /// Reports direct dependencies, one `require` call each.
    fn requires(&self, _deps: &mut Dependencies) {}

    /// Called once, after every dependency has been initialized.
    fn initialize(&mut self, _ctx: &PluginContext, _options: &Options) -> AppResult<()> {
        Ok(())
    }

    /// Called once, after every dependency has started.
    fn startup(&mut self, _ctx: &PluginContext) -> AppResult<()> {
        Ok(())
    }

    /// Called once during tear-down, before any dependency is shut down.
    fn shutdown(&mut self, _ctx: &PluginContext) -> AppResult<()> {
        Ok(())
    }

    /// Called on SIGHUP for every initialized plugin.
    fn handle_sighup(&mut self, _ctx: &PluginContext) -> AppResult<()> {
        Ok(())
    }
}

/// Registry of the plugin instances owned by one orchestrator.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    /// Slots in registration order.
    slots: Vec<PluginSlot>,
    /// Plugin name → slot index.
    by_name: HashMap<String, usize>,
}

impl PluginRegistry {
    /// Creates a new empty plugin registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the plugin built by `factory`, plus its typed dependencies.
    ///
    /// Returns `false` if a plugin of that type or name already exists.
    /// Typed lookups resolve to the first instance of a type.
    pub fn register(&mut self, factory: &PluginFactory) -> bool {
        if self.index_of_type(factory.type_id()).is_some() {
            return false;
        }
        self.register_instance(factory.create())
    }

    /// Registers an already constructed plugin, plus its typed dependencies.
    ///
    /// Identity is the plugin name: several instances of one type may be
    /// registered under distinct names. Returns `false` if the name is taken.
    pub fn register_instance(&mut self, plugin: Box<dyn Plugin>) -> bool {
        let slot = PluginSlot::new(plugin);
        if let Some(existing) = self.by_name.get(slot.name()) {
            if self.slots[*existing].type_id() != slot.type_id() {
                warn!(plugin = %slot.name(), "Another plugin type is already registered under this name");
            }
            return false;
        }

        let mut deps = Dependencies::new();
        slot.plugin().requires(&mut deps);

        info!(plugin = %slot.name(), "Registering plugin");
        self.by_name.insert(slot.name().to_string(), self.slots.len());
        self.slots.push(slot);

        for dep in deps.iter() {
            if let DependencyRef::Typed(factory) = dep {
                if self.register(factory) {
                    debug!(dependency = %factory.name(), "Registered plugin dependency");
                }
            }
        }
        true
    }

    /// Index of the plugin called `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Index of the plugin whose concrete type is `type_id`.
    pub fn index_of_type(&self, type_id: TypeId) -> Option<usize> {
        self.slots.iter().position(|s| s.type_id() == type_id)
    }

    /// Index of the plugin called `name`, or a `NotFound` error.
    pub fn resolve(&self, name: &str) -> AppResult<usize> {
        self.index_of(name)
            .ok_or_else(|| AppError::not_found(format!("Unable to find plugin '{name}'")))
    }

    /// Resolves the direct dependencies of the plugin at `index`.
    pub fn dependencies(&self, index: usize) -> AppResult<Vec<usize>> {
        let slot = &self.slots[index];
        let mut deps = Dependencies::new();
        slot.plugin().requires(&mut deps);
        deps.iter()
            .map(|dep| {
                let found = match dep {
                    DependencyRef::Typed(factory) => self.index_of_type(factory.type_id()),
                    DependencyRef::Named(name) => self.index_of(name),
                };
                found.ok_or_else(|| {
                    AppError::not_found(format!(
                        "Plugin '{}' requires '{}', which is not registered",
                        slot.name(),
                        dep.name()
                    ))
                })
            })
            .collect()
    }

    /// The slot at `index`.
    pub fn slot(&self, index: usize) -> &PluginSlot {
        &self.slots[index]
    }

    /// The slot at `index`, mutably.
    pub fn slot_mut(&mut self, index: usize) -> &mut PluginSlot {
        &mut self.slots[index]
    }

    /// Every slot, in registration order.
    pub fn slots(&self) -> &[PluginSlot] {
        &self.slots
    }

    /// State of the plugin called `name`.
    pub fn state_of(&self, name: &str) -> Option<PluginState> {
        self.index_of(name).map(|i| self.slots[i].state())
    }

    /// The plugin of concrete type `P`.
    pub fn find<P: Plugin>(&self) -> Option<&P> {
        self.slots
            .iter()
            .find_map(|s| s.plugin().as_any().downcast_ref::<P>())
    }

    /// The plugin of concrete type `P`, mutably.
    pub fn find_mut<P: Plugin>(&mut self) -> Option<&mut P> {
        self.slots
            .iter_mut()
            .find_map(|s| s.plugin_mut().as_any_mut().downcast_mut::<P>())
    }

    /// Collects option declarations from every plugin, attributed to it.
    pub fn declare_options(&self, schema: &mut OptionsSchema) {
        for slot in &self.slots {
            schema.set_owner(Some(slot.name()));
            slot.plugin().declare_options(schema);
        }
        schema.set_owner(None);
    }

    /// Number of registered plugins.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns whether no plugin is registered.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drops every plugin instance.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.by_name.clear();
    }
}
