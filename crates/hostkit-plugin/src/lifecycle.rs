//! Dependency-first bring-up and reverse-order tear-down.
//!
//! A plugin is marked with its next state *before* its dependencies are
//! visited, so every transition happens at most once per plugin even when
//! several plugins share a dependency. `initialized` and `running` record
//! the order in which plugins actually completed (or, for startup, entered)
//! their hook; tear-down walks `running` backwards.

use tracing::{error, info, warn};

use hostkit_core::error::AppError;
use hostkit_core::options::Options;
use hostkit_core::result::AppResult;

use crate::api::context::PluginContext;
use crate::registry::PluginRegistry;
use crate::state::PluginState;

/// Plugin registry plus realized bring-up orders.
#[derive(Debug, Default)]
pub struct Lifecycle {
    registry: PluginRegistry,
    initialized: Vec<usize>,
    running: Vec<usize>,
}

impl Lifecycle {
    /// Creates an empty lifecycle.
    pub fn new() -> Self {
        Self::default()
    }

    /// The plugin registry.
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// The plugin registry, mutably.
    pub fn registry_mut(&mut self) -> &mut PluginRegistry {
        &mut self.registry
    }

    /// Plugins in the order they finished initializing.
    pub fn initialized_names(&self) -> Vec<String> {
        self.names(&self.initialized)
    }

    /// Plugins in the order they started.
    pub fn running_names(&self) -> Vec<String> {
        self.names(&self.running)
    }

    /// Whether any plugin has entered startup and not been torn down.
    pub fn has_running(&self) -> bool {
        !self.running.is_empty()
    }

    fn names(&self, order: &[usize]) -> Vec<String> {
        order
            .iter()
            .map(|i| self.registry.slot(*i).name().to_string())
            .collect()
    }

    /// Initializes the plugin called `name` and, first, its dependencies.
    pub fn initialize(&mut self, name: &str, ctx: &PluginContext, options: &Options) -> AppResult<()> {
        let index = self.registry.resolve(name)?;
        self.initialize_at(index, ctx, options)
    }

    fn initialize_at(&mut self, index: usize, ctx: &PluginContext, options: &Options) -> AppResult<()> {
        if self.registry.slot(index).state() != PluginState::Registered {
            return Ok(());
        }
        self.registry.slot_mut(index).set_state(PluginState::Initialized);

        for dep in self.registry.dependencies(index)? {
            let pending = self.registry.slot(dep).state() == PluginState::Initialized
                && !self.initialized.contains(&dep);
            if pending {
                return Err(AppError::validation(format!(
                    "Dependency cycle between '{}' and '{}'",
                    self.registry.slot(index).name(),
                    self.registry.slot(dep).name()
                )));
            }
            self.initialize_at(dep, ctx, options)?;
        }

        let slot = self.registry.slot_mut(index);
        info!(plugin = %slot.name(), "Initializing plugin");
        if let Err(e) = slot.invoke("initialize", |p| p.initialize(ctx, options)) {
            error!(plugin = %slot.name(), error = %e, "Plugin initialization failed");
            return Err(e);
        }
        self.initialized.push(index);
        Ok(())
    }

    /// Starts every initialized plugin, dependencies first.
    ///
    /// Stops at the first failing hook. The failing plugin is already
    /// recorded as running, so a following [`Lifecycle::shutdown`] tears it
    /// down too.
    pub fn startup(&mut self, ctx: &PluginContext) -> AppResult<()> {
        let order = self.initialized.clone();
        for index in order {
            self.startup_at(index, ctx)?;
        }
        Ok(())
    }

    fn startup_at(&mut self, index: usize, ctx: &PluginContext) -> AppResult<()> {
        if self.registry.slot(index).state() != PluginState::Initialized {
            return Ok(());
        }
        self.registry.slot_mut(index).set_state(PluginState::Started);

        for dep in self.registry.dependencies(index)? {
            self.startup_at(dep, ctx)?;
        }

        self.running.push(index);
        let slot = self.registry.slot_mut(index);
        info!(plugin = %slot.name(), "Starting plugin");
        if let Err(e) = slot.invoke("startup", |p| p.startup(ctx)) {
            error!(plugin = %slot.name(), error = %e, "Plugin startup failed");
            return Err(e);
        }
        Ok(())
    }

    /// Shuts down every running plugin in reverse start order.
    ///
    /// A failing plugin never prevents the others from shutting down; the
    /// first error is returned once all of them ran. Afterwards the orders
    /// and the registry are empty.
    pub fn shutdown(&mut self, ctx: &PluginContext) -> AppResult<()> {
        let mut first_error = None;
        let order = std::mem::take(&mut self.running);
        for index in order.into_iter().rev() {
            let slot = self.registry.slot_mut(index);
            if slot.state() != PluginState::Started {
                continue;
            }
            slot.set_state(PluginState::Stopped);
            info!(plugin = %slot.name(), "Shutting down plugin");
            if let Err(e) = slot.invoke("shutdown", |p| p.shutdown(ctx)) {
                error!(plugin = %slot.name(), error = %e, "Plugin shutdown failed");
                first_error.get_or_insert(e);
            }
        }
        self.initialized.clear();
        self.registry.clear();
        first_error.map_or(Ok(()), Err)
    }

    /// Delivers SIGHUP to every initialized plugin, stopping early on quit.
    pub fn sighup(&mut self, ctx: &PluginContext) {
        let order = self.initialized.clone();
        for index in order {
            if ctx.is_quitting() {
                break;
            }
            let slot = self.registry.slot_mut(index);
            if slot.state() < PluginState::Initialized {
                continue;
            }
            if let Err(e) = slot.invoke("handle_sighup", |p| p.handle_sighup(ctx)) {
                warn!(plugin = %slot.name(), error = %e, "Plugin SIGHUP handler failed");
            }
        }
    }
}
