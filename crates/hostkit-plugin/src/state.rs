//! Per-plugin lifecycle state.

use std::any::TypeId;
use std::fmt;

use hostkit_core::guard::catch_panic;
use hostkit_core::result::AppResult;

use crate::registry::Plugin;

/// Lifecycle state of one plugin. Ordered: a plugin never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PluginState {
    /// Known to the orchestrator, no hook called yet.
    Registered,
    /// `initialize` has been entered.
    Initialized,
    /// `startup` has been entered.
    Started,
    /// `shutdown` has been entered.
    Stopped,
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registered => write!(f, "registered"),
            Self::Initialized => write!(f, "initialized"),
            Self::Started => write!(f, "started"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// A registered plugin instance together with its state.
#[derive(Debug)]
pub struct PluginSlot {
    name: String,
    type_id: TypeId,
    state: PluginState,
    plugin: Box<dyn Plugin>,
}

impl PluginSlot {
    pub(crate) fn new(plugin: Box<dyn Plugin>) -> Self {
        let name = plugin.name().to_string();
        let type_id = plugin.as_ref().as_any().type_id();
        Self {
            name,
            type_id,
            state: PluginState::Registered,
            plugin,
        }
    }

    /// Plugin identity.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Concrete type of the plugin instance.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Current state.
    pub fn state(&self) -> PluginState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: PluginState) {
        self.state = state;
    }

    /// The plugin instance.
    pub fn plugin(&self) -> &dyn Plugin {
        self.plugin.as_ref()
    }

    /// The plugin instance, mutably.
    pub fn plugin_mut(&mut self) -> &mut dyn Plugin {
        self.plugin.as_mut()
    }

    /// Calls one hook, turning a panic into an error.
    pub(crate) fn invoke(
        &mut self,
        hook: &str,
        f: impl FnOnce(&mut dyn Plugin) -> AppResult<()>,
    ) -> AppResult<()> {
        let origin = format!("plugin '{}' {hook}", self.name);
        let plugin = self.plugin.as_mut();
        catch_panic(&origin, || f(plugin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states_are_ordered() {
        assert!(PluginState::Registered < PluginState::Initialized);
        assert!(PluginState::Initialized < PluginState::Started);
        assert!(PluginState::Started < PluginState::Stopped);
        assert_eq!(PluginState::Started.to_string(), "started");
    }
}
