//! Dependency declarations collected from [`Plugin::requires`](crate::Plugin::requires).

use crate::factory::PluginFactory;
use crate::registry::Plugin;

/// One declared dependency.
#[derive(Debug, Clone)]
pub enum DependencyRef {
    /// A plugin type. Carries its factory so the orchestrator can register
    /// it on demand.
    Typed(PluginFactory),
    /// A plugin known only by name. Must be registered separately.
    Named(String),
}

impl DependencyRef {
    /// Identity of the required plugin.
    pub fn name(&self) -> &str {
        match self {
            Self::Typed(factory) => factory.name(),
            Self::Named(name) => name,
        }
    }
}

/// Visitor handed to [`Plugin::requires`](crate::Plugin::requires).
#[derive(Debug, Clone, Default)]
pub struct Dependencies {
    refs: Vec<DependencyRef>,
}

impl Dependencies {
    /// Creates an empty visitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a dependency on plugin type `P`.
    pub fn require<P: Plugin + Default>(&mut self) -> &mut Self {
        self.refs.push(DependencyRef::Typed(PluginFactory::of::<P>()));
        self
    }

    /// Declares a dependency on the plugin called `name`.
    pub fn require_named(&mut self, name: impl Into<String>) -> &mut Self {
        self.refs.push(DependencyRef::Named(name.into()));
        self
    }

    /// Declared dependencies, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &DependencyRef> {
        self.refs.iter()
    }

    /// Number of declared dependencies.
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// Returns whether nothing was declared.
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}
