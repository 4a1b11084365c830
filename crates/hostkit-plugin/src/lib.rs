//! # hostkit-plugin
//!
//! Plugin framework for hostkit. Provides:
//!
//! - The [`Plugin`] trait and its dependency visitor
//! - Per-plugin state machine and the registry of plugin instances
//! - Dependency-first bring-up and reverse tear-down ([`Lifecycle`])
//! - Process-wide plugin registration
//! - The [`PluginContext`] handed to every hook, with typed channels and methods
//! - A lazily populated registry of shared singletons

pub mod api;
pub mod dependencies;
pub mod factory;
pub mod lifecycle;
pub mod macros;
pub mod registry;
pub mod shared;
pub mod state;

pub use api::context::PluginContext;
pub use api::events::{Channel, ChannelDecl, SubscriptionId};
pub use api::services::{Method, MethodDecl};
pub use dependencies::{Dependencies, DependencyRef};
pub use factory::{PluginFactory, register, registrations};
pub use lifecycle::Lifecycle;
pub use registry::{AsAny, Plugin, PluginRegistry};
pub use shared::SharedRegistry;
pub use state::{PluginSlot, PluginState};
