//! # hostkit-app
//!
//! The application orchestrator. Owns the plugin lifecycle, the executor
//! and the reactor, and drives the run loop until a quit is requested.

pub mod application;
pub mod scoped;
pub mod signals;

pub use application::{AppHandle, Application};
pub use scoped::ScopedApp;
