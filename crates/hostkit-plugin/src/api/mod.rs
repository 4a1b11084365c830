//! Services exposed to plugins.

pub mod context;
pub mod events;
pub mod services;
