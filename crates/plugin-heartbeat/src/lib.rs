//! Sample plugins for hostkit.
//!
//! [`HeartbeatPlugin`] ticks on the reactor and publishes a [`Beat`] on
//! [`HeartbeatChannel`] for every tick. [`MonitorPlugin`] depends on it,
//! counts beats, and answers the [`BeatCount`] method.

pub mod heartbeat;
pub mod monitor;
pub mod ticker;

pub use heartbeat::{Beat, HeartbeatChannel, HeartbeatPlugin};
pub use monitor::{BeatCount, MonitorPlugin};
