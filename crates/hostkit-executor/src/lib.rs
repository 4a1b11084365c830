//! Cooperative task scheduling for hostkit.
//!
//! This crate provides:
//! - A priority queue of deferred tasks, FIFO within equal priorities
//! - A multi-queue executor with pluggable cross-queue arbitration
//! - The reactor boundary the run loop blocks in, with a tokio-backed default
//! - The shared quit/sighup flags used to stop the run loop

pub mod control;
pub mod executor;
pub mod queue;
pub mod reactor;

pub use control::LoopControl;
pub use executor::{ArbitrationPolicy, MultiQueueExecutor, QueueId, QueueSet, Selection};
pub use queue::{PriorityQueue, Task};
pub use reactor::{Reactor, Spawner, TokioReactor, Wake};
