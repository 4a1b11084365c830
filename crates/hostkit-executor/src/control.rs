//! Flags shared between the run loop and everything that may stop it.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::reactor::Wake;

/// Quit and SIGHUP flags plus the wake-up used to deliver them.
///
/// Safe to use from any thread. `quitting` is monotonic within one run.
#[derive(Debug)]
pub struct LoopControl {
    quitting: AtomicBool,
    sighup: AtomicBool,
    wake: Wake,
}

impl LoopControl {
    /// Creates cleared flags bound to `wake`.
    pub fn new(wake: Wake) -> Self {
        Self {
            quitting: AtomicBool::new(false),
            sighup: AtomicBool::new(false),
            wake,
        }
    }

    /// Asks the run loop to stop and wakes it.
    pub fn quit(&self) {
        if !self.quitting.swap(true, Ordering::SeqCst) {
            debug!("Quit requested");
        }
        self.wake.wake();
    }

    /// Returns whether quit has been requested.
    pub fn is_quitting(&self) -> bool {
        self.quitting.load(Ordering::SeqCst)
    }

    /// Records a pending SIGHUP and wakes the loop.
    pub fn request_sighup(&self) {
        self.sighup.store(true, Ordering::SeqCst);
        self.wake.wake();
    }

    /// Consumes the pending SIGHUP, if any.
    pub fn take_sighup(&self) -> bool {
        self.sighup.swap(false, Ordering::SeqCst)
    }

    /// The wake handle.
    pub fn wake(&self) -> &Wake {
        &self.wake
    }
}
