//! At most one live application per process, torn down on scope exit.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};

use hostkit_core::config::AppConfig;
use hostkit_core::error::AppError;
use hostkit_core::result::AppResult;

use crate::application::Application;

static LIVE: AtomicBool = AtomicBool::new(false);

/// Releases the process-wide slot once the application is gone.
#[derive(Debug)]
struct LiveGuard;

impl Drop for LiveGuard {
    fn drop(&mut self) {
        LIVE.store(false, Ordering::SeqCst);
    }
}

/// An [`Application`] that claims the process-wide slot for its lifetime.
///
/// Creating a second one while the first is alive fails with `Conflict`.
/// Dropping it shuts down any running plugins, then frees the slot, so a
/// fresh instance can be created right after.
#[derive(Debug)]
pub struct ScopedApp {
    // Declared before the guard: the application is torn down first.
    app: Application,
    _guard: LiveGuard,
}

impl ScopedApp {
    /// Creates a scoped application with default configuration.
    pub fn new() -> AppResult<Self> {
        Self::with_config(AppConfig::default())
    }

    /// Creates a scoped application.
    pub fn with_config(config: AppConfig) -> AppResult<Self> {
        if LIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AppError::conflict(
                "Another scoped application is still alive in this process",
            ));
        }
        let guard = LiveGuard;
        let app = Application::with_config(config)?;
        Ok(Self { app, _guard: guard })
    }

    /// Whether a scoped application is currently alive.
    pub fn is_live() -> bool {
        LIVE.load(Ordering::SeqCst)
    }
}

impl Deref for ScopedApp {
    type Target = Application;

    fn deref(&self) -> &Application {
        &self.app
    }
}

impl DerefMut for ScopedApp {
    fn deref_mut(&mut self) -> &mut Application {
        &mut self.app
    }
}
