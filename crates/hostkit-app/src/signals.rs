//! OS signal bridge.
//!
//! **Unix platforms:**
//! - `SIGINT`, `SIGTERM`, `SIGQUIT` request a quit
//! - `SIGHUP` requests SIGHUP delivery to every plugin
//!
//! **Other platforms:**
//! - `Ctrl-C` requests a quit

use tokio::task::JoinHandle;
use tracing::info;

use hostkit_core::error::{AppError, ErrorKind};
use hostkit_core::result::AppResult;

use crate::application::AppHandle;

fn registration_error(e: std::io::Error) -> AppError {
    AppError::with_source(
        ErrorKind::Internal,
        format!("Failed to register signal handler: {e}"),
        e,
    )
}

/// Listens for process signals on the reactor of `handle`.
///
/// Handlers are registered before this returns, so registration failures
/// are reported here. The listener stops after the first quit signal.
#[cfg(unix)]
pub fn install(handle: &AppHandle) -> AppResult<JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let spawner = handle
        .spawner()
        .cloned()
        .ok_or_else(|| AppError::configuration("No reactor runtime to listen for signals on"))?;
    let _enter = spawner.handle().enter();

    let mut sigint = signal(SignalKind::interrupt()).map_err(registration_error)?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(registration_error)?;
    let mut sigquit = signal(SignalKind::quit()).map_err(registration_error)?;
    let mut sighup = signal(SignalKind::hangup()).map_err(registration_error)?;

    let app = handle.clone();
    Ok(spawner.spawn(async move {
        loop {
            tokio::select! {
                _ = sigint.recv() => { info!(signal = "SIGINT", "Quit signal received"); break; }
                _ = sigterm.recv() => { info!(signal = "SIGTERM", "Quit signal received"); break; }
                _ = sigquit.recv() => { info!(signal = "SIGQUIT", "Quit signal received"); break; }
                Some(()) = sighup.recv() => app.request_sighup(),
            }
        }
        app.quit();
    }))
}

/// Listens for Ctrl-C on the reactor of `handle`.
#[cfg(not(unix))]
pub fn install(handle: &AppHandle) -> AppResult<JoinHandle<()>> {
    let spawner = handle
        .spawner()
        .cloned()
        .ok_or_else(|| AppError::configuration("No reactor runtime to listen for signals on"))?;
    let app = handle.clone();
    Ok(spawner.spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %registration_error(e), "Ctrl-C listener failed");
            return;
        }
        info!(signal = "Ctrl-C", "Quit signal received");
        app.quit();
    }))
}
