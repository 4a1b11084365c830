//! Interval loop running on the reactor.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use hostkit_core::priority;
use hostkit_core::result::AppResult;
use hostkit_plugin::PluginContext;

/// Posts one task per interval tick until cancelled.
pub struct Ticker<F> {
    ctx: PluginContext,
    interval: Duration,
    on_tick: F,
}

impl<F> Ticker<F>
where
    F: Fn() -> AppResult<()> + Clone + Send + 'static,
{
    /// Creates a ticker posting `on_tick` every `interval`.
    pub fn new(ctx: PluginContext, interval: Duration, on_tick: F) -> Self {
        Self {
            ctx,
            interval,
            on_tick,
        }
    }

    /// Runs until `cancel` becomes `true` or its sender is dropped.
    pub async fn run(self, mut cancel: watch::Receiver<bool>) {
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "Ticker started");
        let mut interval = time::interval(self.interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let task = self.on_tick.clone();
                    if let Err(e) = self.ctx.post(priority::MEDIUM, task) {
                        tracing::error!(error = %e, "Failed to post tick");
                        break;
                    }
                }
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        tracing::info!("Ticker shutting down");
                        break;
                    }
                }
            }
        }
    }
}
