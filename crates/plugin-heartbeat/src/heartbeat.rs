//! Heartbeat plugin: publishes a numbered beat on every timer tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

use hostkit_core::options::{Options, OptionsSchema};
use hostkit_core::priority;
use hostkit_core::result::AppResult;
use hostkit_plugin::{ChannelDecl, Plugin, PluginContext};

use crate::ticker::Ticker;

/// Option: milliseconds between beats.
pub const OPT_INTERVAL_MS: &str = "heartbeat-interval-ms";
/// Option: number of beats before the application quits (0 = never).
pub const OPT_LIMIT: &str = "heartbeat-limit";

/// One heartbeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beat {
    /// 1-based beat number.
    pub seq: u64,
    /// When the beat was produced.
    pub at: DateTime<Utc>,
}

/// Channel carrying [`Beat`]s.
pub struct HeartbeatChannel;

impl ChannelDecl for HeartbeatChannel {
    type Data = Beat;
}

/// Periodic heartbeat.
#[derive(Debug)]
pub struct HeartbeatPlugin {
    interval: Duration,
    limit: u64,
    sequence: Arc<AtomicU64>,
    cancel: Option<watch::Sender<bool>>,
}

impl Default for HeartbeatPlugin {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            limit: 0,
            sequence: Arc::new(AtomicU64::new(0)),
            cancel: None,
        }
    }
}

impl HeartbeatPlugin {
    /// Beats produced so far.
    pub fn beats(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

impl Plugin for HeartbeatPlugin {
    fn declare_options(&self, schema: &mut OptionsSchema) {
        schema
            .add_with_default(OPT_INTERVAL_MS, 1000, "Milliseconds between heartbeats")
            .add_with_default(OPT_LIMIT, 0, "Quit after this many heartbeats (0 runs forever)");
    }

    fn initialize(&mut self, ctx: &PluginContext, options: &Options) -> AppResult<()> {
        let interval_ms: u64 = options.get(OPT_INTERVAL_MS)?;
        self.interval = Duration::from_millis(interval_ms.max(1));
        self.limit = options.get(OPT_LIMIT)?;
        // Create the channel up front so subscribers and publisher share it.
        ctx.channel::<HeartbeatChannel>()?;
        info!(interval_ms, limit = self.limit, "Heartbeat configured");
        Ok(())
    }

    fn startup(&mut self, ctx: &PluginContext) -> AppResult<()> {
        let channel = ctx.channel::<HeartbeatChannel>()?;
        let sequence = Arc::clone(&self.sequence);
        let limit = self.limit;
        let quitter = ctx.clone();

        let beat = move || -> AppResult<()> {
            let seq = sequence.fetch_add(1, Ordering::SeqCst) + 1;
            if limit > 0 && seq > limit {
                return Ok(());
            }
            debug!(seq, "Heartbeat");
            channel.publish(Beat { seq, at: Utc::now() })?;
            if seq == limit {
                info!(limit, "Heartbeat limit reached, quitting");
                let ctx = quitter.clone();
                quitter.post(priority::LOWEST, move || {
                    ctx.quit();
                    Ok(())
                })?;
            }
            Ok(())
        };

        let (tx, rx) = watch::channel(false);
        ctx.spawn(Ticker::new(ctx.clone(), self.interval, beat).run(rx))?;
        self.cancel = Some(tx);
        Ok(())
    }

    fn shutdown(&mut self, _ctx: &PluginContext) -> AppResult<()> {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(true);
        }
        info!(beats = self.beats(), "Heartbeat stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beat_serializes() {
        let beat = Beat {
            seq: 4,
            at: DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        };
        let json = serde_json::to_value(&beat).unwrap();
        assert_eq!(json["seq"], 4);
        assert_eq!(json["at"], "2024-05-01T10:00:00Z");
        let back: Beat = serde_json::from_value(json).unwrap();
        assert_eq!(back, beat);
    }

    #[test]
    fn test_declared_defaults() {
        let mut schema = OptionsSchema::new();
        HeartbeatPlugin::default().declare_options(&mut schema);
        let options = schema.apply_defaults(&Options::new());
        assert_eq!(options.get::<u64>(OPT_INTERVAL_MS).unwrap(), 1000);
        assert_eq!(options.get::<u64>(OPT_LIMIT).unwrap(), 0);
    }
}
