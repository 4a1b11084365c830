//! Monitor plugin: listens to heartbeats and answers beat-count queries.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{info, warn};

use hostkit_core::options::Options;
use hostkit_core::priority;
use hostkit_core::result::AppResult;
use hostkit_plugin::{Channel, MethodDecl, Plugin, PluginContext, SubscriptionId};

use crate::heartbeat::{Beat, HeartbeatChannel, HeartbeatPlugin};

/// Method returning how many beats the monitor has seen.
pub struct BeatCount;

impl MethodDecl for BeatCount {
    type Args = ();
    type Output = u64;
}

/// Counts heartbeats.
#[derive(Debug, Default)]
pub struct MonitorPlugin {
    seen: Arc<AtomicU64>,
    last: Arc<Mutex<Option<Beat>>>,
    subscription: Option<(Arc<Channel<HeartbeatChannel>>, SubscriptionId)>,
}

impl MonitorPlugin {
    /// Shared beat counter. Stays valid after the plugin is dropped.
    pub fn counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.seen)
    }

    /// Most recent beat, if any.
    pub fn last_beat(&self) -> Option<Beat> {
        self.last.lock().clone()
    }
}

impl Plugin for MonitorPlugin {
    hostkit_plugin::requires!(HeartbeatPlugin);

    fn initialize(&mut self, ctx: &PluginContext, _options: &Options) -> AppResult<()> {
        let channel = ctx.channel::<HeartbeatChannel>()?;
        let seen = Arc::clone(&self.seen);
        let last = Arc::clone(&self.last);
        let id = channel.subscribe(move |beat: &Beat| {
            let previous = seen.fetch_add(1, Ordering::SeqCst);
            if previous + 1 != beat.seq {
                warn!(expected = previous + 1, got = beat.seq, "Heartbeat out of sequence");
            }
            *last.lock() = Some(beat.clone());
            Ok(())
        });
        self.subscription = Some((channel, id));

        let seen = Arc::clone(&self.seen);
        ctx.method::<BeatCount>()?
            .register(priority::MEDIUM, move |_: &()| Ok(seen.load(Ordering::SeqCst)));
        Ok(())
    }

    fn handle_sighup(&mut self, _ctx: &PluginContext) -> AppResult<()> {
        info!(beats = self.seen.load(Ordering::SeqCst), "Monitor status");
        Ok(())
    }

    fn shutdown(&mut self, _ctx: &PluginContext) -> AppResult<()> {
        if let Some((channel, id)) = self.subscription.take() {
            channel.unsubscribe(id);
        }
        info!(beats = self.seen.load(Ordering::SeqCst), "Monitor stopped");
        Ok(())
    }
}
