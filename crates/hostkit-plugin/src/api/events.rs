//! Typed publish/subscribe channels between plugins.
//!
//! Publishing never calls subscribers directly: it posts one task to the
//! executor at the channel's priority, and that task delivers the message
//! to every subscriber in subscription order.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{error, trace};

use hostkit_core::priority;
use hostkit_core::result::AppResult;
use hostkit_executor::{MultiQueueExecutor, QueueId};

/// Declares a channel: its message type and delivery priority.
///
/// ```rust,ignore
/// struct Beats;
/// impl ChannelDecl for Beats {
///     type Data = u64;
/// }
/// ```
pub trait ChannelDecl: 'static {
    /// Message type.
    type Data: Clone + Send + Sync + 'static;

    /// Priority of the delivery task.
    const PRIORITY: i32 = priority::MEDIUM;
}

/// Handle returned by [`Channel::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber<T> = Arc<dyn Fn(&T) -> AppResult<()> + Send + Sync>;

/// A channel instance, shared by every plugin of one orchestrator.
pub struct Channel<D: ChannelDecl> {
    executor: Arc<MultiQueueExecutor>,
    subscribers: Arc<Mutex<Vec<(SubscriptionId, Subscriber<D::Data>)>>>,
    next_id: AtomicU64,
    _decl: PhantomData<fn() -> D>,
}

impl<D: ChannelDecl> Channel<D> {
    /// Creates a channel delivering through `executor`.
    pub fn new(executor: Arc<MultiQueueExecutor>) -> Self {
        Self {
            executor,
            subscribers: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(0),
            _decl: PhantomData,
        }
    }

    /// Adds a subscriber.
    pub fn subscribe<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&D::Data) -> AppResult<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().push((id, Arc::new(f)));
        id
    }

    /// Removes a subscriber. Returns whether it was present.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Whether anyone is listening.
    pub fn has_subscribers(&self) -> bool {
        !self.subscribers.lock().is_empty()
    }

    /// Schedules delivery of `data` to every current subscriber.
    ///
    /// Subscribers run on the run-loop thread. A failing subscriber does
    /// not stop delivery to the others; the first error fails the task.
    pub fn publish(&self, data: D::Data) -> AppResult<()> {
        let subscribers = Arc::clone(&self.subscribers);
        self.executor.post(D::PRIORITY, QueueId::DEFAULT, move || {
            let snapshot: Vec<_> = subscribers.lock().iter().map(|(_, s)| Arc::clone(s)).collect();
            trace!(subscribers = snapshot.len(), channel = %std::any::type_name::<D>(), "Delivering message");
            let mut first_error = None;
            for subscriber in snapshot {
                if let Err(e) = subscriber(&data) {
                    error!(channel = %std::any::type_name::<D>(), error = %e, "Channel subscriber failed");
                    first_error.get_or_insert(e);
                }
            }
            first_error.map_or(Ok(()), Err)
        })
    }
}

impl<D: ChannelDecl> fmt::Debug for Channel<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("decl", &std::any::type_name::<D>())
            .field("subscribers", &self.subscribers.lock().len())
            .finish()
    }
}
