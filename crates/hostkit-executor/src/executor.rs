//! Multi-queue executor.
//!
//! Any number of [`PriorityQueue`]s share one sequence counter, so FIFO
//! comparisons between tasks in different queues stay meaningful. Which
//! queue is serviced next is decided by an [`ArbitrationPolicy`].
//!
//! `post` may be called from any thread. `execute_highest` and `clear` are
//! only ever called from the run loop.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use hostkit_core::config::ArbitrationMode;
use hostkit_core::error::AppError;
use hostkit_core::result::AppResult;

use crate::queue::{PriorityQueue, Task};
use crate::reactor::Wake;

/// Index of a queue registered with a [`MultiQueueExecutor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueId(pub usize);

impl QueueId {
    /// The implicit default queue.
    pub const DEFAULT: QueueId = QueueId(0);
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue#{}", self.0)
    }
}

/// Outcome of one arbitration decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Whether a task should be run now.
    pub has_task: bool,
    /// Queue to pop from. Must be non-empty when `has_task` is set.
    pub queue: QueueId,
    /// Loop continuation hint. Independent of `has_task`.
    pub more: bool,
}

impl Selection {
    /// Nothing to run, nothing pending.
    pub fn none() -> Self {
        Self {
            has_task: false,
            queue: QueueId::DEFAULT,
            more: false,
        }
    }

    /// Run the top task of `queue`.
    pub fn run(queue: QueueId, more: bool) -> Self {
        Self {
            has_task: true,
            queue,
            more,
        }
    }
}

/// Read-only view of every queue, handed to arbitration policies.
#[derive(Debug, Clone, Copy)]
pub struct QueueSet<'a> {
    queues: &'a [PriorityQueue],
}

impl<'a> QueueSet<'a> {
    fn new(queues: &'a [PriorityQueue]) -> Self {
        Self { queues }
    }

    /// Number of registered queues.
    pub fn count(&self) -> usize {
        self.queues.len()
    }

    /// Number of pending tasks in `queue` (0 for unknown ids).
    pub fn len(&self, queue: QueueId) -> usize {
        self.queues.get(queue.0).map_or(0, PriorityQueue::len)
    }

    /// Whether `queue` has no pending task (true for unknown ids).
    pub fn is_empty(&self, queue: QueueId) -> bool {
        self.len(queue) == 0
    }

    /// Pending tasks across every queue.
    pub fn total_len(&self) -> usize {
        self.queues.iter().map(PriorityQueue::len).sum()
    }

    /// Priority of the next task in `queue`.
    pub fn top_priority(&self, queue: QueueId) -> Option<i32> {
        self.queues.get(queue.0).and_then(PriorityQueue::top_priority)
    }

    /// Whether the top task of `a` ranks below the top task of `b`.
    ///
    /// An empty queue ranks below any non-empty one.
    pub fn less_than(&self, a: QueueId, b: QueueId) -> bool {
        let top_a = self.queues.get(a.0).and_then(PriorityQueue::peek);
        let top_b = self.queues.get(b.0).and_then(PriorityQueue::peek);
        match (top_a, top_b) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(a), Some(b)) => b.runs_before(a),
        }
    }

    /// Non-empty queue whose top task ranks highest.
    pub fn highest(&self) -> Option<QueueId> {
        (0..self.queues.len())
            .map(QueueId)
            .filter(|q| !self.is_empty(*q))
            .reduce(|best, q| if self.less_than(best, q) { q } else { best })
    }
}

/// Custom arbitration callback.
pub type PolicyFn = Box<dyn Fn(&QueueSet<'_>) -> Selection + Send + Sync + 'static>;

/// Chooses which queue `execute_highest` services.
pub enum ArbitrationPolicy {
    /// Only queue 0 is serviced. Other queues are never drained.
    DefaultQueue,
    /// The queue holding the highest-ranked top task is serviced.
    HighestPriority,
    /// User-supplied rule. Runs with the executor lock held, so it must not
    /// call back into the executor.
    Custom(PolicyFn),
}

impl ArbitrationPolicy {
    /// Wraps a closure as a custom policy.
    pub fn custom(f: impl Fn(&QueueSet<'_>) -> Selection + Send + Sync + 'static) -> Self {
        Self::Custom(Box::new(f))
    }

    fn select(&self, set: &QueueSet<'_>) -> Selection {
        match self {
            Self::DefaultQueue => {
                if set.is_empty(QueueId::DEFAULT) {
                    Selection::none()
                } else {
                    Selection::run(QueueId::DEFAULT, true)
                }
            }
            Self::HighestPriority => match set.highest() {
                Some(queue) => Selection::run(queue, true),
                None => Selection::none(),
            },
            Self::Custom(f) => f(set),
        }
    }

    // Work still reachable by this policy, measured after a task ran.
    fn pending(&self, set: &QueueSet<'_>) -> bool {
        match self {
            Self::DefaultQueue => !set.is_empty(QueueId::DEFAULT),
            Self::HighestPriority | Self::Custom(_) => set.total_len() > 0,
        }
    }
}

impl Default for ArbitrationPolicy {
    fn default() -> Self {
        Self::DefaultQueue
    }
}

impl From<ArbitrationMode> for ArbitrationPolicy {
    fn from(mode: ArbitrationMode) -> Self {
        match mode {
            ArbitrationMode::DefaultQueue => Self::DefaultQueue,
            ArbitrationMode::HighestPriority => Self::HighestPriority,
        }
    }
}

impl fmt::Debug for ArbitrationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DefaultQueue => write!(f, "DefaultQueue"),
            Self::HighestPriority => write!(f, "HighestPriority"),
            Self::Custom(_) => write!(f, "Custom(<fn>)"),
        }
    }
}

#[derive(Debug)]
struct Inner {
    queues: Vec<PriorityQueue>,
    policy: ArbitrationPolicy,
}

/// Priority-ordered cooperative executor over one or more queues.
#[derive(Debug)]
pub struct MultiQueueExecutor {
    inner: Mutex<Inner>,
    sequence: AtomicU64,
    wake: Wake,
}

impl MultiQueueExecutor {
    /// Creates an executor with only the default queue.
    pub fn new(wake: Wake) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queues: vec![PriorityQueue::new()],
                policy: ArbitrationPolicy::default(),
            }),
            sequence: AtomicU64::new(0),
            wake,
        }
    }

    /// Registers another queue and returns its id.
    pub fn add_queue(&self) -> QueueId {
        let mut inner = self.inner.lock();
        inner.queues.push(PriorityQueue::new());
        let id = QueueId(inner.queues.len() - 1);
        debug!(queue = %id, "Queue registered");
        id
    }

    /// Replaces the arbitration policy.
    pub fn set_policy(&self, policy: ArbitrationPolicy) {
        debug!(policy = ?policy, "Arbitration policy set");
        self.inner.lock().policy = policy;
    }

    /// Enqueues `f` on `queue` and wakes the run loop.
    pub fn post<F>(&self, priority: i32, queue: QueueId, f: F) -> AppResult<()>
    where
        F: FnOnce() -> AppResult<()> + Send + 'static,
    {
        {
            let mut inner = self.inner.lock();
            let target = inner.queues.get_mut(queue.0).ok_or_else(|| {
                AppError::not_found(format!("Cannot post to unregistered {queue}"))
            })?;
            let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
            target.push(Task::new(priority, sequence, Box::new(f)));
            trace!(priority, sequence, queue = %queue, "Task posted");
        }
        self.wake.wake();
        Ok(())
    }

    /// Enqueues `f` on the default queue.
    pub fn post_default<F>(&self, priority: i32, f: F) -> AppResult<()>
    where
        F: FnOnce() -> AppResult<()> + Send + 'static,
    {
        self.post(priority, QueueId::DEFAULT, f)
    }

    /// Runs at most one task chosen by the arbitration policy.
    ///
    /// Returns whether more work remains. The task is removed before it runs;
    /// if it fails or panics the error is returned and the task is gone.
    pub fn execute_highest(&self) -> AppResult<bool> {
        let (task, hint) = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            let selection = inner.policy.select(&QueueSet::new(&inner.queues));
            if !selection.has_task {
                return Ok(selection.more);
            }
            match inner.queues.get_mut(selection.queue.0).and_then(PriorityQueue::pop) {
                Some(task) => (task, selection.more),
                None => {
                    warn!(queue = %selection.queue, "Arbitration selected an empty or unknown queue");
                    return Ok(selection.more);
                }
            }
        };

        trace!(priority = task.priority, sequence = task.sequence, "Running task");
        let result = task.run();

        let more = {
            let inner = self.inner.lock();
            match inner.policy {
                ArbitrationPolicy::Custom(_) => hint,
                _ => inner.policy.pending(&QueueSet::new(&inner.queues)),
            }
        };
        result.map(|()| more)
    }

    /// Drops every pending task in every queue without running it.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let dropped: usize = inner.queues.iter().map(PriorityQueue::len).sum();
        for queue in &mut inner.queues {
            queue.clear();
        }
        if dropped > 0 {
            debug!(dropped, "Executor cleared");
        }
    }

    /// Pending tasks in `queue`.
    pub fn len(&self, queue: QueueId) -> usize {
        QueueSet::new(&self.inner.lock().queues).len(queue)
    }

    /// Whether `queue` is empty.
    pub fn is_empty(&self, queue: QueueId) -> bool {
        self.len(queue) == 0
    }

    /// Pending tasks across every queue.
    pub fn total_len(&self) -> usize {
        QueueSet::new(&self.inner.lock().queues).total_len()
    }

    /// Number of registered queues.
    pub fn queue_count(&self) -> usize {
        self.inner.lock().queues.len()
    }

    /// Priority of the next task in `queue`.
    pub fn top_priority(&self, queue: QueueId) -> Option<i32> {
        QueueSet::new(&self.inner.lock().queues).top_priority(queue)
    }

    /// Whether the top of `a` ranks below the top of `b`.
    pub fn less_than(&self, a: QueueId, b: QueueId) -> bool {
        QueueSet::new(&self.inner.lock().queues).less_than(a, b)
    }

    /// Returns a closure that posts `f` when invoked, from any thread.
    ///
    /// Used to turn a reactor completion into scheduled work.
    pub fn wrap<F>(
        self: &Arc<Self>,
        priority: i32,
        queue: QueueId,
        f: F,
    ) -> impl FnOnce() -> AppResult<()> + Send + 'static
    where
        F: FnOnce() -> AppResult<()> + Send + 'static,
    {
        let executor = Arc::clone(self);
        move || executor.post(priority, queue, f)
    }
}
