//! The reactor boundary the run loop blocks in.
//!
//! The run loop never blocks anywhere except [`Reactor::block_until_work_or_stop`].
//! Everything that completes asynchronously (timers, signal listeners, I/O)
//! lives on the reactor and reports back by posting a task to the executor,
//! which wakes the loop through [`Wake`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

use hostkit_core::error::{AppError, ErrorKind};
use hostkit_core::result::AppResult;

/// Cloneable wake-up handle for a blocked run loop.
///
/// Backed by [`Notify`], which stores a permit when nobody is waiting, so a
/// wake-up issued before the loop blocks is never lost.
#[derive(Debug, Clone, Default)]
pub struct Wake(Arc<Notify>);

impl Wake {
    /// Creates a new wake handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wakes the run loop (or arms the next wait).
    pub fn wake(&self) {
        self.0.notify_one();
    }

    /// Completes once [`Wake::wake`] has been called.
    pub async fn notified(&self) {
        self.0.notified().await;
    }
}

/// Spawns futures onto a reactor runtime and counts how often they are polled.
#[derive(Debug, Clone)]
pub struct Spawner {
    handle: Handle,
    polls: Arc<AtomicU64>,
}

impl Spawner {
    /// Spawns `future`. Every poll of it counts as reactor progress.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(Tracked {
            inner: Box::pin(future),
            polls: Arc::clone(&self.polls),
        })
    }

    /// Underlying runtime handle.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

struct Tracked<F> {
    inner: Pin<Box<F>>,
    polls: Arc<AtomicU64>,
}

impl<F: Future> Future for Tracked<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<F::Output> {
        let this = self.get_mut();
        this.polls.fetch_add(1, Ordering::Relaxed);
        this.inner.as_mut().poll(cx)
    }
}

/// Event source driving asynchronous completions for the run loop.
pub trait Reactor: Send {
    /// Lets ready completions make progress without blocking.
    ///
    /// Returns whether any completion ran.
    fn poll_ready_once(&mut self) -> bool;

    /// Calls [`Reactor::poll_ready_once`] until nothing runs or `limit`
    /// productive polls have happened. Returns the number of productive polls.
    fn poll_batch(&mut self, limit: usize) -> usize {
        let mut ran = 0;
        while ran < limit && self.poll_ready_once() {
            ran += 1;
        }
        ran
    }

    /// Blocks until someone calls [`Wake::wake`] on [`Reactor::waker`].
    fn block_until_work_or_stop(&mut self);

    /// Wake handle shared with the executor and the quit flag.
    fn waker(&self) -> Wake;

    /// Spawner plugins may run background futures on.
    fn spawner(&self) -> Option<Spawner> {
        None
    }
}

/// Reactor backed by a current-thread tokio runtime.
///
/// Spawned futures only make progress while the run loop is inside
/// [`Reactor::poll_ready_once`] or [`Reactor::block_until_work_or_stop`],
/// so they never run concurrently with posted tasks.
#[derive(Debug)]
pub struct TokioReactor {
    runtime: Runtime,
    wake: Wake,
    polls: Arc<AtomicU64>,
}

impl TokioReactor {
    /// Builds the runtime.
    pub fn new() -> AppResult<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .thread_name("hostkit-reactor")
            .build()
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Internal,
                    format!("Failed to build reactor runtime: {e}"),
                    e,
                )
            })?;
        debug!("Reactor runtime created");
        Ok(Self {
            runtime,
            wake: Wake::new(),
            polls: Arc::new(AtomicU64::new(0)),
        })
    }
}

impl Reactor for TokioReactor {
    fn poll_ready_once(&mut self) -> bool {
        let before = self.polls.load(Ordering::Relaxed);
        // yield_now defers to the scheduler, which runs every scheduled task
        // and drives the timer and I/O drivers once before resuming.
        self.runtime.block_on(tokio::task::yield_now());
        self.polls.load(Ordering::Relaxed) != before
    }

    fn block_until_work_or_stop(&mut self) {
        let wake = self.wake.clone();
        self.runtime.block_on(async move { wake.notified().await });
    }

    fn waker(&self) -> Wake {
        self.wake.clone()
    }

    fn spawner(&self) -> Option<Spawner> {
        Some(Spawner {
            handle: self.runtime.handle().clone(),
            polls: Arc::clone(&self.polls),
        })
    }
}
