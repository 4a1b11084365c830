//! Plugin context: services and resources available to plugin hooks.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;

use hostkit_core::error::AppError;
use hostkit_core::result::AppResult;
use hostkit_executor::{LoopControl, MultiQueueExecutor, QueueId, Spawner};

use super::events::{Channel, ChannelDecl};
use super::services::{Method, MethodDecl};
use crate::shared::SharedRegistry;

/// Context passed to every plugin hook.
///
/// Cheap to clone. Plugins keep a clone to post work, publish messages or
/// request a quit later on, from any thread.
#[derive(Clone)]
pub struct PluginContext {
    /// Task executor.
    executor: Arc<MultiQueueExecutor>,
    /// Quit/SIGHUP flags of the run loop.
    control: Arc<LoopControl>,
    /// Channels, methods and other shared singletons.
    shared: Arc<SharedRegistry>,
    /// Reactor spawner, when the orchestrator has one.
    spawner: Option<Spawner>,
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("quitting", &self.control.is_quitting())
            .finish()
    }
}

impl PluginContext {
    /// Creates a context.
    pub fn new(
        executor: Arc<MultiQueueExecutor>,
        control: Arc<LoopControl>,
        shared: Arc<SharedRegistry>,
        spawner: Option<Spawner>,
    ) -> Self {
        Self {
            executor,
            control,
            shared,
            spawner,
        }
    }

    /// Posts `f` to the default queue.
    pub fn post<F>(&self, priority: i32, f: F) -> AppResult<()>
    where
        F: FnOnce() -> AppResult<()> + Send + 'static,
    {
        self.executor.post(priority, QueueId::DEFAULT, f)
    }

    /// Posts `f` to `queue`.
    pub fn post_to<F>(&self, priority: i32, queue: QueueId, f: F) -> AppResult<()>
    where
        F: FnOnce() -> AppResult<()> + Send + 'static,
    {
        self.executor.post(priority, queue, f)
    }

    /// The executor.
    pub fn executor(&self) -> &Arc<MultiQueueExecutor> {
        &self.executor
    }

    /// Asks the run loop to stop.
    pub fn quit(&self) {
        self.control.quit();
    }

    /// Whether a quit has been requested.
    pub fn is_quitting(&self) -> bool {
        self.control.is_quitting()
    }

    /// Asks the run loop to deliver SIGHUP to every plugin.
    pub fn request_sighup(&self) {
        self.control.request_sighup();
    }

    /// The run-loop flags.
    pub fn control(&self) -> &Arc<LoopControl> {
        &self.control
    }

    /// The channel declared by `D`.
    pub fn channel<D: ChannelDecl>(&self) -> AppResult<Arc<Channel<D>>> {
        let executor = Arc::clone(&self.executor);
        self.shared.get_or_init(|| Channel::<D>::new(executor))
    }

    /// The method declared by `D`.
    pub fn method<D: MethodDecl>(&self) -> AppResult<Arc<Method<D>>> {
        self.shared.get_or_init(Method::<D>::new)
    }

    /// Shared singletons.
    pub fn shared(&self) -> &SharedRegistry {
        &self.shared
    }

    /// Reactor spawner.
    pub fn spawner(&self) -> Option<&Spawner> {
        self.spawner.as_ref()
    }

    /// Spawns `future` on the reactor.
    ///
    /// The future only makes progress while the run loop polls or waits on
    /// the reactor. It should report back by posting a task.
    pub fn spawn<F>(&self, future: F) -> AppResult<JoinHandle<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let spawner = self
            .spawner
            .as_ref()
            .ok_or_else(|| AppError::configuration("No reactor runtime available to spawn on"))?;
        Ok(spawner.spawn(future))
    }
}
