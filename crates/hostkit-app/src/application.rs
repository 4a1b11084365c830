//! The application orchestrator.
//!
//! ```text
//! register plugins ─► initialize(names, options) ─► startup() ─► run()
//!                                                                 │
//!            quit() / task failure / signal ──────────────────────┘
//!                                            clear() ─► shutdown()
//! ```
//!
//! All lifecycle hooks and posted tasks run on the thread that calls
//! [`Application::run`]. Other threads interact only through an
//! [`AppHandle`] (post work, quit, request SIGHUP).

use std::io::Write;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use hostkit_core::config::AppConfig;
use hostkit_core::error::{AppError, ErrorKind};
use hostkit_core::options::{Options, OptionsSchema};
use hostkit_core::result::AppResult;
use hostkit_executor::{LoopControl, MultiQueueExecutor, Reactor, TokioReactor};
use hostkit_plugin::{
    Lifecycle, Plugin, PluginContext, PluginFactory, PluginState, SharedRegistry, registrations,
};

/// Narrow, cloneable accessor to a running application.
pub type AppHandle = PluginContext;

type SighupCallback = Box<dyn FnMut() + Send>;

/// Plugin host: lifecycle orchestrator plus run loop.
pub struct Application {
    config: AppConfig,
    lifecycle: Lifecycle,
    options: Options,
    process_registrations_applied: bool,
    sighup_callback: Option<SighupCallback>,
    ctx: PluginContext,
    executor: Arc<MultiQueueExecutor>,
    control: Arc<LoopControl>,
    shared: Arc<SharedRegistry>,
    reactor: Box<dyn Reactor>,
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("plugins", &self.lifecycle.registry().len())
            .field("running", &self.lifecycle.running_names())
            .field("quitting", &self.control.is_quitting())
            .finish()
    }
}

impl Application {
    /// Creates an application with default configuration and a tokio reactor.
    pub fn new() -> AppResult<Self> {
        Self::with_config(AppConfig::default())
    }

    /// Creates an application with a tokio reactor.
    pub fn with_config(config: AppConfig) -> AppResult<Self> {
        let reactor = TokioReactor::new()?;
        Ok(Self::with_reactor(config, Box::new(reactor)))
    }

    /// Creates an application driven by `reactor`.
    pub fn with_reactor(config: AppConfig, reactor: Box<dyn Reactor>) -> Self {
        let wake = reactor.waker();
        let executor = Arc::new(MultiQueueExecutor::new(wake.clone()));
        for _ in 0..config.executor.extra_queues {
            executor.add_queue();
        }
        executor.set_policy(config.executor.policy.into());
        let control = Arc::new(LoopControl::new(wake));
        let shared = Arc::new(SharedRegistry::new());
        let ctx = PluginContext::new(
            Arc::clone(&executor),
            Arc::clone(&control),
            Arc::clone(&shared),
            reactor.spawner(),
        );

        debug!(
            queues = executor.queue_count(),
            policy = ?config.executor.policy,
            "Application created"
        );

        Self {
            config,
            lifecycle: Lifecycle::new(),
            options: Options::new(),
            process_registrations_applied: false,
            sighup_callback: None,
            ctx,
            executor,
            control,
            shared,
            reactor,
        }
    }

    // ── Registration ─────────────────────────────────────────────

    /// Registers plugin type `P` (and its typed dependencies) with this
    /// application only. Returns `false` if it was already registered.
    pub fn register_plugin<P: Plugin + Default>(&mut self) -> bool {
        self.lifecycle
            .registry_mut()
            .register(&PluginFactory::of::<P>())
    }

    /// Registers an already constructed plugin.
    pub fn register_plugin_instance(&mut self, plugin: Box<dyn Plugin>) -> bool {
        self.lifecycle.registry_mut().register_instance(plugin)
    }

    fn apply_process_registrations(&mut self) {
        if self.process_registrations_applied {
            return;
        }
        for factory in registrations() {
            self.lifecycle.registry_mut().register(&factory);
        }
        self.process_registrations_applied = true;
    }

    /// Options declared by every registered plugin.
    pub fn options_schema(&mut self) -> OptionsSchema {
        self.apply_process_registrations();
        let mut schema = OptionsSchema::new();
        self.lifecycle.registry().declare_options(&mut schema);
        schema
    }

    /// Writes a commented listing of every declared option and its default.
    pub fn print_default_config(&mut self, out: &mut impl Write) -> AppResult<()> {
        let rendered = self.options_schema().render_default_config();
        out.write_all(rendered.as_bytes()).map_err(|e| {
            AppError::with_source(
                ErrorKind::Internal,
                format!("Failed to write default config: {e}"),
                e,
            )
        })
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Initializes the requested plugins and, first, their dependencies.
    ///
    /// Declared option defaults are merged into `options` before any hook
    /// sees them. A failing plugin aborts initialization; plugins that
    /// already initialized stay initialized.
    pub fn initialize(&mut self, requested: &[&str], options: Options) -> AppResult<()> {
        let schema = self.options_schema();
        for name in schema.redundant_defaults(&options) {
            warn!(option = %name, "Option is explicitly set to its default value");
        }
        for name in schema.undeclared(&options) {
            warn!(option = %name, "Option is not declared by any plugin");
        }
        self.options = schema.apply_defaults(&options);

        for name in requested {
            if let Err(e) = self.lifecycle.initialize(name, &self.ctx, &self.options) {
                error!(plugin = %name, error = %e, "Failed to initialize");
                return Err(e);
            }
        }
        info!(
            plugins = ?self.lifecycle.initialized_names(),
            "Plugins initialized"
        );
        Ok(())
    }

    /// Initializes the plugins listed in `plugins.enabled` with the
    /// `[options]` table of the configuration.
    pub fn initialize_from_config(&mut self) -> AppResult<()> {
        let names = self.config.plugins.enabled.clone();
        let requested: Vec<&str> = names.iter().map(String::as_str).collect();
        let options = self.config.plugin_options();
        self.initialize(&requested, options)
    }

    /// Starts every initialized plugin, dependencies first.
    ///
    /// If a plugin fails to start, everything started so far (including the
    /// failing plugin) is shut down and the startup error is returned.
    pub fn startup(&mut self) -> AppResult<()> {
        match self.lifecycle.startup(&self.ctx) {
            Ok(()) => {
                info!(plugins = ?self.lifecycle.running_names(), "Plugins started");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Startup failed, shutting down");
                if let Err(shutdown_err) = self.shutdown() {
                    error!(error = %shutdown_err, "Shutdown after failed startup also failed");
                }
                Err(e)
            }
        }
    }

    /// Runs posted tasks until a quit is requested, then tears down.
    ///
    /// Tasks still queued when the loop stops are discarded. A failing task
    /// stops the loop; its error is returned after shutdown, taking
    /// precedence over any shutdown error.
    pub fn run(&mut self) -> AppResult<()> {
        let batch = self.config.executor.poll_batch.max(1);
        let mut first_error: Option<AppError> = None;
        info!("Run loop started");

        loop {
            if self.control.is_quitting() {
                break;
            }
            if self.control.take_sighup() {
                self.dispatch_sighup();
            }
            self.reactor.poll_batch(batch);
            match self.executor.execute_highest() {
                Ok(more) => {
                    if !more && !self.control.is_quitting() {
                        self.reactor.block_until_work_or_stop();
                    }
                }
                Err(e) => {
                    error!(error = %e, "Task failed, quitting");
                    first_error.get_or_insert(e);
                    self.control.quit();
                }
            }
        }

        info!(pending = self.executor.total_len(), "Run loop stopped");
        self.executor.clear();
        let shutdown_result = self.shutdown();
        match first_error {
            Some(e) => {
                if let Err(shutdown_err) = shutdown_result {
                    error!(error = %shutdown_err, "Shutdown failed after task failure");
                }
                Err(e)
            }
            None => shutdown_result,
        }
    }

    /// Shuts down running plugins in reverse start order.
    ///
    /// Every plugin gets its shutdown call even if another one fails; the
    /// first failure is returned. The application is left quitting and
    /// with no registered plugins.
    pub fn shutdown(&mut self) -> AppResult<()> {
        let result = self.lifecycle.shutdown(&self.ctx);
        self.shared.clear();
        self.control.quit();
        if result.is_ok() {
            info!("Shutdown complete");
        }
        result
    }

    fn dispatch_sighup(&mut self) {
        info!("SIGHUP received");
        if let Some(callback) = self.sighup_callback.as_mut() {
            callback();
        }
        self.lifecycle.sighup(&self.ctx);
    }

    /// Installs an application-level callback run before plugins see SIGHUP.
    pub fn set_sighup_callback(&mut self, callback: impl FnMut() + Send + 'static) {
        self.sighup_callback = Some(Box::new(callback));
    }

    // ── Control ──────────────────────────────────────────────────

    /// Asks the run loop to stop.
    pub fn quit(&self) {
        self.control.quit();
    }

    /// Whether a quit has been requested.
    pub fn is_quitting(&self) -> bool {
        self.control.is_quitting()
    }

    /// Context handed to plugin hooks.
    pub fn context(&self) -> &PluginContext {
        &self.ctx
    }

    /// Cloneable handle usable from any thread.
    pub fn handle(&self) -> AppHandle {
        self.ctx.clone()
    }

    /// The executor.
    pub fn executor(&self) -> &Arc<MultiQueueExecutor> {
        &self.executor
    }

    /// Posts `f` to the default queue.
    pub fn post<F>(&self, priority: i32, f: F) -> AppResult<()>
    where
        F: FnOnce() -> AppResult<()> + Send + 'static,
    {
        self.ctx.post(priority, f)
    }

    // ── Introspection ────────────────────────────────────────────

    /// The configuration this application was built with.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Options after defaults were merged in.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The registered plugin of type `P`.
    pub fn find_plugin<P: Plugin>(&self) -> Option<&P> {
        self.lifecycle.registry().find::<P>()
    }

    /// The registered plugin of type `P`, mutably.
    pub fn find_plugin_mut<P: Plugin>(&mut self) -> Option<&mut P> {
        self.lifecycle.registry_mut().find_mut::<P>()
    }

    /// The registered plugin of type `P`, or `NotFound`.
    pub fn get_plugin<P: Plugin>(&self) -> AppResult<&P> {
        self.find_plugin::<P>().ok_or_else(|| {
            AppError::not_found(format!(
                "Unable to find plugin '{}'",
                std::any::type_name::<P>()
            ))
        })
    }

    /// State of the plugin called `name`.
    pub fn plugin_state(&self, name: &str) -> Option<PluginState> {
        self.lifecycle.registry().state_of(name)
    }

    /// Plugins in the order they finished initializing.
    pub fn initialized_plugins(&self) -> Vec<String> {
        self.lifecycle.initialized_names()
    }

    /// Plugins in the order they started.
    pub fn running_plugins(&self) -> Vec<String> {
        self.lifecycle.running_names()
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        if self.lifecycle.has_running() {
            warn!("Application dropped with running plugins, shutting down");
            if let Err(e) = self.shutdown() {
                error!(error = %e, "Shutdown on drop failed");
            }
        }
        // Queued tasks and channel subscribers may hold handles to the executor.
        self.executor.clear();
        self.shared.clear();
    }
}
