//! Shared test plugins for application integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use hostkit_app::Application;
use hostkit_core::config::AppConfig;
use hostkit_core::error::AppError;
use hostkit_core::options::{Options, OptionsSchema};
use hostkit_core::result::AppResult;
use hostkit_plugin::{Plugin, PluginContext};

/// Ordered record of hook calls across plugins.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn note(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

/// Per-hook call counters that outlive the plugin instance.
#[derive(Debug, Clone, Default)]
pub struct Counters {
    pub init: Arc<AtomicUsize>,
    pub start: Arc<AtomicUsize>,
    pub stop: Arc<AtomicUsize>,
    pub sighup: Arc<AtomicUsize>,
}

impl Counters {
    pub fn init(&self) -> usize {
        self.init.load(Ordering::SeqCst)
    }

    pub fn start(&self) -> usize {
        self.start.load(Ordering::SeqCst)
    }

    pub fn stop(&self) -> usize {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn sighup(&self) -> usize {
        self.sighup.load(Ordering::SeqCst)
    }
}

/// What a test plugin does when its hooks run.
#[derive(Debug, Clone, Copy, Default)]
pub struct Behavior {
    pub fail_startup: bool,
    pub panic_on_shutdown: bool,
    pub quit_on_startup: bool,
}

/// Plugin without dependencies. Declares the `a-level` option.
#[derive(Debug, Default)]
pub struct PluginA {
    pub counters: Counters,
    pub behavior: Behavior,
    pub journal: Journal,
    pub level: u64,
}

/// Plugin depending on [`PluginA`].
#[derive(Debug, Default)]
pub struct PluginB {
    pub counters: Counters,
    pub behavior: Behavior,
    pub journal: Journal,
}

fn run_startup(
    name: &str,
    ctx: &PluginContext,
    counters: &Counters,
    behavior: Behavior,
    journal: &Journal,
) -> AppResult<()> {
    counters.start.fetch_add(1, Ordering::SeqCst);
    journal.note(format!("{name}:start"));
    if behavior.quit_on_startup {
        ctx.quit();
    }
    if behavior.fail_startup {
        return Err(AppError::plugin(format!("{name} refused to start")));
    }
    Ok(())
}

fn run_shutdown(name: &str, counters: &Counters, behavior: Behavior, journal: &Journal) -> AppResult<()> {
    counters.stop.fetch_add(1, Ordering::SeqCst);
    journal.note(format!("{name}:stop"));
    if behavior.panic_on_shutdown {
        panic!("{name} exploded during shutdown");
    }
    Ok(())
}

impl Plugin for PluginA {
    fn declare_options(&self, schema: &mut OptionsSchema) {
        schema.add_with_default("a-level", 3, "Level used by plugin A");
    }

    fn initialize(&mut self, _ctx: &PluginContext, options: &Options) -> AppResult<()> {
        self.counters.init.fetch_add(1, Ordering::SeqCst);
        self.journal.note("PluginA:init");
        self.level = options.get("a-level")?;
        Ok(())
    }

    fn startup(&mut self, ctx: &PluginContext) -> AppResult<()> {
        run_startup("PluginA", ctx, &self.counters, self.behavior, &self.journal)
    }

    fn shutdown(&mut self, _ctx: &PluginContext) -> AppResult<()> {
        run_shutdown("PluginA", &self.counters, self.behavior, &self.journal)
    }

    fn handle_sighup(&mut self, _ctx: &PluginContext) -> AppResult<()> {
        self.counters.sighup.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Plugin for PluginB {
    hostkit_plugin::requires!(PluginA);

    fn initialize(&mut self, _ctx: &PluginContext, _options: &Options) -> AppResult<()> {
        self.counters.init.fetch_add(1, Ordering::SeqCst);
        self.journal.note("PluginB:init");
        Ok(())
    }

    fn startup(&mut self, ctx: &PluginContext) -> AppResult<()> {
        run_startup("PluginB", ctx, &self.counters, self.behavior, &self.journal)
    }

    fn shutdown(&mut self, _ctx: &PluginContext) -> AppResult<()> {
        run_shutdown("PluginB", &self.counters, self.behavior, &self.journal)
    }

    fn handle_sighup(&mut self, _ctx: &PluginContext) -> AppResult<()> {
        self.counters.sighup.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Handles onto two registered plugins, A and B (B depends on A).
pub struct Fixture {
    pub app: Application,
    pub a: Counters,
    pub b: Counters,
    pub journal: Journal,
}

/// Builds an application with A and B registered as instances.
pub fn fixture(a: Behavior, b: Behavior) -> Fixture {
    let mut app = Application::with_config(AppConfig::default()).expect("Failed to create app");
    let journal = Journal::default();
    let a_counters = Counters::default();
    let b_counters = Counters::default();
    app.register_plugin_instance(Box::new(PluginA {
        counters: a_counters.clone(),
        behavior: a,
        journal: journal.clone(),
        level: 0,
    }));
    app.register_plugin_instance(Box::new(PluginB {
        counters: b_counters.clone(),
        behavior: b,
        journal: journal.clone(),
    }));
    Fixture {
        app,
        a: a_counters,
        b: b_counters,
        journal,
    }
}
