//! Run loop behavior: task ordering, hard-drain on quit, error propagation,
//! cross-thread posting, reactor completions, reactor poll batching and
//! SIGHUP delivery.

mod helpers;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use hostkit_app::Application;
use hostkit_core::config::{AppConfig, ArbitrationMode};
use hostkit_core::error::{AppError, ErrorKind};
use hostkit_core::options::Options;
use hostkit_core::priority;
use hostkit_core::result::AppResult;
use hostkit_executor::{QueueId, Reactor, Wake};
use hostkit_plugin::{Plugin, PluginContext, PluginState};

use helpers::{Behavior, fixture};

#[test]
fn test_quit_before_run_discards_queued_tasks() {
    let mut fx = fixture(Behavior::default(), Behavior::default());
    fx.app.initialize(&["PluginB"], Options::new()).expect("initialize");
    fx.app.startup().expect("startup");

    let executed = Arc::new(AtomicUsize::new(0));
    for _ in 0..100 {
        let executed = Arc::clone(&executed);
        fx.app
            .post(priority::HIGH, move || {
                executed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .expect("post");
    }
    fx.app.quit();
    fx.app.run().expect("run");

    assert!(executed.load(Ordering::SeqCst) < 100);
    assert_eq!(fx.a.stop(), 1);
    assert_eq!(fx.b.stop(), 1);
    assert_eq!(fx.app.executor().total_len(), 0);
}

#[test]
fn test_tasks_run_by_priority_then_post_order() {
    let mut app = Application::new().expect("app");
    let order = Arc::new(Mutex::new(Vec::new()));
    let plan = [
        (priority::MEDIUM, 0),
        (priority::MEDIUM, 1),
        (priority::HIGH, 2),
        (priority::LOW, 3),
        (priority::HIGHEST, 4),
        (priority::HIGH, 5),
        (priority::MEDIUM_LOW, 6),
        (priority::MEDIUM_HIGH, 7),
    ];
    for (prio, id) in plan {
        let order = Arc::clone(&order);
        app.post(prio, move || {
            order.lock().push(id);
            Ok(())
        })
        .expect("post");
    }
    let handle = app.handle();
    app.post(priority::LOWEST, move || {
        handle.quit();
        Ok(())
    })
    .expect("post quit");

    app.run().expect("run");

    assert_eq!(*order.lock(), vec![4, 2, 5, 7, 0, 1, 6, 3]);
}

#[test]
fn test_tasks_queued_behind_quit_never_run() {
    let mut app = Application::new().expect("app");
    let executed = Arc::new(AtomicUsize::new(0));
    let handle = app.handle();
    app.post(priority::HIGHEST, move || {
        handle.quit();
        Ok(())
    })
    .expect("post quit");
    for _ in 0..5 {
        let executed = Arc::clone(&executed);
        app.post(priority::LOW, move || {
            executed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .expect("post");
    }

    app.run().expect("run");

    assert_eq!(executed.load(Ordering::SeqCst), 0);
    assert_eq!(app.executor().total_len(), 0);
}

#[test]
fn test_task_error_is_returned_after_shutdown() {
    let mut fx = fixture(Behavior::default(), Behavior::default());
    fx.app.initialize(&["PluginB"], Options::new()).expect("initialize");
    fx.app.startup().expect("startup");
    fx.app
        .post(priority::MEDIUM, || Err(AppError::task("computation failed")))
        .expect("post");

    let err = fx.app.run().expect_err("task error");
    assert_eq!(err.kind, ErrorKind::Task);
    assert_eq!(err.message, "computation failed");
    assert_eq!((fx.a.stop(), fx.b.stop()), (1, 1));
}

#[test]
fn test_task_error_wins_over_shutdown_error() {
    let mut fx = fixture(
        Behavior {
            panic_on_shutdown: true,
            ..Behavior::default()
        },
        Behavior::default(),
    );
    fx.app.initialize(&["PluginB"], Options::new()).expect("initialize");
    fx.app.startup().expect("startup");
    fx.app
        .post(priority::MEDIUM, || -> hostkit_core::AppResult<()> {
            panic!("task blew up")
        })
        .expect("post");

    let err = fx.app.run().expect_err("task error");
    assert!(err.is_panic());
    assert!(err.message.contains("task blew up"));
    assert_eq!((fx.a.stop(), fx.b.stop()), (1, 1));
}

#[test]
fn test_post_from_other_thread_wakes_loop() {
    let mut app = Application::new().expect("app");
    let handle = app.handle();
    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);

    let poster = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        let quitter = handle.clone();
        handle
            .post(priority::MEDIUM, move || {
                flag.store(true, Ordering::SeqCst);
                quitter.quit();
                Ok(())
            })
            .expect("post");
    });

    app.run().expect("run");
    poster.join().expect("poster thread");
    assert!(ran.load(Ordering::SeqCst));
}

#[test]
fn test_quit_from_other_thread_stops_idle_loop() {
    let mut app = Application::new().expect("app");
    let handle = app.handle();
    let quitter = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        handle.quit();
    });
    app.run().expect("run");
    quitter.join().expect("quitter thread");
    assert!(app.is_quitting());
}

#[test]
fn test_reactor_completion_posts_work() {
    let mut app = Application::new().expect("app");
    let handle = app.handle();
    let fired = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&fired);

    app.context()
        .spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let quitter = handle.clone();
            let _ = handle.post(priority::HIGH, move || {
                flag.store(true, Ordering::SeqCst);
                quitter.quit();
                Ok(())
            });
        })
        .expect("spawn");

    app.run().expect("run");
    assert!(fired.load(Ordering::SeqCst));
}

#[test]
fn test_sighup_reaches_callback_and_plugins() {
    let mut fx = fixture(Behavior::default(), Behavior::default());
    fx.app.initialize(&["PluginB"], Options::new()).expect("initialize");
    fx.app.startup().expect("startup");
    let called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&called);
    fx.app
        .set_sighup_callback(move || flag.store(true, Ordering::SeqCst));

    let handle = fx.app.handle();
    handle.request_sighup();
    fx.app
        .post(priority::LOWEST, move || {
            handle.quit();
            Ok(())
        })
        .expect("post quit");

    fx.app.run().expect("run");
    assert!(called.load(Ordering::SeqCst));
    assert_eq!((fx.a.sighup(), fx.b.sighup()), (1, 1));
}

/// Registered alongside A and B but never initialized.
#[derive(Debug, Default)]
struct Bystander {
    sighups: Arc<AtomicUsize>,
}

impl Plugin for Bystander {
    fn handle_sighup(&mut self, _ctx: &PluginContext) -> AppResult<()> {
        self.sighups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_sighup_skips_uninitialized_plugins() {
    let mut fx = fixture(Behavior::default(), Behavior::default());
    let sighups = Arc::new(AtomicUsize::new(0));
    fx.app.register_plugin_instance(Box::new(Bystander {
        sighups: Arc::clone(&sighups),
    }));
    fx.app.initialize(&["PluginB"], Options::new()).expect("initialize");
    fx.app.startup().expect("startup");
    assert_eq!(fx.app.plugin_state("Bystander"), Some(PluginState::Registered));

    let handle = fx.app.handle();
    handle.request_sighup();
    fx.app
        .post(priority::LOWEST, move || {
            handle.quit();
            Ok(())
        })
        .expect("post quit");

    fx.app.run().expect("run");
    assert_eq!((fx.a.sighup(), fx.b.sighup()), (1, 1));
    assert_eq!(sighups.load(Ordering::SeqCst), 0);
}

/// Reactor that always reports progress and counts its polls.
struct BusyReactor {
    polls: Arc<AtomicUsize>,
    wake: Wake,
}

impl Reactor for BusyReactor {
    fn poll_ready_once(&mut self) -> bool {
        self.polls.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn block_until_work_or_stop(&mut self) {}

    fn waker(&self) -> Wake {
        self.wake.clone()
    }
}

#[test]
fn test_reactor_polls_bounded_by_poll_batch() {
    let mut config = AppConfig::default();
    config.executor.poll_batch = 3;
    let polls = Arc::new(AtomicUsize::new(0));
    let reactor = BusyReactor {
        polls: Arc::clone(&polls),
        wake: Wake::new(),
    };
    let mut app = Application::with_reactor(config, Box::new(reactor));

    let seen = Arc::new(Mutex::new(Vec::new()));
    for _ in 0..3 {
        let seen = Arc::clone(&seen);
        let polls = Arc::clone(&polls);
        app.post(priority::HIGH, move || {
            seen.lock().push(polls.load(Ordering::SeqCst));
            Ok(())
        })
        .expect("post");
    }
    let handle = app.handle();
    app.post(priority::LOWEST, move || {
        handle.quit();
        Ok(())
    })
    .expect("post quit");

    app.run().expect("run");
    assert_eq!(*seen.lock(), vec![3, 6, 9]);
    assert_eq!(polls.load(Ordering::SeqCst), 12);
}

#[test]
fn test_highest_priority_policy_from_config() {
    let mut config = AppConfig::default();
    config.executor.policy = ArbitrationMode::HighestPriority;
    config.executor.extra_queues = 1;
    let mut app = Application::with_config(config).expect("app");
    assert_eq!(app.executor().queue_count(), 2);

    let order = Arc::new(Mutex::new(Vec::new()));
    let lanes = [
        (priority::LOW, QueueId::DEFAULT, 0),
        (priority::HIGH, QueueId(1), 1),
        (priority::MEDIUM, QueueId::DEFAULT, 2),
        (priority::MEDIUM, QueueId(1), 3),
    ];
    for (prio, queue, id) in lanes {
        let order = Arc::clone(&order);
        app.context()
            .post_to(prio, queue, move || {
                order.lock().push(id);
                Ok(())
            })
            .expect("post");
    }
    let handle = app.handle();
    app.context()
        .post_to(priority::LOWEST, QueueId(1), move || {
            handle.quit();
            Ok(())
        })
        .expect("post quit");

    app.run().expect("run");
    assert_eq!(*order.lock(), vec![1, 2, 3, 0]);
}
