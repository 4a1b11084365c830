//! Process-wide single-instance guard. Kept in its own test binary because
//! it observes global state.

mod helpers;

use hostkit_app::ScopedApp;
use hostkit_core::error::ErrorKind;
use hostkit_core::options::Options;
use hostkit_plugin::PluginState;

use helpers::{Counters, PluginA, PluginB};

#[test]
fn test_scoped_app_lifecycle() {
    let a = Counters::default();
    let b = Counters::default();

    for round in 0..3 {
        let mut app = ScopedApp::new().expect("first scoped app");
        assert!(ScopedApp::is_live());
        assert_eq!(
            ScopedApp::new().expect_err("second scoped app").kind,
            ErrorKind::Conflict
        );

        app.register_plugin_instance(Box::new(PluginA {
            counters: a.clone(),
            ..PluginA::default()
        }));
        app.register_plugin_instance(Box::new(PluginB {
            counters: b.clone(),
            ..PluginB::default()
        }));
        app.initialize(&["PluginB"], Options::new()).expect("initialize");
        app.startup().expect("startup");
        assert_eq!(app.plugin_state("PluginA"), Some(PluginState::Started));

        drop(app);
        assert!(!ScopedApp::is_live());
        assert_eq!(a.stop(), round + 1);
        assert_eq!(b.stop(), round + 1);
    }
}
