//! Convenience macros for plugin development.

/// Implements [`Plugin::requires`](crate::Plugin::requires) for a list of
/// plugin types. Use inside an `impl Plugin for ...` block.
///
/// # Example
/// ```rust,ignore
/// impl Plugin for MonitorPlugin {
///     hostkit_plugin::requires!(HeartbeatPlugin);
/// }
/// ```
#[macro_export]
macro_rules! requires {
    ($($dep:ty),* $(,)?) => {
        fn requires(&self, deps: &mut $crate::Dependencies) {
            $( deps.require::<$dep>(); )*
        }
    };
}
