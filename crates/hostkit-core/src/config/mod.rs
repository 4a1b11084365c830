//! Configuration read by the `hostkit-server` binary.
//!
//! One sub-module per TOML section. Plugin options live in the free-form
//! `[options]` table and are only interpreted by the plugins declaring them.

pub mod executor;
pub mod logging;
pub mod plugin;

use serde::{Deserialize, Serialize};

pub use self::executor::{ArbitrationMode, ExecutorConfig};
pub use self::logging::{LogFormat, LoggingConfig};
pub use self::plugin::PluginConfig;

use crate::error::{AppError, ErrorKind};
use crate::options::Options;

/// Every section, after file and environment layers were merged.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Executor and run-loop settings.
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Plugin selection.
    #[serde(default)]
    pub plugins: PluginConfig,
    /// Free-form plugin options, handed to plugins as-is.
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl AppConfig {
    /// Load configuration from files under `dir`.
    ///
    /// Merges `{dir}/default` with an environment-specific overlay
    /// `{dir}/{env}` and environment variables prefixed with `HOSTKIT__`.
    /// Missing files are not an error.
    pub fn load(dir: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(&format!("{dir}/default")).required(false))
            .add_source(config::File::with_name(&format!("{dir}/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("HOSTKIT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| {
                let message = format!("Cannot read configuration from {dir}: {e}");
                AppError::with_source(ErrorKind::Configuration, message, e)
            })?;

        Ok(config.try_deserialize()?)
    }

    /// The plugin option map built from the `[options]` table.
    pub fn plugin_options(&self) -> Options {
        Options::from_map(self.options.clone())
    }
}
