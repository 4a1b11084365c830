//! `[logging]` section.

use serde::{Deserialize, Serialize};

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, human oriented.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// How the binary sets up `tracing`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `"info"` or
    /// `"hostkit_executor=trace,info"`.
    #[serde(default = "default_level")]
    pub level: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
    /// Include thread ids in every event. Useful when tasks are posted
    /// from worker threads.
    #[serde(default)]
    pub thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            thread_ids: false,
        }
    }
}

fn default_level() -> String {
    "info".into()
}
