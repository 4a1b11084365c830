//! Plugin selection configuration.

use serde::{Deserialize, Serialize};

/// Which registered plugins to bring up.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PluginConfig {
    /// Plugin names to initialize (their dependencies come along).
    #[serde(default)]
    pub enabled: Vec<String>,
}
