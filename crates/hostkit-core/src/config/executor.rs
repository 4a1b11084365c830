//! Task executor configuration.

use serde::{Deserialize, Serialize};

/// Cross-queue arbitration used when no custom policy is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ArbitrationMode {
    /// Only the default queue is ever serviced.
    #[default]
    DefaultQueue,
    /// The queue whose top task ranks highest is serviced. Equal
    /// priorities fall back to posting order across queues.
    HighestPriority,
}

/// Executor and run-loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Upper bound on reactor completions serviced per loop iteration.
    #[serde(default = "default_poll_batch")]
    pub poll_batch: usize,
    /// Built-in arbitration policy.
    #[serde(default)]
    pub policy: ArbitrationMode,
    /// Number of queues registered in addition to the default queue.
    #[serde(default)]
    pub extra_queues: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            poll_batch: default_poll_batch(),
            policy: ArbitrationMode::default(),
            extra_queues: 0,
        }
    }
}

fn default_poll_batch() -> usize {
    64
}
