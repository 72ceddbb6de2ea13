//! Engine configuration.

use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// Bounds applied to every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Deepest node depth that is still dispatched. Start nodes are depth 0.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Extra visits a node gets after its first one on the same branch.
    #[serde(default = "default_max_loops")]
    pub max_loops: u32,

    /// Upper bound on a single adapter call, in milliseconds. Never zero.
    #[serde(
        default = "default_adapter_timeout_ms",
        deserialize_with = "deserialize_nonzero_ms"
    )]
    adapter_timeout_ms: u64,

    /// Finished runs kept for polling. The oldest are evicted first.
    #[serde(default = "default_max_finished_runs")]
    pub max_finished_runs: usize,
}

fn default_max_depth() -> usize {
    100
}

fn default_max_loops() -> u32 {
    100
}

fn default_adapter_timeout_ms() -> u64 {
    30_000
}

fn default_max_finished_runs() -> usize {
    1000
}

fn deserialize_nonzero_ms<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let ms = u64::deserialize(deserializer)?;
    if ms == 0 {
        return Err(serde::de::Error::custom(
            "adapter_timeout_ms must be greater than zero",
        ));
    }
    Ok(ms)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_loops: default_max_loops(),
            adapter_timeout_ms: default_adapter_timeout_ms(),
            max_finished_runs: default_max_finished_runs(),
        }
    }
}

impl EngineConfig {
    /// Sets the depth bound.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Sets the loop bound.
    #[must_use]
    pub fn with_max_loops(mut self, max_loops: u32) -> Self {
        self.max_loops = max_loops;
        self
    }

    /// Sets the adapter timeout. Anything under a millisecond becomes one
    /// millisecond.
    #[must_use]
    pub fn with_adapter_timeout(mut self, timeout: Duration) -> Self {
        let ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.adapter_timeout_ms = ms.max(1);
        self
    }

    /// Sets how many finished runs are kept for polling.
    #[must_use]
    pub fn with_max_finished_runs(mut self, max_finished_runs: usize) -> Self {
        self.max_finished_runs = max_finished_runs;
        self
    }

    /// The adapter timeout as a `Duration`.
    #[must_use]
    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_millis(self.adapter_timeout_ms)
    }
}
