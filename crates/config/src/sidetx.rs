use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Knobs for the on-chain side-tx path.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SideTxConfig {
    /// Bound on a single chain reader call made by a side handler.  A call
    /// that takes longer counts as a NO vote.
    pub chain_reader_timeout_ms: u64,
}

impl SideTxConfig {
    pub fn chain_reader_timeout(&self) -> Duration {
        Duration::from_millis(self.chain_reader_timeout_ms)
    }
}

impl Default for SideTxConfig {
    fn default() -> Self {
        Self {
            chain_reader_timeout_ms: 5_000,
        }
    }
}
