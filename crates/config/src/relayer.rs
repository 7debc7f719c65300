use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bridge relayer config
#[derive(Copy, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayerConfig {
    /// How often the rootchain listener polls for new logs, in ms.
    pub poll_interval_ms: u64,

    /// Rootchain blocks a log must be buried under before it is relayed.
    pub main_chain_tx_confirmations: u64,

    /// Unit the nonce-gap retry delay is a multiple of, in ms.
    pub retry_unit_delay_ms: u64,

    /// Retry delay when an identical tx is already in the mempool, in ms.
    pub mempool_retry_delay_ms: u64,

    /// Heimdall blocks to look back for competing staking txs.
    pub stake_lookback_blocks: u64,

    /// Cap on the nonce gap used when computing the retry delay.
    pub max_nonce_gap_factor: u64,

    /// Attempts after which a task that keeps hitting transport errors is
    /// dropped.
    pub max_task_attempts: u32,

    /// Capacity of each processor's task queue.
    pub queue_capacity: usize,
}

impl RelayerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_unit_delay(&self) -> Duration {
        Duration::from_millis(self.retry_unit_delay_ms)
    }

    pub fn mempool_retry_delay(&self) -> Duration {
        Duration::from_millis(self.mempool_retry_delay_ms)
    }
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            main_chain_tx_confirmations: 6,
            retry_unit_delay_ms: 10_000,
            mempool_retry_delay_ms: 30_000,
            stake_lookback_blocks: 5,
            max_nonce_gap_factor: 10,
            max_task_attempts: 5,
            queue_capacity: 1_024,
        }
    }
}
