//! Global consensus parameters for the side-tx modules.

use serde::{Deserialize, Serialize};

/// Maximum size in bytes of a state-sync payload accepted into an event
/// record.  Larger payloads are replaced with an empty payload.
pub const MAX_STATE_SYNC_SIZE: usize = 30_000;

/// Parameters describing the external chains we attest to.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainParams {
    /// Heimdall chain id, mixed into the dummy non-rp vote extension.
    pub chain_id: String,

    /// Bor chain id that event records and checkpoints are bound to.
    pub bor_chain_id: String,

    /// Confirmations required on a rootchain tx before we vote on it.
    pub main_chain_tx_confirmations: u64,

    /// Confirmations required on Bor blocks covered by a checkpoint.
    pub bor_chain_tx_confirmations: u64,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            chain_id: "heimdall-137".to_string(),
            bor_chain_id: "137".to_string(),
            main_chain_tx_confirmations: 6,
            bor_chain_tx_confirmations: 10,
        }
    }
}

/// Parameters governing checkpoint proposals.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointParams {
    /// Seconds after buffering a checkpoint before a no-ack may clear it.
    pub checkpoint_buffer_time: u64,

    /// Upper bound on the number of Bor blocks in one checkpoint.
    pub max_checkpoint_length: u64,

    /// Typical checkpoint length, used by proposers.
    pub avg_checkpoint_length: u64,
}

impl Default for CheckpointParams {
    fn default() -> Self {
        Self {
            checkpoint_buffer_time: 1000,
            max_checkpoint_length: 1024,
            avg_checkpoint_length: 256,
        }
    }
}

/// Combined set of parameters across the side-tx modules.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Params {
    pub chain: ChainParams,
    pub checkpoint: CheckpointParams,
}

impl Params {
    pub fn chain(&self) -> &ChainParams {
        &self.chain
    }

    pub fn checkpoint(&self) -> &CheckpointParams {
        &self.checkpoint
    }
}
