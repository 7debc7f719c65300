//! Interfaces to the Heimdall node the relayer submits to.

use async_trait::async_trait;
use heimdall_primitives::buf::TxHash;
use heimdall_state::{msg::Msg, stake::ValidatorId};

use crate::errors::{BroadcastError, RelayResult};

/// Module whose dedup sequences decide if a log was already relayed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SyncModule {
    Clerk,
    Topup,
    Stake,
}

/// Read access to Heimdall consensus state and mempool.
#[async_trait]
pub trait ConsensusClient: Send + Sync + 'static {
    /// Checks if the log at `(tx_hash, log_index)` was already accepted by
    /// `module`.
    async fn is_old_tx(
        &self,
        module: SyncModule,
        tx_hash: TxHash,
        log_index: u64,
    ) -> RelayResult<bool>;

    /// Current staking nonce of a validator and the height it was set at.
    async fn get_nonce_and_height(&self, val_id: ValidatorId) -> RelayResult<Option<(u64, u64)>>;

    /// Number of staking txs for the validator included in the last
    /// `lookback_blocks` blocks.
    async fn recent_stake_tx_count(
        &self,
        val_id: ValidatorId,
        lookback_blocks: u64,
    ) -> RelayResult<usize>;

    /// Raw txs waiting in the mempool.
    async fn unconfirmed_txs(&self) -> RelayResult<Vec<Vec<u8>>>;
}

/// Signs and broadcasts msgs from the relayer's account.
#[async_trait]
pub trait TxBroadcaster: Send + Sync + 'static {
    async fn broadcast(&self, msg: Msg) -> Result<TxHash, BroadcastError>;
}
