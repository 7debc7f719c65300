use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use heimdall_chainio::types::{ChainEvent, ChainLog};
use heimdall_primitives::buf::{Buf32, TxHash};
use heimdall_state::{msg::Msg, stake::ValidatorId, tx::Tx};
use parking_lot::Mutex;

use crate::{
    client::{ConsensusClient, SyncModule, TxBroadcaster},
    errors::{BroadcastError, RelayError, RelayResult},
};

#[derive(Debug, Default)]
struct ConsensusState {
    old: HashSet<(SyncModule, TxHash, u64)>,
    nonces: HashMap<ValidatorId, (u64, u64)>,
    recent: HashMap<ValidatorId, usize>,
    pending: Vec<Vec<u8>>,
    fail: bool,
}

#[derive(Debug, Default)]
pub(crate) struct MockConsensus {
    state: Mutex<ConsensusState>,
}

impl MockConsensus {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn mark_old(&self, module: SyncModule, tx_hash: TxHash, log_index: u64) {
        self.state.lock().old.insert((module, tx_hash, log_index));
    }

    pub(crate) fn set_nonce(&self, val_id: ValidatorId, nonce: u64) {
        self.state.lock().nonces.insert(val_id, (nonce, 1));
    }

    pub(crate) fn set_recent(&self, val_id: ValidatorId, count: usize) {
        self.state.lock().recent.insert(val_id, count);
    }

    pub(crate) fn add_pending(&self, msg: Msg) {
        self.state.lock().pending.push(Tx::new(msg).encode());
    }

    pub(crate) fn set_fail(&self, fail: bool) {
        self.state.lock().fail = fail;
    }

    fn gate(&self) -> RelayResult<()> {
        if self.state.lock().fail {
            return Err(RelayError::Consensus("node unreachable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ConsensusClient for MockConsensus {
    async fn is_old_tx(
        &self,
        module: SyncModule,
        tx_hash: TxHash,
        log_index: u64,
    ) -> RelayResult<bool> {
        self.gate()?;
        Ok(self.state.lock().old.contains(&(module, tx_hash, log_index)))
    }

    async fn get_nonce_and_height(&self, val_id: ValidatorId) -> RelayResult<Option<(u64, u64)>> {
        self.gate()?;
        Ok(self.state.lock().nonces.get(&val_id).copied())
    }

    async fn recent_stake_tx_count(
        &self,
        val_id: ValidatorId,
        _lookback_blocks: u64,
    ) -> RelayResult<usize> {
        self.gate()?;
        Ok(self.state.lock().recent.get(&val_id).copied().unwrap_or(0))
    }

    async fn unconfirmed_txs(&self) -> RelayResult<Vec<Vec<u8>>> {
        self.gate()?;
        Ok(self.state.lock().pending.clone())
    }
}

/// Records every broadcast msg.  Answers with queued responses first, then
/// succeeds.
#[derive(Debug, Default)]
pub(crate) struct MockBroadcaster {
    sent: Mutex<Vec<Msg>>,
    responses: Mutex<VecDeque<Result<TxHash, BroadcastError>>>,
}

impl MockBroadcaster {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_response(&self, res: Result<TxHash, BroadcastError>) {
        self.responses.lock().push_back(res);
    }

    pub(crate) fn sent(&self) -> Vec<Msg> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl TxBroadcaster for MockBroadcaster {
    async fn broadcast(&self, msg: Msg) -> Result<TxHash, BroadcastError> {
        let hash = Tx::new(msg.clone()).compute_hash();
        self.sent.lock().push(msg);
        self.responses.lock().pop_front().unwrap_or(Ok(hash))
    }
}

pub(crate) fn chain_log(tx: u8, log_index: u64, block_number: u64, event: ChainEvent) -> ChainLog {
    ChainLog {
        tx_hash: Buf32::from([tx; 32]),
        log_index,
        block_number,
        event,
    }
}
