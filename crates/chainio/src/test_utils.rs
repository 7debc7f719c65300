use std::{collections::HashMap, future, sync::Arc};

use async_trait::async_trait;
use heimdall_primitives::buf::{Buf32, TxHash};
use parking_lot::RwLock;

use crate::{
    traits::ChainReader,
    types::{ChainEvent, ChainLog, EventKind, Receipt, ReceiptLog, RootchainHeaderBlock},
    ClientError, ClientResult,
};

#[derive(Debug, Default)]
struct InnerState {
    /// Receipt and its current confirmation depth.
    receipts: HashMap<TxHash, (Receipt, u64)>,
    events: HashMap<(TxHash, u64), ChainEvent>,
    logs: Vec<ChainLog>,
    tip: u64,
    root_hashes: HashMap<(u64, u64), Buf32>,
    header_blocks: HashMap<u64, RootchainHeaderBlock>,
    stall: bool,
    fail: Option<ClientError>,
}

/// In-memory chain reader.  Cloning shares the underlying chain.
#[derive(Debug, Clone, Default)]
pub struct TestChainReader {
    state: Arc<RwLock<InnerState>>,
}

impl TestChainReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an event at `(tx_hash, log_index)` in `block_number`, buried
    /// under `confirmations` blocks.
    pub fn add_event(
        &self,
        tx_hash: TxHash,
        block_number: u64,
        log_index: u64,
        event: ChainEvent,
        confirmations: u64,
    ) {
        let mut st = self.state.write();
        let (receipt, confs) = st.receipts.entry(tx_hash).or_insert_with(|| {
            (
                Receipt {
                    tx_hash,
                    block_number,
                    logs: Vec::new(),
                },
                confirmations,
            )
        });
        *confs = confirmations;
        receipt.logs.push(ReceiptLog {
            log_index,
            address: Default::default(),
            topics: Vec::new(),
            data: Vec::new(),
        });

        st.events.insert((tx_hash, log_index), event.clone());
        st.logs.push(ChainLog {
            tx_hash,
            log_index,
            block_number,
            event,
        });
        st.logs.sort_by_key(|l| (l.block_number, l.log_index));
        st.tip = st.tip.max(block_number + confirmations);
    }

    pub fn set_confirmations(&self, tx_hash: TxHash, confirmations: u64) {
        if let Some((_, confs)) = self.state.write().receipts.get_mut(&tx_hash) {
            *confs = confirmations;
        }
    }

    pub fn set_tip(&self, tip: u64) {
        self.state.write().tip = tip;
    }

    pub fn set_root_hash(&self, start: u64, end: u64, root: Buf32) {
        self.state.write().root_hashes.insert((start, end), root);
    }

    pub fn set_header_block(&self, block: RootchainHeaderBlock) {
        self.state.write().header_blocks.insert(block.number, block);
    }

    /// Makes every async query hang forever.
    pub fn set_stall(&self, stall: bool) {
        self.state.write().stall = stall;
    }

    /// Makes every async query fail with `err`, or clears the failure.
    pub fn set_fail(&self, err: Option<ClientError>) {
        self.state.write().fail = err;
    }

    async fn gate(&self) -> ClientResult<()> {
        let (stall, fail) = {
            let st = self.state.read();
            (st.stall, st.fail.clone())
        };

        if stall {
            future::pending::<()>().await;
        }

        match fail {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ChainReader for TestChainReader {
    async fn get_confirmed_receipt(
        &self,
        tx_hash: TxHash,
        confirmations: u64,
    ) -> ClientResult<Option<Receipt>> {
        self.gate().await?;
        let st = self.state.read();
        Ok(st
            .receipts
            .get(&tx_hash)
            .filter(|(_, confs)| *confs >= confirmations)
            .map(|(r, _)| r.clone()))
    }

    fn decode_event(
        &self,
        receipt: &Receipt,
        log_index: u64,
        kind: EventKind,
    ) -> Option<ChainEvent> {
        receipt.log(log_index)?;
        self.state
            .read()
            .events
            .get(&(receipt.tx_hash, log_index))
            .filter(|ev| ev.kind() == kind)
            .cloned()
    }

    async fn latest_block_number(&self) -> ClientResult<u64> {
        self.gate().await?;
        Ok(self.state.read().tip)
    }

    async fn get_logs(&self, from: u64, to: u64) -> ClientResult<Vec<ChainLog>> {
        self.gate().await?;
        Ok(self
            .state
            .read()
            .logs
            .iter()
            .filter(|l| l.block_number >= from && l.block_number <= to)
            .cloned()
            .collect())
    }

    async fn get_root_hash(
        &self,
        start: u64,
        end: u64,
        _confirmations: u64,
    ) -> ClientResult<Option<Buf32>> {
        self.gate().await?;
        Ok(self.state.read().root_hashes.get(&(start, end)).copied())
    }

    async fn get_header_block(
        &self,
        number: u64,
        _confirmations: u64,
    ) -> ClientResult<Option<RootchainHeaderBlock>> {
        self.gate().await?;
        Ok(self.state.read().header_blocks.get(&number).cloned())
    }
}
