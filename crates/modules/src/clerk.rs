//! State-sync event records.

use std::sync::Arc;

use async_trait::async_trait;
use heimdall_chainio::{
    traits::ChainReader,
    types::{ChainEvent, EventKind},
    ClientResult,
};
use heimdall_db::{traits::ClerkDatabase, DbResult};
use heimdall_primitives::{
    buf::TxHash,
    params::{ChainParams, MAX_STATE_SYNC_SIZE},
};
use heimdall_sidetx::{BlockContext, ModuleEvent, PostHandler, PostTxError, SideHandler};
use heimdall_state::{
    clerk::{ClerkGenesis, EventRecord, MsgEventRecord},
    msg::Msg,
    vote::{SideTxResult, Vote},
};
use tracing::*;

use crate::{
    chain::{self, LogRef},
    errors::ModuleResult,
};

/// Upper bound on the page size of record list queries.
pub const MAX_RECORD_LIST_LIMIT: usize = 50;

pub struct ClerkKeeper<D, R> {
    db: Arc<D>,
    reader: Arc<R>,
    params: ChainParams,
}

impl<D: ClerkDatabase, R: ChainReader> ClerkKeeper<D, R> {
    pub fn new(db: Arc<D>, reader: Arc<R>, params: ChainParams) -> Self {
        Self { db, reader, params }
    }

    async fn vote_event_record(&self, msg: &MsgEventRecord) -> ClientResult<Vote> {
        if msg.chain_id != self.params.bor_chain_id {
            debug!(id = msg.id, chain_id = %msg.chain_id, "event record for another bor chain");
            return Ok(Vote::No);
        }

        let log = LogRef {
            tx_hash: msg.tx_hash,
            log_index: msg.log_index,
            block_number: msg.block_number,
        };
        let event = chain::fetch_event(
            self.reader.as_ref(),
            log,
            self.params.main_chain_tx_confirmations,
            EventKind::StateSynced,
        )
        .await?;

        let Some(ChainEvent::StateSynced { id, contract, data }) = event else {
            return Ok(Vote::No);
        };

        if id != msg.id || contract != msg.contract_address {
            debug!(id = msg.id, event_id = id, "event record does not match state synced event");
            return Ok(Vote::No);
        }

        // Oversized payloads are only accepted in their emptied form.
        let data_ok = if data.len() > MAX_STATE_SYNC_SIZE {
            msg.data.is_empty()
        } else {
            data == msg.data
        };
        if !data_ok {
            debug!(id = msg.id, event_len = data.len(), msg_len = msg.data.len(), "event record data mismatch");
        }

        Ok(Vote::from_bool(data_ok))
    }

    fn apply_event_record(
        &self,
        ctx: &BlockContext,
        msg: &MsgEventRecord,
    ) -> Result<Vec<ModuleEvent>, PostTxError> {
        if self.db.has_event_record(msg.id)? {
            debug!(id = msg.id, "event record already applied, skipping");
            return Ok(Vec::new());
        }

        let sequence = msg.sequence().ok_or_else(|| {
            PostTxError::Invariant(format!(
                "event record {} has invalid log position ({}, {})",
                msg.id, msg.block_number, msg.log_index
            ))
        })?;

        let record = msg.to_event_record(ctx.block_time);
        self.db.put_event_record(record)?;
        self.db.put_record_sequence(sequence)?;

        info!(id = msg.id, tx = %msg.tx_hash, record_time = ctx.block_time, "committed event record");
        Ok(vec![ModuleEvent::Record {
            id: msg.id,
            contract: msg.contract_address,
            tx_hash: msg.tx_hash,
            log_index: msg.log_index,
            record_time: ctx.block_time,
        }])
    }

    pub fn get_event_record(&self, id: u64) -> DbResult<Option<EventRecord>> {
        self.db.get_event_record(id)
    }

    /// Records ascending by id.  Pages start at 1.
    pub fn get_event_record_list(&self, page: usize, limit: usize) -> DbResult<Vec<EventRecord>> {
        let (offset, limit) = page_bounds(page, limit);
        self.db.get_event_records(offset, limit)
    }

    /// Records with `from <= record_time < to`, ascending by time then id.
    pub fn get_event_record_list_with_time(
        &self,
        from: u64,
        to: u64,
        page: usize,
        limit: usize,
    ) -> DbResult<Vec<EventRecord>> {
        let (offset, limit) = page_bounds(page, limit);
        self.db.get_event_records_by_time(from, to, offset, limit)
    }

    pub fn get_event_record_count(&self) -> DbResult<u64> {
        self.db.get_event_record_count()
    }

    /// Checks if the state-sync log at `(tx_hash, log_index)` was already
    /// accepted.
    pub async fn is_old_tx(&self, tx_hash: TxHash, log_index: u64) -> ModuleResult<bool> {
        let sequence = chain::log_sequence(
            self.reader.as_ref(),
            tx_hash,
            log_index,
            self.params.main_chain_tx_confirmations,
        )
        .await?;
        Ok(self.db.has_record_sequence(sequence)?)
    }

    pub fn init_genesis(&self, genesis: &ClerkGenesis) -> ModuleResult<()> {
        for record in &genesis.event_records {
            self.db.put_event_record(record.clone())?;
        }

        for seq in &genesis.record_sequences {
            self.db.put_record_sequence(*seq)?;
        }

        info!(
            records = genesis.event_records.len(),
            sequences = genesis.record_sequences.len(),
            "initialized clerk genesis"
        );
        Ok(())
    }

    pub fn export_genesis(&self) -> ModuleResult<ClerkGenesis> {
        let count = self.db.get_event_record_count()? as usize;
        Ok(ClerkGenesis {
            event_records: self.db.get_event_records(0, count)?,
            record_sequences: self.db.get_record_sequences()?,
        })
    }
}

fn page_bounds(page: usize, limit: usize) -> (usize, usize) {
    let limit = limit.min(MAX_RECORD_LIST_LIMIT);
    let offset = page.saturating_sub(1).saturating_mul(limit);
    (offset, limit)
}

#[async_trait]
impl<D, R> SideHandler for ClerkKeeper<D, R>
where
    D: ClerkDatabase + Send + Sync + 'static,
    R: ChainReader,
{
    async fn side_handle(&self, _ctx: &BlockContext, msg: &Msg) -> Vote {
        let Msg::EventRecord(msg) = msg else {
            warn!(method = msg.method_name(), "clerk got foreign msg");
            return Vote::No;
        };

        match self.vote_event_record(msg).await {
            Ok(vote) => vote,
            Err(err) => {
                warn!(id = msg.id, %err, "chain reader failed, voting no");
                Vote::No
            }
        }
    }
}

impl<D, R> PostHandler for ClerkKeeper<D, R>
where
    D: ClerkDatabase + Send + Sync + 'static,
    R: ChainReader,
{
    fn post_handle(
        &self,
        ctx: &BlockContext,
        msg: &Msg,
        result: SideTxResult,
    ) -> Result<Vec<ModuleEvent>, PostTxError> {
        let Msg::EventRecord(msg) = msg else {
            return Err(PostTxError::WrongMsg(msg.method_name()));
        };

        if result != SideTxResult::Pass {
            debug!(id = msg.id, "event record skipped by tally");
            return Ok(Vec::new());
        }

        self.apply_event_record(ctx, msg)
    }
}
