use std::sync::Arc;

use async_trait::async_trait;
use heimdall_chainio::types::{ChainEvent, ChainLog, EventKind};
use heimdall_state::{
    clerk::{cap_state_sync_data, MsgEventRecord},
    msg::Msg,
};
use tracing::*;

use super::{Processor, ProcessorContext};
use crate::{
    client::{ConsensusClient, SyncModule, TxBroadcaster},
    errors::RelayResult,
    outcome::TaskOutcome,
};

/// Relays `StateSynced` events as event records.
pub struct ClerkProcessor<C, B> {
    ctx: Arc<ProcessorContext<C, B>>,
}

impl<C, B> ClerkProcessor<C, B> {
    pub fn new(ctx: Arc<ProcessorContext<C, B>>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl<C: ConsensusClient, B: TxBroadcaster> Processor for ClerkProcessor<C, B> {
    fn name(&self) -> &'static str {
        "clerk-processor"
    }

    fn handles(&self, kind: EventKind) -> bool {
        kind == EventKind::StateSynced
    }

    async fn process(&self, log: &ChainLog) -> RelayResult<TaskOutcome> {
        let ChainEvent::StateSynced { id, contract, data } = &log.event else {
            return Ok(TaskOutcome::failed("not a state-sync event"));
        };

        if let Some(outcome) = self.ctx.precheck(SyncModule::Clerk, log).await? {
            return Ok(outcome);
        }

        let data = cap_state_sync_data(data.clone());
        if data.is_empty() {
            debug!(%id, "relaying state sync with empty payload");
        }

        let msg = MsgEventRecord {
            from: self.ctx.from,
            tx_hash: log.tx_hash,
            log_index: log.log_index,
            block_number: log.block_number,
            contract_address: *contract,
            data,
            id: *id,
            chain_id: self.ctx.bor_chain_id.clone(),
        };
        self.ctx.submit(Msg::EventRecord(msg)).await
    }
}
