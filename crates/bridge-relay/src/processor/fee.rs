use std::sync::Arc;

use async_trait::async_trait;
use heimdall_chainio::types::{ChainEvent, ChainLog, EventKind};
use heimdall_state::{msg::Msg, topup::MsgTopupTx};

use super::{Processor, ProcessorContext};
use crate::{
    client::{ConsensusClient, SyncModule, TxBroadcaster},
    errors::RelayResult,
    outcome::TaskOutcome,
};

/// Relays `TopUpFee` events as fee top-ups.
pub struct FeeProcessor<C, B> {
    ctx: Arc<ProcessorContext<C, B>>,
}

impl<C, B> FeeProcessor<C, B> {
    pub fn new(ctx: Arc<ProcessorContext<C, B>>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl<C: ConsensusClient, B: TxBroadcaster> Processor for FeeProcessor<C, B> {
    fn name(&self) -> &'static str {
        "fee-processor"
    }

    fn handles(&self, kind: EventKind) -> bool {
        kind == EventKind::TopUpFee
    }

    async fn process(&self, log: &ChainLog) -> RelayResult<TaskOutcome> {
        let ChainEvent::TopUpFee { user, fee } = &log.event else {
            return Ok(TaskOutcome::failed("not a top-up event"));
        };

        if let Some(outcome) = self.ctx.precheck(SyncModule::Topup, log).await? {
            return Ok(outcome);
        }

        let msg = MsgTopupTx {
            proposer: self.ctx.from,
            user: *user,
            fee: *fee,
            tx_hash: log.tx_hash,
            log_index: log.log_index,
            block_number: log.block_number,
        };
        self.ctx.submit(Msg::TopupTx(msg)).await
    }
}
