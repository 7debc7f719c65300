//! Per-event-family processors.  Each turns one confirmed rootchain log
//! into at most one Heimdall msg, going through the same steps: drop logs
//! that were already applied, wait out identical txs in the mempool, order
//! against consensus state, then submit.

use std::sync::Arc;

use async_trait::async_trait;
use heimdall_chainio::types::{ChainLog, EventKind};
use heimdall_config::relayer::RelayerConfig;
use heimdall_primitives::buf::Address;
use heimdall_state::msg::Msg;
use tracing::*;

use crate::{
    client::{ConsensusClient, SyncModule, TxBroadcaster},
    errors::{BroadcastError, RelayError, RelayResult},
    mempool::is_in_flight,
    outcome::TaskOutcome,
};

mod clerk;
mod fee;
mod stake;

pub use clerk::ClerkProcessor;
pub use fee::FeeProcessor;
pub use stake::StakeProcessor;

#[async_trait]
pub trait Processor: Send + Sync + 'static {
    /// Name used for the worker task and in logs.
    fn name(&self) -> &'static str;

    /// Whether logs of this kind are routed here.
    fn handles(&self, kind: EventKind) -> bool;

    /// Runs one attempt at relaying the log.  `Err` is only returned for
    /// transport failures.
    async fn process(&self, log: &ChainLog) -> RelayResult<TaskOutcome>;
}

/// Dependencies shared by all processors.
pub struct ProcessorContext<C, B> {
    consensus: Arc<C>,
    broadcaster: Arc<B>,
    config: RelayerConfig,

    /// Relayer account the msgs are sent from.
    from: Address,
    bor_chain_id: String,
}

impl<C: ConsensusClient, B: TxBroadcaster> ProcessorContext<C, B> {
    pub fn new(
        consensus: Arc<C>,
        broadcaster: Arc<B>,
        config: RelayerConfig,
        from: Address,
        bor_chain_id: String,
    ) -> Self {
        Self {
            consensus,
            broadcaster,
            config,
            from,
            bor_chain_id,
        }
    }

    /// Checks the log against consensus dedup state and the mempool.
    /// Returns the outcome to stop with, or `None` to carry on.
    async fn precheck(
        &self,
        module: SyncModule,
        log: &ChainLog,
    ) -> RelayResult<Option<TaskOutcome>> {
        if self
            .consensus
            .is_old_tx(module, log.tx_hash, log.log_index)
            .await?
        {
            debug!(tx_hash = %log.tx_hash, log_index = log.log_index, "log already applied, dropping");
            return Ok(Some(TaskOutcome::Committed));
        }

        let pending = self.consensus.unconfirmed_txs().await?;
        if is_in_flight(&pending, log.tx_hash, log.log_index) {
            debug!(tx_hash = %log.tx_hash, log_index = log.log_index, "identical tx in mempool, waiting");
            return Ok(Some(TaskOutcome::RetryAfter(
                self.config.mempool_retry_delay(),
            )));
        }

        Ok(None)
    }

    /// Checks the msg and broadcasts it.
    async fn submit(&self, msg: Msg) -> RelayResult<TaskOutcome> {
        if let Err(err) = msg.validate_basic() {
            return Ok(TaskOutcome::failed(format!("invalid msg: {err}")));
        }

        let method = msg.method_name();
        match self.broadcaster.broadcast(msg).await {
            Ok(hash) => {
                info!(%method, tx = %hash, "broadcast relayed msg");
                Ok(TaskOutcome::Committed)
            }
            Err(BroadcastError::Rejected(reason)) => Ok(TaskOutcome::Failed(reason)),
            Err(BroadcastError::AccountNotProvisioned) => {
                warn!(%method, "relayer account not provisioned yet, retrying later");
                Ok(TaskOutcome::RetryAfter(self.config.retry_unit_delay()))
            }
            Err(BroadcastError::Transport(e)) => Err(RelayError::Broadcast(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use heimdall_primitives::buf::{Buf20, Buf32};
    use heimdall_state::{msg::Msg, topup::MsgTopupTx};

    use super::*;
    use crate::test_utils::{MockBroadcaster, MockConsensus};

    fn topup_msg() -> Msg {
        Msg::TopupTx(MsgTopupTx {
            proposer: Buf20::from([1; 20]),
            user: Buf20::from([2; 20]),
            fee: 10,
            tx_hash: Buf32::from([3; 32]),
            log_index: 0,
            block_number: 9,
        })
    }

    fn ctx(b: Arc<MockBroadcaster>) -> ProcessorContext<MockConsensus, MockBroadcaster> {
        ProcessorContext::new(
            Arc::new(MockConsensus::new()),
            b,
            RelayerConfig::default(),
            Buf20::from([1; 20]),
            "137".to_string(),
        )
    }

    #[tokio::test]
    async fn test_submit_maps_broadcast_errors() {
        let b = Arc::new(MockBroadcaster::new());
        let ctx = ctx(b.clone());

        b.push_response(Err(BroadcastError::Rejected("bad fee".into())));
        assert_eq!(
            ctx.submit(topup_msg()).await.unwrap(),
            TaskOutcome::Failed("bad fee".into())
        );

        b.push_response(Err(BroadcastError::AccountNotProvisioned));
        assert_eq!(
            ctx.submit(topup_msg()).await.unwrap(),
            TaskOutcome::RetryAfter(RelayerConfig::default().retry_unit_delay())
        );

        b.push_response(Err(BroadcastError::Transport("conn reset".into())));
        assert!(matches!(
            ctx.submit(topup_msg()).await,
            Err(RelayError::Broadcast(_))
        ));

        assert_eq!(ctx.submit(topup_msg()).await.unwrap(), TaskOutcome::Committed);
        assert_eq!(b.sent().len(), 4);
    }

    #[tokio::test]
    async fn test_submit_skips_invalid_msg() {
        let b = Arc::new(MockBroadcaster::new());
        let ctx = ctx(b.clone());

        let Msg::TopupTx(mut m) = topup_msg() else {
            unreachable!()
        };
        m.user = Buf20::zero();

        assert!(matches!(
            ctx.submit(Msg::TopupTx(m)).await.unwrap(),
            TaskOutcome::Failed(_)
        ));
        assert!(b.sent().is_empty());
    }
}
