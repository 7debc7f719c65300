use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use heimdall_chainio::types::{ChainEvent, ChainLog, EventKind};
use heimdall_state::{msg::Msg, stake::*};
use tracing::*;

use super::{Processor, ProcessorContext};
use crate::{
    client::{ConsensusClient, SyncModule, TxBroadcaster},
    errors::RelayResult,
    outcome::TaskOutcome,
};

/// Relays the staking lifecycle events.  Events for one validator must land
/// in nonce order, which is enforced here against consensus state rather
/// than by queue order, since several relayers may race on the same logs.
pub struct StakeProcessor<C, B> {
    ctx: Arc<ProcessorContext<C, B>>,
}

impl<C, B> StakeProcessor<C, B> {
    pub fn new(ctx: Arc<ProcessorContext<C, B>>) -> Self {
        Self { ctx }
    }
}

impl<C: ConsensusClient, B: TxBroadcaster> StakeProcessor<C, B> {
    /// Checks the event nonce against the validator's current nonce.
    /// Returns the outcome to stop with, or `None` if the event is next.
    async fn check_order(&self, val_id: ValidatorId, nonce: u64) -> RelayResult<Option<TaskOutcome>> {
        let current = self
            .ctx
            .consensus
            .get_nonce_and_height(val_id)
            .await?
            .map(|(n, _)| n)
            .unwrap_or(0);

        if nonce <= current {
            debug!(%val_id, %nonce, %current, "staking nonce already applied, dropping");
            return Ok(Some(TaskOutcome::Committed));
        }

        if nonce != current + 1 {
            let delay = nonce_gap_delay(
                nonce - current,
                self.ctx.config.max_nonce_gap_factor,
                self.ctx.config.retry_unit_delay(),
            );
            debug!(%val_id, %nonce, %current, ?delay, "staking nonce ahead of state, waiting");
            return Ok(Some(TaskOutcome::RetryAfter(delay)));
        }

        let recent = self
            .ctx
            .consensus
            .recent_stake_tx_count(val_id, self.ctx.config.stake_lookback_blocks)
            .await?;
        if recent > 0 {
            debug!(%val_id, %recent, "recent staking txs for validator, waiting");
            return Ok(Some(TaskOutcome::RetryAfter(
                self.ctx.config.retry_unit_delay(),
            )));
        }

        Ok(None)
    }

    fn build_msg(&self, log: &ChainLog) -> Option<Msg> {
        let from = self.ctx.from;
        let (tx_hash, log_index, block_number) = (log.tx_hash, log.log_index, log.block_number);

        Some(match log.event.clone() {
            ChainEvent::Staked {
                validator_id,
                signer_pubkey,
                activation_epoch,
                amount,
                nonce,
            } => Msg::ValidatorJoin(MsgValidatorJoin {
                from,
                val_id: validator_id,
                activation_epoch,
                amount,
                signer_pubkey,
                tx_hash,
                log_index,
                block_number,
                nonce,
            }),
            ChainEvent::StakeUpdate {
                validator_id,
                new_amount,
                nonce,
            } => Msg::StakeUpdate(MsgStakeUpdate {
                from,
                val_id: validator_id,
                new_amount,
                tx_hash,
                log_index,
                block_number,
                nonce,
            }),
            ChainEvent::SignerChange {
                validator_id,
                new_signer_pubkey,
                nonce,
            } => Msg::SignerUpdate(MsgSignerUpdate {
                from,
                val_id: validator_id,
                new_signer_pubkey,
                tx_hash,
                log_index,
                block_number,
                nonce,
            }),
            ChainEvent::UnstakeInit {
                validator_id,
                deactivation_epoch,
                nonce,
            } => Msg::ValidatorExit(MsgValidatorExit {
                from,
                val_id: validator_id,
                deactivation_epoch,
                tx_hash,
                log_index,
                block_number,
                nonce,
            }),
            _ => return None,
        })
    }
}

/// Delay before retrying an event whose nonce is `gap` ahead of state.
fn nonce_gap_delay(gap: u64, max_factor: u64, unit: Duration) -> Duration {
    let factor = gap.min(max_factor).min(u32::MAX as u64) as u32;
    unit.saturating_mul(factor)
}

#[async_trait]
impl<C: ConsensusClient, B: TxBroadcaster> Processor for StakeProcessor<C, B> {
    fn name(&self) -> &'static str {
        "stake-processor"
    }

    fn handles(&self, kind: EventKind) -> bool {
        matches!(
            kind,
            EventKind::Staked
                | EventKind::StakeUpdate
                | EventKind::SignerChange
                | EventKind::UnstakeInit
        )
    }

    async fn process(&self, log: &ChainLog) -> RelayResult<TaskOutcome> {
        let Some((val_id, nonce)) = log.event.staking_nonce() else {
            return Ok(TaskOutcome::failed("not a staking event"));
        };
        let Some(msg) = self.build_msg(log) else {
            return Ok(TaskOutcome::failed("not a staking event"));
        };

        if let Some(outcome) = self.ctx.precheck(SyncModule::Stake, log).await? {
            return Ok(outcome);
        }

        if let Some(outcome) = self.check_order(val_id, nonce).await? {
            return Ok(outcome);
        }

        self.ctx.submit(msg).await
    }
}

#[cfg(test)]
mod tests {
    use heimdall_config::relayer::RelayerConfig;
    use heimdall_primitives::buf::{Buf20, Buf32};

    use super::*;
    use crate::test_utils::{chain_log, MockBroadcaster, MockConsensus};

    struct Setup {
        consensus: Arc<MockConsensus>,
        broadcaster: Arc<MockBroadcaster>,
        processor: StakeProcessor<MockConsensus, MockBroadcaster>,
    }

    fn setup() -> Setup {
        let consensus = Arc::new(MockConsensus::new());
        let broadcaster = Arc::new(MockBroadcaster::new());
        let ctx = ProcessorContext::new(
            consensus.clone(),
            broadcaster.clone(),
            RelayerConfig::default(),
            Buf20::from([0x11; 20]),
            "137".to_string(),
        );
        Setup {
            consensus,
            broadcaster,
            processor: StakeProcessor::new(Arc::new(ctx)),
        }
    }

    fn stake_update(tx: u8, nonce: u64) -> ChainLog {
        chain_log(
            tx,
            0,
            200 + nonce,
            ChainEvent::StakeUpdate {
                validator_id: 3,
                new_amount: 1_000,
                nonce,
            },
        )
    }

    fn unit() -> Duration {
        RelayerConfig::default().retry_unit_delay()
    }

    #[test]
    fn test_nonce_gap_delay_is_capped() {
        let unit = Duration::from_secs(1);
        assert_eq!(nonce_gap_delay(2, 10, unit), Duration::from_secs(2));
        assert_eq!(nonce_gap_delay(10, 10, unit), Duration::from_secs(10));
        assert_eq!(nonce_gap_delay(500, 10, unit), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_out_of_order_nonce_waits_instead_of_broadcasting() {
        let s = setup();
        s.consensus.set_nonce(3, 4);

        // Nonce 7 arrives before 5 and 6.
        let out = s.processor.process(&stake_update(0x07, 7)).await.unwrap();
        assert_eq!(out, TaskOutcome::RetryAfter(unit() * 3));
        assert!(s.broadcaster.sent().is_empty());

        let out = s.processor.process(&stake_update(0x05, 5)).await.unwrap();
        assert_eq!(out, TaskOutcome::Committed);
        assert_eq!(s.broadcaster.sent().len(), 1);
        assert_eq!(s.broadcaster.sent()[0].staking_validator(), Some(3));
    }

    #[tokio::test]
    async fn test_nonces_relay_only_in_sequence() {
        let s = setup();
        s.consensus.set_nonce(3, 0);
        let logs: Vec<_> = (1..=3).map(|n| stake_update(n as u8, n)).collect();

        // Deliver in reverse order and only let state advance on commit.
        let mut pending: Vec<_> = logs.iter().rev().collect();
        let mut relayed = Vec::new();
        while !pending.is_empty() {
            let mut still = Vec::new();
            for log in pending {
                match s.processor.process(log).await.unwrap() {
                    TaskOutcome::Committed => {
                        let (_, nonce) = log.event.staking_nonce().unwrap();
                        relayed.push(nonce);
                        s.consensus.set_nonce(3, nonce);
                    }
                    TaskOutcome::RetryAfter(_) => still.push(log),
                    TaskOutcome::Failed(r) => panic!("unexpected failure {r}"),
                }
            }
            pending = still;
        }

        assert_eq!(relayed, vec![1, 2, 3]);
        let sent_nonces: Vec<_> = s
            .broadcaster
            .sent()
            .iter()
            .map(|m| match m {
                Msg::StakeUpdate(m) => m.nonce,
                other => panic!("unexpected msg {other:?}"),
            })
            .collect();
        assert_eq!(sent_nonces, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_applied_nonce_is_dropped() {
        let s = setup();
        s.consensus.set_nonce(3, 5);

        let out = s.processor.process(&stake_update(0x05, 5)).await.unwrap();

        assert_eq!(out, TaskOutcome::Committed);
        assert!(s.broadcaster.sent().is_empty());
    }

    #[tokio::test]
    async fn test_recent_stake_tx_waits() {
        let s = setup();
        s.consensus.set_nonce(3, 4);
        s.consensus.set_recent(3, 1);

        let out = s.processor.process(&stake_update(0x05, 5)).await.unwrap();

        assert_eq!(out, TaskOutcome::RetryAfter(unit()));
        assert!(s.broadcaster.sent().is_empty());
    }

    #[tokio::test]
    async fn test_join_for_unknown_validator() {
        let s = setup();
        let log = chain_log(
            0x01,
            4,
            90,
            ChainEvent::Staked {
                validator_id: 9,
                signer_pubkey: Buf32::from([0x42; 32]),
                activation_epoch: 12,
                amount: 10_000,
                nonce: 1,
            },
        );

        assert_eq!(s.processor.process(&log).await.unwrap(), TaskOutcome::Committed);
        let sent = s.broadcaster.sent();
        let Msg::ValidatorJoin(m) = &sent[0] else {
            panic!("expected join, got {:?}", sent[0]);
        };
        assert_eq!(m.val_id, 9);
        assert_eq!(m.nonce, 1);
        assert_eq!(m.activation_epoch, 12);
    }

    #[tokio::test]
    async fn test_old_staking_log_skips_nonce_lookup() {
        let s = setup();
        let log = stake_update(0x05, 5);
        s.consensus.mark_old(SyncModule::Stake, log.tx_hash, log.log_index);

        assert_eq!(s.processor.process(&log).await.unwrap(), TaskOutcome::Committed);
        assert!(s.broadcaster.sent().is_empty());
    }

    #[tokio::test]
    async fn test_non_staking_event_fails() {
        let s = setup();
        let log = chain_log(
            0x01,
            0,
            1,
            ChainEvent::TopUpFee {
                user: Buf20::from([1; 20]),
                fee: 1,
            },
        );

        assert!(matches!(
            s.processor.process(&log).await.unwrap(),
            TaskOutcome::Failed(_)
        ));
    }
}
