//! Validator set changes driven by rootchain staking events.
//!
//! Every lifecycle event carries the validator's staking nonce.  Events are
//! only accepted in nonce order, so a validator's state never skips one.

use std::sync::Arc;

use async_trait::async_trait;
use heimdall_chainio::{
    traits::ChainReader,
    types::{ChainEvent, EventKind},
};
use heimdall_db::{traits::StakeDatabase, DbResult};
use heimdall_primitives::{buf::TxHash, params::ChainParams};
use heimdall_sidetx::{BlockContext, ModuleEvent, PostHandler, PostTxError, SideHandler};
use heimdall_state::{
    msg::Msg,
    stake::{power_from_amount, signer_address, Validator, ValidatorId},
    vote::{SideTxResult, Vote},
};
use tracing::*;

use crate::{
    chain::{self, LogRef},
    errors::ModuleResult,
};

/// Fields every staking lifecycle msg has.
struct StakingRef {
    val_id: ValidatorId,
    nonce: u64,
    log: LogRef,
    sequence: Option<u64>,
    kind: EventKind,
}

fn staking_ref(msg: &Msg) -> Option<StakingRef> {
    macro_rules! sref {
        ($m:expr, $kind:expr) => {
            StakingRef {
                val_id: $m.val_id,
                nonce: $m.nonce,
                log: LogRef {
                    tx_hash: $m.tx_hash,
                    log_index: $m.log_index,
                    block_number: $m.block_number,
                },
                sequence: $m.sequence(),
                kind: $kind,
            }
        };
    }

    Some(match msg {
        Msg::ValidatorJoin(m) => sref!(m, EventKind::Staked),
        Msg::StakeUpdate(m) => sref!(m, EventKind::StakeUpdate),
        Msg::SignerUpdate(m) => sref!(m, EventKind::SignerChange),
        Msg::ValidatorExit(m) => sref!(m, EventKind::UnstakeInit),
        _ => return None,
    })
}

/// Checks that a decoded staking event says what the msg claims.
fn event_matches(msg: &Msg, event: &ChainEvent) -> bool {
    match (msg, event) {
        (
            Msg::ValidatorJoin(m),
            ChainEvent::Staked {
                validator_id,
                signer_pubkey,
                activation_epoch,
                amount,
                nonce,
            },
        ) => {
            m.val_id == *validator_id
                && m.signer_pubkey == *signer_pubkey
                && m.activation_epoch == *activation_epoch
                && m.amount == *amount
                && m.nonce == *nonce
        }
        (
            Msg::StakeUpdate(m),
            ChainEvent::StakeUpdate {
                validator_id,
                new_amount,
                nonce,
            },
        ) => m.val_id == *validator_id && m.new_amount == *new_amount && m.nonce == *nonce,
        (
            Msg::SignerUpdate(m),
            ChainEvent::SignerChange {
                validator_id,
                new_signer_pubkey,
                nonce,
            },
        ) => {
            m.val_id == *validator_id
                && m.new_signer_pubkey == *new_signer_pubkey
                && m.nonce == *nonce
        }
        (
            Msg::ValidatorExit(m),
            ChainEvent::UnstakeInit {
                validator_id,
                deactivation_epoch,
                nonce,
            },
        ) => {
            m.val_id == *validator_id
                && m.deactivation_epoch == *deactivation_epoch
                && m.nonce == *nonce
        }
        _ => false,
    }
}

pub struct StakeKeeper<D, R> {
    db: Arc<D>,
    reader: Arc<R>,
    params: ChainParams,
}

impl<D: StakeDatabase, R: ChainReader> StakeKeeper<D, R> {
    pub fn new(db: Arc<D>, reader: Arc<R>, params: ChainParams) -> Self {
        Self { db, reader, params }
    }

    async fn vote_staking(&self, msg: &Msg, sref: StakingRef) -> ModuleResult<Vote> {
        let Some(sequence) = sref.sequence else {
            return Ok(Vote::No);
        };

        if self.db.has_stake_sequence(sequence)? {
            debug!(val_id = sref.val_id, %sequence, "staking event already applied");
            return Ok(Vote::No);
        }

        let validator = self.db.get_validator(sref.val_id)?;
        match (msg, &validator) {
            (Msg::ValidatorJoin(_), Some(_)) => {
                debug!(val_id = sref.val_id, "validator already joined");
                return Ok(Vote::No);
            }
            (Msg::ValidatorJoin(_), None) => {}
            (_, None) => {
                debug!(val_id = sref.val_id, "unknown validator");
                return Ok(Vote::No);
            }
            (_, Some(v)) if v.is_exiting() => {
                debug!(val_id = sref.val_id, end_epoch = v.end_epoch, "validator is exiting");
                return Ok(Vote::No);
            }
            _ => {}
        }

        let current = validator.map(|v| v.nonce).unwrap_or(0);
        if sref.nonce != current + 1 {
            debug!(val_id = sref.val_id, nonce = sref.nonce, %current, "out of order staking nonce");
            return Ok(Vote::No);
        }

        let event = chain::fetch_event(
            self.reader.as_ref(),
            sref.log,
            self.params.main_chain_tx_confirmations,
            sref.kind,
        )
        .await?;

        Ok(Vote::from_bool(
            event.is_some_and(|ev| event_matches(msg, &ev)),
        ))
    }

    fn apply_staking(
        &self,
        ctx: &BlockContext,
        msg: &Msg,
        sref: StakingRef,
    ) -> Result<Vec<ModuleEvent>, PostTxError> {
        let sequence = sref.sequence.ok_or_else(|| {
            PostTxError::Invariant(format!(
                "staking msg for validator {} has invalid log position",
                sref.val_id
            ))
        })?;

        if self.db.has_stake_sequence(sequence)? {
            debug!(val_id = sref.val_id, %sequence, "staking event already applied, skipping");
            return Ok(Vec::new());
        }

        let existing = self.db.get_validator(sref.val_id)?;
        let (mut validator, event) = match (msg, existing) {
            (Msg::ValidatorJoin(m), None) => {
                let signer = signer_address(&m.signer_pubkey);
                let power = power_from_amount(m.amount);
                let validator = Validator {
                    id: m.val_id,
                    signer,
                    pubkey: m.signer_pubkey,
                    power,
                    start_epoch: m.activation_epoch,
                    end_epoch: 0,
                    nonce: 0,
                    last_updated_height: 0,
                };
                let event = ModuleEvent::ValidatorJoined {
                    id: m.val_id,
                    signer,
                    power,
                };
                (validator, event)
            }
            (_, Some(v)) if !matches!(msg, Msg::ValidatorJoin(_)) && sref.nonce > v.nonce => {
                let mut v = v;
                let event = match msg {
                    Msg::StakeUpdate(m) => {
                        v.power = power_from_amount(m.new_amount);
                        ModuleEvent::StakeUpdated {
                            id: v.id,
                            power: v.power,
                        }
                    }
                    Msg::SignerUpdate(m) => {
                        v.pubkey = m.new_signer_pubkey;
                        v.signer = signer_address(&m.new_signer_pubkey);
                        ModuleEvent::SignerUpdated {
                            id: v.id,
                            signer: v.signer,
                        }
                    }
                    Msg::ValidatorExit(m) => {
                        v.end_epoch = m.deactivation_epoch;
                        ModuleEvent::ValidatorExiting {
                            id: v.id,
                            deactivation_epoch: m.deactivation_epoch,
                        }
                    }
                    _ => return Err(PostTxError::WrongMsg(msg.method_name())),
                };
                (v, event)
            }
            _ => {
                warn!(val_id = sref.val_id, nonce = sref.nonce, method = msg.method_name(), "staking msg does not apply, skipping");
                return Ok(Vec::new());
            }
        };

        validator.nonce = sref.nonce;
        validator.last_updated_height = ctx.height;
        self.db.put_validator(validator)?;
        self.db.put_stake_sequence(sequence)?;

        info!(val_id = sref.val_id, nonce = sref.nonce, method = msg.method_name(), "applied staking event");
        Ok(vec![event])
    }

    pub fn get_validator(&self, id: ValidatorId) -> DbResult<Option<Validator>> {
        self.db.get_validator(id)
    }

    pub fn get_validators(&self) -> DbResult<Vec<Validator>> {
        self.db.get_validators()
    }

    pub fn get_validator_nonce(&self, id: ValidatorId) -> DbResult<Option<u64>> {
        Ok(self.db.get_validator(id)?.map(|v| v.nonce))
    }

    /// Staking nonce and the height it was last bumped at.
    pub fn get_nonce_and_height(&self, id: ValidatorId) -> DbResult<Option<(u64, u64)>> {
        Ok(self
            .db
            .get_validator(id)?
            .map(|v| (v.nonce, v.last_updated_height)))
    }

    pub async fn is_old_tx(&self, tx_hash: TxHash, log_index: u64) -> ModuleResult<bool> {
        let sequence = chain::log_sequence(
            self.reader.as_ref(),
            tx_hash,
            log_index,
            self.params.main_chain_tx_confirmations,
        )
        .await?;
        Ok(self.db.has_stake_sequence(sequence)?)
    }
}

#[async_trait]
impl<D, R> SideHandler for StakeKeeper<D, R>
where
    D: StakeDatabase + Send + Sync + 'static,
    R: ChainReader,
{
    async fn side_handle(&self, _ctx: &BlockContext, msg: &Msg) -> Vote {
        let Some(sref) = staking_ref(msg) else {
            warn!(method = msg.method_name(), "stake got foreign msg");
            return Vote::No;
        };

        let val_id = sref.val_id;
        self.vote_staking(msg, sref).await.unwrap_or_else(|err| {
            warn!(%val_id, %err, "staking check failed, voting no");
            Vote::No
        })
    }
}

impl<D, R> PostHandler for StakeKeeper<D, R>
where
    D: StakeDatabase + Send + Sync + 'static,
    R: ChainReader,
{
    fn post_handle(
        &self,
        ctx: &BlockContext,
        msg: &Msg,
        result: SideTxResult,
    ) -> Result<Vec<ModuleEvent>, PostTxError> {
        let sref = staking_ref(msg).ok_or(PostTxError::WrongMsg(msg.method_name()))?;

        if result != SideTxResult::Pass {
            return Ok(Vec::new());
        }

        self.apply_staking(ctx, msg, sref)
    }
}

#[cfg(test)]
mod tests {
    use heimdall_chainio::test_utils::TestChainReader;
    use heimdall_db::stubs::StubStakeDb;
    use heimdall_primitives::buf::{Buf20, Buf32};
    use heimdall_state::stake::{MsgStakeUpdate, MsgValidatorExit, MsgValidatorJoin, POWER_REDUCTION};

    use super::*;
    use crate::test_utils::*;

    type Keeper = StakeKeeper<StubStakeDb, TestChainReader>;

    fn setup() -> (Keeper, TestChainReader) {
        let reader = TestChainReader::new();
        let keeper = StakeKeeper::new(
            Arc::new(StubStakeDb::new()),
            Arc::new(reader.clone()),
            ChainParams::default(),
        );
        (keeper, reader)
    }

    fn join_msg(reader: &TestChainReader) -> MsgValidatorJoin {
        let msg = MsgValidatorJoin {
            from: Buf20::from([1; 20]),
            val_id: 7,
            activation_epoch: 3,
            amount: POWER_REDUCTION * 25,
            signer_pubkey: Buf32::from([0x44; 32]),
            tx_hash: Buf32::from([0x51; 32]),
            log_index: 0,
            block_number: 40,
            nonce: 1,
        };
        reader.add_event(
            msg.tx_hash,
            msg.block_number,
            msg.log_index,
            ChainEvent::Staked {
                validator_id: 7,
                signer_pubkey: msg.signer_pubkey,
                activation_epoch: 3,
                amount: msg.amount,
                nonce: 1,
            },
            10,
        );
        msg
    }

    fn update_msg(reader: &TestChainReader, nonce: u64, tx: u8) -> MsgStakeUpdate {
        let msg = MsgStakeUpdate {
            from: Buf20::from([1; 20]),
            val_id: 7,
            new_amount: POWER_REDUCTION * 30,
            tx_hash: Buf32::from([tx; 32]),
            log_index: 0,
            block_number: 40 + nonce,
            nonce,
        };
        reader.add_event(
            msg.tx_hash,
            msg.block_number,
            msg.log_index,
            ChainEvent::StakeUpdate {
                validator_id: 7,
                new_amount: msg.new_amount,
                nonce,
            },
            10,
        );
        msg
    }

    #[tokio::test]
    async fn test_join_then_update_in_order() {
        let (keeper, reader) = setup();
        let join = Msg::ValidatorJoin(join_msg(&reader));

        assert_eq!(keeper.side_handle(&ctx_at(10, T), &join).await, Vote::Yes);
        let events = keeper
            .post_handle(&ctx_at(10, T), &join, SideTxResult::Pass)
            .unwrap();
        assert!(matches!(events[..], [ModuleEvent::ValidatorJoined { id: 7, power: 25, .. }]));
        assert_eq!(keeper.get_nonce_and_height(7).unwrap(), Some((1, 10)));

        // Joining twice is voted down and applying it again is a no-op.
        assert_eq!(keeper.side_handle(&ctx_at(11, T), &join).await, Vote::No);
        assert!(keeper
            .post_handle(&ctx_at(11, T), &join, SideTxResult::Pass)
            .unwrap()
            .is_empty());

        let update3 = Msg::StakeUpdate(update_msg(&reader, 3, 0x53));
        let update2 = Msg::StakeUpdate(update_msg(&reader, 2, 0x52));
        assert_eq!(keeper.side_handle(&ctx_at(12, T), &update3).await, Vote::No);
        assert_eq!(keeper.side_handle(&ctx_at(12, T), &update2).await, Vote::Yes);

        keeper
            .post_handle(&ctx_at(12, T), &update2, SideTxResult::Pass)
            .unwrap();
        assert_eq!(keeper.get_validator(7).unwrap().unwrap().power, 30);
        assert_eq!(keeper.get_nonce_and_height(7).unwrap(), Some((2, 12)));
        assert_eq!(keeper.side_handle(&ctx_at(13, T), &update3).await, Vote::Yes);
    }

    #[tokio::test]
    async fn test_update_for_unknown_validator() {
        let (keeper, reader) = setup();
        let update = Msg::StakeUpdate(update_msg(&reader, 1, 0x52));

        assert_eq!(keeper.side_handle(&ctx_at(10, T), &update).await, Vote::No);
        assert!(keeper
            .post_handle(&ctx_at(10, T), &update, SideTxResult::Pass)
            .unwrap()
            .is_empty());
        assert_eq!(keeper.get_validator_nonce(7).unwrap(), None);
    }

    #[tokio::test]
    async fn test_join_event_mismatch() {
        let (keeper, reader) = setup();
        let mut join = join_msg(&reader);
        join.amount += 1;
        assert_eq!(
            keeper.side_handle(&ctx_at(10, T), &Msg::ValidatorJoin(join)).await,
            Vote::No
        );
    }

    #[tokio::test]
    async fn test_exit_blocks_further_updates() {
        let (keeper, reader) = setup();
        let join = Msg::ValidatorJoin(join_msg(&reader));
        keeper
            .post_handle(&ctx_at(10, T), &join, SideTxResult::Pass)
            .unwrap();

        let exit = MsgValidatorExit {
            from: Buf20::from([1; 20]),
            val_id: 7,
            deactivation_epoch: 9,
            tx_hash: Buf32::from([0x60; 32]),
            log_index: 2,
            block_number: 45,
            nonce: 2,
        };
        reader.add_event(
            exit.tx_hash,
            exit.block_number,
            exit.log_index,
            ChainEvent::UnstakeInit {
                validator_id: 7,
                deactivation_epoch: 9,
                nonce: 2,
            },
            10,
        );
        let exit = Msg::ValidatorExit(exit);
        assert_eq!(keeper.side_handle(&ctx_at(11, T), &exit).await, Vote::Yes);
        keeper
            .post_handle(&ctx_at(11, T), &exit, SideTxResult::Pass)
            .unwrap();
        assert!(keeper.get_validator(7).unwrap().unwrap().is_exiting());

        let update = Msg::StakeUpdate(update_msg(&reader, 3, 0x53));
        assert_eq!(keeper.side_handle(&ctx_at(12, T), &update).await, Vote::No);
    }

    #[tokio::test]
    async fn test_is_old_tx() {
        let (keeper, reader) = setup();
        let join = join_msg(&reader);
        assert!(!keeper.is_old_tx(join.tx_hash, join.log_index).await.unwrap());

        keeper
            .post_handle(&ctx_at(10, T), &Msg::ValidatorJoin(join.clone()), SideTxResult::Pass)
            .unwrap();
        assert!(keeper.is_old_tx(join.tx_hash, join.log_index).await.unwrap());
    }
}
