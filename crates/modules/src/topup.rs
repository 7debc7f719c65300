//! Fee balances funded by rootchain top-ups.

use std::sync::Arc;

use async_trait::async_trait;
use heimdall_chainio::{
    traits::ChainReader,
    types::{ChainEvent, EventKind},
};
use heimdall_db::{traits::TopupDatabase, DbResult};
use heimdall_primitives::{
    buf::{Address, Buf32, TxHash},
    hash,
    params::ChainParams,
};
use heimdall_sidetx::{BlockContext, ModuleEvent, PostHandler, PostTxError, SideHandler};
use heimdall_state::{
    msg::Msg,
    topup::MsgTopupTx,
    vote::{SideTxResult, Vote},
};
use tracing::*;

use crate::{
    chain::{self, LogRef},
    errors::ModuleResult,
};

/// Source of the account root hash that checkpoints commit to.
pub trait AccountRootProvider: Send + Sync + 'static {
    fn account_root(&self) -> DbResult<Buf32>;
}

fn account_leaf(account: &Address, balance: u128) -> Buf32 {
    hash::raw_concat([account.as_slice(), balance.to_be_bytes().as_slice()])
}

/// Merkle root over `(account, balance)` leaves, in the order given.
pub fn compute_account_root(balances: &[(Address, u128)]) -> Buf32 {
    let leaves: Vec<_> = balances
        .iter()
        .map(|(acct, bal)| account_leaf(acct, *bal))
        .collect();
    hash::merkle_root(&leaves)
}

pub struct TopupKeeper<D, R> {
    db: Arc<D>,
    reader: Arc<R>,
    params: ChainParams,
}

impl<D: TopupDatabase, R: ChainReader> TopupKeeper<D, R> {
    pub fn new(db: Arc<D>, reader: Arc<R>, params: ChainParams) -> Self {
        Self { db, reader, params }
    }

    async fn vote_topup(&self, msg: &MsgTopupTx) -> ModuleResult<Vote> {
        let Some(sequence) = msg.sequence() else {
            return Ok(Vote::No);
        };

        if self.db.has_topup_sequence(sequence)? {
            debug!(tx = %msg.tx_hash, %sequence, "topup already applied");
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
            EventKind::TopUpFee,
        )
        .await?;

        let Some(ChainEvent::TopUpFee { user, fee }) = event else {
            return Ok(Vote::No);
        };

        Ok(Vote::from_bool(user == msg.user && fee == msg.fee))
    }

    fn apply_topup(&self, msg: &MsgTopupTx) -> Result<Vec<ModuleEvent>, PostTxError> {
        let sequence = msg.sequence().ok_or_else(|| {
            PostTxError::Invariant(format!(
                "topup has invalid log position ({}, {})",
                msg.block_number, msg.log_index
            ))
        })?;

        if self.db.has_topup_sequence(sequence)? {
            debug!(tx = %msg.tx_hash, %sequence, "topup already applied, skipping");
            return Ok(Vec::new());
        }

        let balance = self.db.get_balance(msg.user)?;
        let new_balance = balance.checked_add(msg.fee).ok_or_else(|| {
            PostTxError::Invariant(format!("balance of {} overflows", msg.user))
        })?;

        self.db.set_balance(msg.user, new_balance)?;
        self.db.put_topup_sequence(sequence)?;

        info!(user = %msg.user, fee = %msg.fee, balance = %new_balance, "credited fee topup");
        Ok(vec![ModuleEvent::FeeTopup {
            user: msg.user,
            fee: msg.fee,
        }])
    }

    pub fn get_balance(&self, account: Address) -> DbResult<u128> {
        self.db.get_balance(account)
    }

    pub async fn is_old_tx(&self, tx_hash: TxHash, log_index: u64) -> ModuleResult<bool> {
        let sequence = chain::log_sequence(
            self.reader.as_ref(),
            tx_hash,
            log_index,
            self.params.main_chain_tx_confirmations,
        )
        .await?;
        Ok(self.db.has_topup_sequence(sequence)?)
    }
}

impl<D, R> AccountRootProvider for TopupKeeper<D, R>
where
    D: TopupDatabase + Send + Sync + 'static,
    R: ChainReader,
{
    fn account_root(&self) -> DbResult<Buf32> {
        Ok(compute_account_root(&self.db.get_balances()?))
    }
}

#[async_trait]
impl<D, R> SideHandler for TopupKeeper<D, R>
where
    D: TopupDatabase + Send + Sync + 'static,
    R: ChainReader,
{
    async fn side_handle(&self, _ctx: &BlockContext, msg: &Msg) -> Vote {
        let Msg::TopupTx(msg) = msg else {
            warn!(method = msg.method_name(), "topup got foreign msg");
            return Vote::No;
        };

        match self.vote_topup(msg).await {
            Ok(vote) => vote,
            Err(err) => {
                warn!(tx = %msg.tx_hash, %err, "topup check failed, voting no");
                Vote::No
            }
        }
    }
}

impl<D, R> PostHandler for TopupKeeper<D, R>
where
    D: TopupDatabase + Send + Sync + 'static,
    R: ChainReader,
{
    fn post_handle(
        &self,
        _ctx: &BlockContext,
        msg: &Msg,
        result: SideTxResult,
    ) -> Result<Vec<ModuleEvent>, PostTxError> {
        let Msg::TopupTx(msg) = msg else {
            return Err(PostTxError::WrongMsg(msg.method_name()));
        };

        if result != SideTxResult::Pass {
            return Ok(Vec::new());
        }

        self.apply_topup(msg)
    }
}
