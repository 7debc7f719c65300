//! Drives the side-tx handlers through the vote extension lifecycle of a
//! block: extend, verify, finalize.

use std::{collections::BTreeSet, sync::Arc};

use heimdall_config::sidetx::SideTxConfig;
use heimdall_primitives::buf::{Buf64, TxHash};
use heimdall_state::{
    msg::{Msg, SideMsgKind},
    tx::{hash_tx_bytes, Tx},
    vote::{ExtendedVote, MilestoneProposition, SideTxResponse, Vote, VoteExtension},
};
use tokio::time;
use tracing::*;

use crate::{
    context::BlockContext,
    errors::{MsgTxError, SideTxError, VoteExtensionError},
    events::ModuleEvent,
    metrics::SideTxMetrics,
    non_rp,
    registry::SideTxRegistry,
    signer::{verify_signature, ExtensionSigner},
    tally::{self, TallyResult},
};

/// A side-tx message found in a block.
#[derive(Clone, Debug)]
pub struct BlockSideTx {
    pub hash: TxHash,
    pub kind: SideMsgKind,
    pub msg: Msg,
}

/// Decodes raw block txs into their hash and msg, in block order.
///
/// Txs that fail to decode or to validate never execute.  A tx repeated in
/// the block is only considered once.
fn decode_block_txs(txs: &[Vec<u8>]) -> Vec<(TxHash, Msg)> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for raw in txs {
        let hash = hash_tx_bytes(raw);
        if !seen.insert(hash) {
            continue;
        }

        let tx = match Tx::decode(raw) {
            Ok(tx) => tx,
            Err(err) => {
                debug!(%hash, %err, "skipping undecodable tx");
                continue;
            }
        };

        if let Err(err) = tx.msg.validate_basic() {
            debug!(%hash, method = tx.msg.method_name(), %err, "skipping invalid msg");
            continue;
        }

        out.push((hash, tx.msg));
    }
    out
}

/// Picks the side-tx messages out of raw block txs, in block order.  Only
/// these are voted on.
pub fn collect_side_txs(txs: &[Vec<u8>]) -> Vec<BlockSideTx> {
    decode_block_txs(txs)
        .into_iter()
        .filter_map(|(hash, msg)| {
            let kind = msg.side_kind()?;
            Some(BlockSideTx { hash, kind, msg })
        })
        .collect()
}

/// Vote extension produced by this validator, with its signatures.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignedVoteExtension {
    pub extension: VoteExtension,
    pub extension_signature: Buf64,
    pub non_rp_extension_signature: Buf64,
}

/// What finalizing a block did.
#[derive(Clone, Debug, Default)]
pub struct FinalizeOutcome {
    pub tally: TallyResult,
    pub events: Vec<ModuleEvent>,
}

pub struct SideTxExecutor {
    registry: Arc<SideTxRegistry>,
    config: SideTxConfig,
    metrics: Arc<dyn SideTxMetrics>,
}

impl SideTxExecutor {
    pub fn new(
        registry: Arc<SideTxRegistry>,
        config: SideTxConfig,
        metrics: Arc<dyn SideTxMetrics>,
    ) -> Self {
        Self {
            registry,
            config,
            metrics,
        }
    }

    /// Runs the side handlers over the block's side txs and builds this
    /// validator's signed vote extension.
    ///
    /// Each handler is bounded by the chain reader timeout, running out of
    /// time is a NO.  The non-rp payload signs the first checkpoint in the
    /// block this validator voted YES on, the dummy otherwise.
    pub async fn extend_vote(
        &self,
        ctx: &BlockContext,
        txs: &[Vec<u8>],
        signer: &ExtensionSigner,
        milestone: Option<MilestoneProposition>,
    ) -> Result<SignedVoteExtension, SideTxError> {
        let mut responses = Vec::new();
        let mut checkpoint_to_sign = None;

        for stx in collect_side_txs(txs) {
            let handler = self
                .registry
                .side_handler(stx.kind)
                .ok_or(SideTxError::MissingHandlers(stx.kind))?;

            let vote = match time::timeout(
                self.config.chain_reader_timeout(),
                handler.side_handle(ctx, &stx.msg),
            )
            .await
            {
                Ok(vote) => vote,
                Err(_) => {
                    warn!(tx = %stx.hash, kind = %stx.kind, "side handler timed out, voting no");
                    self.metrics.record_side_timeout(stx.kind);
                    Vote::No
                }
            };

            debug!(tx = %stx.hash, kind = %stx.kind, ?vote, "side tx vote");
            self.metrics.record_side_vote(stx.kind, vote);

            if vote == Vote::Yes && checkpoint_to_sign.is_none() {
                if let Msg::Checkpoint(cp) = &stx.msg {
                    checkpoint_to_sign = Some(cp.clone());
                }
            }

            responses.push(SideTxResponse {
                tx_hash: stx.hash,
                result: vote,
            });
        }

        let milestone_proposition = milestone.filter(|mp| {
            let ok = mp.is_well_formed();
            if !ok {
                warn!(start = mp.start_block_number, "dropping malformed milestone proposition");
            }
            ok
        });

        let non_rp_vote_extension = match &checkpoint_to_sign {
            Some(cp) => non_rp::make_checkpoint(cp),
            None => non_rp::make_dummy(ctx.height, &ctx.chain_id),
        };

        let extension = VoteExtension {
            block_hash: ctx.block_hash,
            height: ctx.height,
            side_tx_responses: responses,
            milestone_proposition,
            non_rp_vote_extension,
        };
        let (extension_signature, non_rp_extension_signature) = signer.sign_extension(&extension);

        Ok(SignedVoteExtension {
            extension,
            extension_signature,
            non_rp_extension_signature,
        })
    }

    /// Structural checks on another validator's vote extension.  A rejected
    /// extension is dropped from the tally, it never fails the block.
    pub fn verify_vote_extension(
        &self,
        ctx: &BlockContext,
        txs: &[Vec<u8>],
        vote: &ExtendedVote,
    ) -> Result<(), VoteExtensionError> {
        let ext = &vote.extension;
        if ext.height != ctx.height {
            return Err(VoteExtensionError::WrongHeight(ext.height, ctx.height));
        }

        if ext.block_hash != ctx.block_hash {
            return Err(VoteExtensionError::WrongBlockHash);
        }

        if !verify_signature(
            &vote.validator.pubkey,
            &ext.encode(),
            &vote.extension_signature,
        ) {
            return Err(VoteExtensionError::BadSignature);
        }

        let block_side_txs: BTreeSet<_> = collect_side_txs(txs).into_iter().map(|s| s.hash).collect();
        let mut seen = BTreeSet::new();
        for resp in &ext.side_tx_responses {
            if !seen.insert(resp.tx_hash) {
                return Err(VoteExtensionError::DuplicateResponse(resp.tx_hash));
            }

            if !block_side_txs.contains(&resp.tx_hash) {
                return Err(VoteExtensionError::UnknownTx(resp.tx_hash));
            }
        }

        if let Some(mp) = &ext.milestone_proposition {
            if !mp.is_well_formed() {
                return Err(VoteExtensionError::BadMilestone);
            }
        }

        non_rp::decode_verified(
            &ext.non_rp_vote_extension,
            &vote.non_rp_extension_signature,
            &vote.validator.pubkey,
            ctx.height,
            &ctx.chain_id,
        )?;

        Ok(())
    }

    /// Tallies the votes, then runs the post handlers of side txs and the
    /// msg handlers of everything else in block order.
    ///
    /// Post handler errors and msg handler store errors are store failures.
    /// Local state can no longer follow the network, so they are returned
    /// and must halt the node.
    pub fn finalize_block(
        &self,
        ctx: &BlockContext,
        txs: &[Vec<u8>],
        votes: &[ExtendedVote],
    ) -> Result<FinalizeOutcome, SideTxError> {
        let tally = tally::tally(ctx, votes);
        let mut events = Vec::new();

        for (hash, msg) in decode_block_txs(txs) {
            let mut tx_events = match msg.side_kind() {
                Some(kind) => self.post_handle_side_tx(ctx, &tally, hash, kind, &msg)?,
                None => self.handle_plain_msg(ctx, hash, &msg)?,
            };
            events.append(&mut tx_events);
        }

        if let Some(att) = &tally.checkpoint {
            info!(
                start = att.checkpoint.start_block,
                end = att.checkpoint.end_block,
                power = %att.power,
                "checkpoint signed by supermajority"
            );
        }

        Ok(FinalizeOutcome { tally, events })
    }

    fn post_handle_side_tx(
        &self,
        ctx: &BlockContext,
        tally: &TallyResult,
        hash: TxHash,
        kind: SideMsgKind,
        msg: &Msg,
    ) -> Result<Vec<ModuleEvent>, SideTxError> {
        let result = tally.result_for(&hash);
        self.metrics.record_tally_result(kind, result);

        let handler = self
            .registry
            .post_handler(kind)
            .ok_or(SideTxError::MissingHandlers(kind))?;

        let events = handler
            .post_handle(ctx, msg, result)
            .map_err(|e| SideTxError::Post(hash, e))?;

        debug!(tx = %hash, %kind, ?result, n_events = events.len(), "post handled side tx");
        Ok(events)
    }

    fn handle_plain_msg(
        &self,
        ctx: &BlockContext,
        hash: TxHash,
        msg: &Msg,
    ) -> Result<Vec<ModuleEvent>, SideTxError> {
        let method = msg.method_name();
        let Some(handler) = self.registry.msg_handler_for(method) else {
            trace!(tx = %hash, %method, "no handler for msg");
            return Ok(Vec::new());
        };

        match handler.handle_msg(ctx, msg) {
            Ok(events) => {
                debug!(tx = %hash, %method, n_events = events.len(), "handled msg");
                Ok(events)
            }
            Err(MsgTxError::Rejected(reason)) => {
                debug!(tx = %hash, %method, %reason, "msg rejected");
                Ok(Vec::new())
            }
            Err(MsgTxError::Store(e)) => Err(SideTxError::Msg(hash, e)),
        }
    }
}
