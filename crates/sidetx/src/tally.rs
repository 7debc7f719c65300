//! Aggregation of vote extensions into per-tx consensus results.
//!
//! Everything here is a pure function of the votes and the block context.
//! All honest validators must compute the same output.

use std::collections::{BTreeMap, BTreeSet};

use heimdall_primitives::buf::{Address, Buf64, TxHash};
use heimdall_state::{
    checkpoint::MsgCheckpoint,
    vote::{ExtendedVote, SideTxResult, Vote},
};
use tracing::*;

use crate::{
    context::BlockContext,
    non_rp::{self, NonRpPayload},
};

/// A checkpoint whose sign bytes were signed by more than 2/3 of the voting
/// power, with the signatures to submit to the rootchain.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CheckpointAttestation {
    pub checkpoint: MsgCheckpoint,
    pub sign_bytes: Vec<u8>,
    pub power: u128,

    /// Signer address and signature over the non-rp payload, in vote order.
    pub signatures: Vec<(Address, Buf64)>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TallyResult {
    pub side_tx_results: BTreeMap<TxHash, SideTxResult>,
    pub checkpoint: Option<CheckpointAttestation>,
    pub total_power: u128,
}

impl TallyResult {
    /// Result for a tx.  Txs nobody voted on are skipped.
    pub fn result_for(&self, tx_hash: &TxHash) -> SideTxResult {
        self.side_tx_results
            .get(tx_hash)
            .copied()
            .unwrap_or(SideTxResult::Skip)
    }
}

/// Strictly more than 2/3.
fn is_supermajority(part: u128, total: u128) -> bool {
    part * 3 > total * 2
}

/// Drops repeated votes from the same validator, keeping the first.
fn unique_votes(votes: &[ExtendedVote]) -> Vec<&ExtendedVote> {
    let mut seen = BTreeSet::new();
    votes
        .iter()
        .filter(|v| seen.insert(v.validator.address))
        .collect()
}

fn total_power(votes: &[&ExtendedVote]) -> u128 {
    votes.iter().map(|v| v.validator.power as u128).sum()
}

fn is_for_block(ctx: &BlockContext, vote: &ExtendedVote) -> bool {
    vote.extension.height == ctx.height && vote.extension.block_hash == ctx.block_hash
}

/// Tallies side-tx responses.
///
/// A tx passes when its YES power is more than 2/3 of the power of the
/// validators that responded on it.  A validator that did not list a tx, or
/// whose vote is for another block, abstains: its power counts toward
/// neither side.  A validator listing a tx more than once is counted once,
/// with its first response.
pub fn tally_side_tx_responses(
    ctx: &BlockContext,
    votes: &[ExtendedVote],
) -> BTreeMap<TxHash, SideTxResult> {
    let votes = unique_votes(votes);

    // (yes, voted) power per tx.
    let mut power: BTreeMap<TxHash, (u128, u128)> = BTreeMap::new();
    for vote in votes.iter().filter(|v| is_for_block(ctx, v)) {
        let validator_power = vote.validator.power as u128;
        let mut responded = BTreeSet::new();
        for resp in &vote.extension.side_tx_responses {
            if !responded.insert(resp.tx_hash) {
                continue;
            }

            let (yes, voted) = power.entry(resp.tx_hash).or_default();
            *voted += validator_power;
            if resp.result == Vote::Yes {
                *yes += validator_power;
            }
        }
    }

    power
        .into_iter()
        .map(|(tx_hash, (yes, voted))| {
            let res = if is_supermajority(yes, voted) {
                SideTxResult::Pass
            } else {
                SideTxResult::Skip
            };
            trace!(%tx_hash, %yes, %voted, ?res, "tallied side tx");
            (tx_hash, res)
        })
        .collect()
}

/// Finds the checkpoint signed by a supermajority, if any.
///
/// Payloads that fail to decode or whose signature does not verify only
/// mean that validator signed no checkpoint.
pub fn tally_checkpoint_signatures(
    ctx: &BlockContext,
    votes: &[ExtendedVote],
) -> Option<CheckpointAttestation> {
    let votes = unique_votes(votes);
    let total = total_power(&votes);

    let mut groups: BTreeMap<Vec<u8>, CheckpointAttestation> = BTreeMap::new();
    for vote in votes.iter().filter(|v| is_for_block(ctx, v)) {
        let payload = match non_rp::decode_verified(
            &vote.extension.non_rp_vote_extension,
            &vote.non_rp_extension_signature,
            &vote.validator.pubkey,
            ctx.height,
            &ctx.chain_id,
        ) {
            Ok(p) => p,
            Err(err) => {
                debug!(validator = %vote.validator.address, %err, "ignoring non-rp extension");
                continue;
            }
        };

        let NonRpPayload::Checkpoint {
            checkpoint,
            sign_bytes,
        } = payload
        else {
            continue;
        };

        let group = groups
            .entry(sign_bytes.clone())
            .or_insert_with(|| CheckpointAttestation {
                checkpoint,
                sign_bytes,
                power: 0,
                signatures: Vec::new(),
            });
        group.power += vote.validator.power as u128;
        group
            .signatures
            .push((vote.validator.address, vote.non_rp_extension_signature));
    }

    groups
        .into_values()
        .find(|g| is_supermajority(g.power, total))
}

/// Runs both tallies.
pub fn tally(ctx: &BlockContext, votes: &[ExtendedVote]) -> TallyResult {
    TallyResult {
        side_tx_results: tally_side_tx_responses(ctx, votes),
        checkpoint: tally_checkpoint_signatures(ctx, votes),
        total_power: total_power(&unique_votes(votes)),
    }
}
