//! Vote extension types exchanged between validators every block.

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use heimdall_primitives::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::CodecError;

/// Maximum number of block hashes in a milestone proposition.
pub const MAX_MILESTONE_PROPOSITION_LENGTH: usize = 10;

/// A single validator's vote on one side-tx.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Hash,
    Arbitrary,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub enum Vote {
    Yes,
    No,
}

impl Vote {
    pub fn from_bool(ok: bool) -> Self {
        if ok {
            Vote::Yes
        } else {
            Vote::No
        }
    }
}

/// Consensus-wide outcome of a side-tx after tallying.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Hash,
    Arbitrary,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub enum SideTxResult {
    /// More than 2/3 of voting power voted yes.
    Pass,

    /// Anything else.  The message is not applied.
    Skip,
}

#[derive(
    Clone,
    Debug,
    Eq,
    PartialEq,
    Arbitrary,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct SideTxResponse {
    pub tx_hash: TxHash,
    pub result: Vote,
}

/// Optional milestone data a validator proposes alongside its side-tx votes.
#[derive(
    Clone,
    Debug,
    Eq,
    PartialEq,
    Arbitrary,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct MilestoneProposition {
    pub block_hashes: Vec<Buf32>,
    pub start_block_number: u64,
    pub parent_hash: Buf32,
}

impl MilestoneProposition {
    pub fn is_well_formed(&self) -> bool {
        !self.block_hashes.is_empty()
            && self.block_hashes.len() <= MAX_MILESTONE_PROPOSITION_LENGTH
            && self.block_hashes.iter().all(|h| !h.is_zero())
    }
}

/// Data a validator attaches to its precommit for the block under
/// construction.
#[derive(
    Clone,
    Debug,
    Eq,
    PartialEq,
    Arbitrary,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct VoteExtension {
    pub block_hash: Buf32,
    pub height: u64,
    pub side_tx_responses: Vec<SideTxResponse>,
    pub milestone_proposition: Option<MilestoneProposition>,

    /// Marker byte followed by either the dummy sentinel or checkpoint sign
    /// bytes.  Signed separately, see [`ExtendedVote`].
    pub non_rp_vote_extension: Vec<u8>,
}

impl VoteExtension {
    pub fn encode(&self) -> Vec<u8> {
        borsh::to_vec(self).expect("vote: borsh encode")
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        Ok(borsh::from_slice(buf)?)
    }
}

/// Identity and weight of the validator that cast an extended vote.
#[derive(
    Clone,
    Debug,
    Eq,
    PartialEq,
    Arbitrary,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct VoteValidator {
    pub address: Address,
    pub pubkey: Buf32,
    pub power: u64,
}

/// A vote extension as delivered by the consensus engine, with the
/// detached signatures.
#[derive(
    Clone,
    Debug,
    Eq,
    PartialEq,
    Arbitrary,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct ExtendedVote {
    pub validator: VoteValidator,
    pub extension: VoteExtension,

    /// Signature over the encoded extension, verified by the consensus
    /// engine before delivery.
    pub extension_signature: Buf64,

    /// Signature over `extension.non_rp_vote_extension`.
    pub non_rp_extension_signature: Buf64,
}
