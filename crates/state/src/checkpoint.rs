//! Checkpoints attesting to ranges of Bor blocks.

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use heimdall_primitives::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::{CodecError, MsgError};

/// A checkpoint, either buffered awaiting its rootchain ack or finalized.
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
pub struct Checkpoint {
    pub proposer: Address,
    pub start_block: u64,
    pub end_block: u64,
    pub root_hash: Buf32,
    pub account_root_hash: Buf32,
    pub bor_chain_id: String,

    /// Block time at which the checkpoint was buffered.
    pub timestamp: u64,
}

impl Checkpoint {
    /// Checks if the ack refers to this checkpoint.
    pub fn matches_ack(&self, ack: &MsgCpAck) -> bool {
        self.proposer == ack.proposer
            && self.start_block == ack.start_block
            && self.end_block == ack.end_block
            && self.root_hash == ack.root_hash
    }
}

/// Checkpoint module state as exported to and imported from genesis.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct CheckpointGenesis {
    pub buffered_checkpoint: Option<Checkpoint>,

    /// Height of the last accepted no-ack, zero if none.
    pub last_no_ack: u64,

    pub ack_count: u64,

    /// Finalized checkpoints in ack order.  Numbering starts at 1.
    pub checkpoints: Vec<Checkpoint>,
}

/// Proposes a new checkpoint.
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
pub struct MsgCheckpoint {
    pub proposer: Address,
    pub start_block: u64,
    pub end_block: u64,
    pub root_hash: Buf32,
    pub account_root_hash: Buf32,
    pub bor_chain_id: String,
}

impl MsgCheckpoint {
    pub fn validate_basic(&self) -> Result<(), MsgError> {
        if self.proposer.is_zero() {
            return Err(MsgError::MissingField("proposer"));
        }

        if self.root_hash.is_zero() {
            return Err(MsgError::MissingField("root_hash"));
        }

        if self.bor_chain_id.is_empty() {
            return Err(MsgError::MissingField("bor_chain_id"));
        }

        if self.end_block < self.start_block {
            return Err(MsgError::InvalidBlockRange(self.start_block, self.end_block));
        }

        Ok(())
    }

    pub fn to_checkpoint(&self, timestamp: u64) -> Checkpoint {
        Checkpoint {
            proposer: self.proposer,
            start_block: self.start_block,
            end_block: self.end_block,
            root_hash: self.root_hash,
            account_root_hash: self.account_root_hash,
            bor_chain_id: self.bor_chain_id.clone(),
            timestamp,
        }
    }

    /// Packs the fields signed by validators for rootchain submission.
    ///
    /// Layout: `proposer(20) | start(32) | end(32) | root(32) |
    /// account_root(32) | chain_id_len(4) | chain_id`, integers big-endian and
    /// left-padded to 32 bytes.
    pub fn sign_bytes(&self) -> Vec<u8> {
        let chain_id = self.bor_chain_id.as_bytes();
        let mut buf = Vec::with_capacity(SIGN_BYTES_FIXED_LEN + chain_id.len());
        buf.extend_from_slice(self.proposer.as_slice());
        buf.extend_from_slice(&pad_u64(self.start_block));
        buf.extend_from_slice(&pad_u64(self.end_block));
        buf.extend_from_slice(self.root_hash.as_slice());
        buf.extend_from_slice(self.account_root_hash.as_slice());
        buf.extend_from_slice(&(chain_id.len() as u32).to_be_bytes());
        buf.extend_from_slice(chain_id);
        buf
    }

    /// Unpacks sign bytes produced by [`Self::sign_bytes`].
    pub fn from_sign_bytes(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() < SIGN_BYTES_FIXED_LEN {
            return Err(CodecError::Packed("checkpoint sign bytes too short"));
        }

        let (proposer, rest) = buf.split_at(20);
        let (start, rest) = rest.split_at(32);
        let (end, rest) = rest.split_at(32);
        let (root, rest) = rest.split_at(32);
        let (account_root, rest) = rest.split_at(32);
        let (len, chain_id) = rest.split_at(4);

        let len = u32::from_be_bytes(len.try_into().expect("checkpoint: split len")) as usize;
        if chain_id.len() != len {
            return Err(CodecError::Packed("checkpoint chain id length mismatch"));
        }

        let bor_chain_id = std::str::from_utf8(chain_id)
            .map_err(|_| CodecError::Packed("checkpoint chain id not utf8"))?
            .to_string();

        Ok(Self {
            proposer: Buf20::try_from(proposer).expect("checkpoint: split proposer"),
            start_block: unpad_u64(start)?,
            end_block: unpad_u64(end)?,
            root_hash: Buf32::try_from(root).expect("checkpoint: split root"),
            account_root_hash: Buf32::try_from(account_root).expect("checkpoint: split aroot"),
            bor_chain_id,
        })
    }
}

const SIGN_BYTES_FIXED_LEN: usize = 20 + 32 * 4 + 4;

fn pad_u64(v: u64) -> [u8; 32] {
    let mut out = [0; 32];
    out[24..].copy_from_slice(&v.to_be_bytes());
    out
}

fn unpad_u64(word: &[u8]) -> Result<u64, CodecError> {
    if word[..24].iter().any(|b| *b != 0) {
        return Err(CodecError::Packed("integer word overflows u64"));
    }

    Ok(u64::from_be_bytes(
        word[24..].try_into().expect("checkpoint: word tail"),
    ))
}

/// Acknowledges that the buffered checkpoint landed on the rootchain.
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
pub struct MsgCpAck {
    pub from: Address,

    /// Rootchain header block number the checkpoint was stored under.
    pub number: u64,
    pub proposer: Address,
    pub start_block: u64,
    pub end_block: u64,
    pub root_hash: Buf32,
    pub tx_hash: TxHash,
    pub log_index: u64,
}

impl MsgCpAck {
    pub fn validate_basic(&self) -> Result<(), MsgError> {
        if self.from.is_zero() {
            return Err(MsgError::MissingField("from"));
        }

        if self.root_hash.is_zero() {
            return Err(MsgError::MissingField("root_hash"));
        }

        if self.end_block < self.start_block {
            return Err(MsgError::InvalidBlockRange(self.start_block, self.end_block));
        }

        Ok(())
    }
}

/// Rejects the buffered checkpoint after its buffer time elapsed without an
/// ack.  This is an ordinary tx, it does not go through side-tx voting.
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
pub struct MsgCpNoAck {
    pub from: Address,
}

impl MsgCpNoAck {
    pub const METHOD_NAME: &'static str = "/heimdallv2.checkpoint.MsgCpNoAck";

    pub fn validate_basic(&self) -> Result<(), MsgError> {
        if self.from.is_zero() {
            return Err(MsgError::MissingField("from"));
        }

        Ok(())
    }
}
