//! Fee top-ups bridged from the rootchain.

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use heimdall_primitives::{prelude::*, sequence};
use serde::{Deserialize, Serialize};

use crate::errors::MsgError;

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
pub struct MsgTopupTx {
    pub proposer: Address,
    pub user: Address,
    pub fee: u128,
    pub tx_hash: TxHash,
    pub log_index: u64,
    pub block_number: u64,
}

impl MsgTopupTx {
    pub fn validate_basic(&self) -> Result<(), MsgError> {
        if self.proposer.is_zero() {
            return Err(MsgError::MissingField("proposer"));
        }

        if self.user.is_zero() {
            return Err(MsgError::MissingField("user"));
        }

        if self.fee == 0 {
            return Err(MsgError::ZeroAmount);
        }

        if self.sequence().is_none() {
            return Err(MsgError::InvalidLogPosition(
                self.block_number,
                self.log_index,
            ));
        }

        Ok(())
    }

    pub fn sequence(&self) -> Option<u64> {
        sequence::compute_sequence(self.block_number, self.log_index)
    }
}
