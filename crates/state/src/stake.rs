//! Validator set entries and staking lifecycle messages.

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use heimdall_primitives::{hash, prelude::*, sequence};
use serde::{Deserialize, Serialize};

use crate::errors::MsgError;

/// Rootchain validator id.
pub type ValidatorId = u64;

/// Amount of staked token units per unit of voting power.
pub const POWER_REDUCTION: u128 = 1_000_000_000_000_000_000;

/// Converts a staked amount into voting power.
pub fn power_from_amount(amount: u128) -> u64 {
    u64::try_from(amount / POWER_REDUCTION).unwrap_or(u64::MAX)
}

/// Derives the signer address for an x-only signer pubkey.
pub fn signer_address(pubkey: &Buf32) -> Address {
    let h = hash::raw(pubkey.as_slice());
    Buf20::try_from(&h.as_slice()[12..]).expect("stake: address from hash tail")
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
pub struct Validator {
    pub id: ValidatorId,
    pub signer: Address,
    pub pubkey: Buf32,
    pub power: u64,
    pub start_epoch: u64,

    /// Zero while the validator has not initiated an exit.
    pub end_epoch: u64,

    /// Staking nonce, bumped on every accepted lifecycle event.
    pub nonce: u64,

    /// Heimdall height at which the last lifecycle event was applied.
    pub last_updated_height: u64,
}

impl Validator {
    pub fn is_exiting(&self) -> bool {
        self.end_epoch != 0
    }
}

macro_rules! staking_log_position {
    ($ty:ident) => {
        impl $ty {
            /// Dedup sequence of the log this message was built from.
            pub fn sequence(&self) -> Option<u64> {
                sequence::compute_sequence(self.block_number, self.log_index)
            }

            fn validate_common(&self) -> Result<(), MsgError> {
                if self.from.is_zero() {
                    return Err(MsgError::MissingField("from"));
                }

                if self.tx_hash.is_zero() {
                    return Err(MsgError::MissingField("tx_hash"));
                }

                if self.nonce == 0 {
                    return Err(MsgError::InvalidNonce(self.nonce));
                }

                if self.sequence().is_none() {
                    return Err(MsgError::InvalidLogPosition(
                        self.block_number,
                        self.log_index,
                    ));
                }

                Ok(())
            }
        }
    };
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
pub struct MsgValidatorJoin {
    pub from: Address,
    pub val_id: ValidatorId,
    pub activation_epoch: u64,
    pub amount: u128,
    pub signer_pubkey: Buf32,
    pub tx_hash: TxHash,
    pub log_index: u64,
    pub block_number: u64,
    pub nonce: u64,
}

staking_log_position!(MsgValidatorJoin);

impl MsgValidatorJoin {
    pub fn validate_basic(&self) -> Result<(), MsgError> {
        self.validate_common()?;
        if self.signer_pubkey.is_zero() {
            return Err(MsgError::MissingField("signer_pubkey"));
        }
        if self.amount == 0 {
            return Err(MsgError::ZeroAmount);
        }
        Ok(())
    }
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
pub struct MsgStakeUpdate {
    pub from: Address,
    pub val_id: ValidatorId,
    pub new_amount: u128,
    pub tx_hash: TxHash,
    pub log_index: u64,
    pub block_number: u64,
    pub nonce: u64,
}

staking_log_position!(MsgStakeUpdate);

impl MsgStakeUpdate {
    pub fn validate_basic(&self) -> Result<(), MsgError> {
        self.validate_common()
    }
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
pub struct MsgSignerUpdate {
    pub from: Address,
    pub val_id: ValidatorId,
    pub new_signer_pubkey: Buf32,
    pub tx_hash: TxHash,
    pub log_index: u64,
    pub block_number: u64,
    pub nonce: u64,
}

staking_log_position!(MsgSignerUpdate);

impl MsgSignerUpdate {
    pub fn validate_basic(&self) -> Result<(), MsgError> {
        self.validate_common()?;
        if self.new_signer_pubkey.is_zero() {
            return Err(MsgError::MissingField("new_signer_pubkey"));
        }
        Ok(())
    }
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
pub struct MsgValidatorExit {
    pub from: Address,
    pub val_id: ValidatorId,
    pub deactivation_epoch: u64,
    pub tx_hash: TxHash,
    pub log_index: u64,
    pub block_number: u64,
    pub nonce: u64,
}

staking_log_position!(MsgValidatorExit);

impl MsgValidatorExit {
    pub fn validate_basic(&self) -> Result<(), MsgError> {
        self.validate_common()?;
        if self.deactivation_epoch == 0 {
            return Err(MsgError::MissingField("deactivation_epoch"));
        }
        Ok(())
    }
}
