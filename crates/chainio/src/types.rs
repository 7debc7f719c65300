//! Decoded rootchain data.

use arbitrary::Arbitrary;
use heimdall_primitives::buf::{Address, Buf32, TxHash};
use serde::{Deserialize, Serialize};

/// Contract events the node cares about.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Arbitrary, Serialize, Deserialize)]
pub enum EventKind {
    StateSynced,
    TopUpFee,
    Staked,
    StakeUpdate,
    SignerChange,
    UnstakeInit,
    NewHeaderBlock,
}

/// A decoded contract event.
#[derive(Clone, Debug, Eq, PartialEq, Arbitrary, Serialize, Deserialize)]
pub enum ChainEvent {
    /// Emitted by the state sender.  `data` is the raw payload, not yet
    /// capped.
    StateSynced {
        id: u64,
        contract: Address,
        data: Vec<u8>,
    },

    TopUpFee {
        user: Address,
        fee: u128,
    },

    Staked {
        validator_id: u64,
        signer_pubkey: Buf32,
        activation_epoch: u64,
        amount: u128,
        nonce: u64,
    },

    StakeUpdate {
        validator_id: u64,
        new_amount: u128,
        nonce: u64,
    },

    SignerChange {
        validator_id: u64,
        new_signer_pubkey: Buf32,
        nonce: u64,
    },

    UnstakeInit {
        validator_id: u64,
        deactivation_epoch: u64,
        nonce: u64,
    },

    NewHeaderBlock {
        header_block_id: u64,
        proposer: Address,
        start_block: u64,
        end_block: u64,
        root_hash: Buf32,
    },
}

impl ChainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ChainEvent::StateSynced { .. } => EventKind::StateSynced,
            ChainEvent::TopUpFee { .. } => EventKind::TopUpFee,
            ChainEvent::Staked { .. } => EventKind::Staked,
            ChainEvent::StakeUpdate { .. } => EventKind::StakeUpdate,
            ChainEvent::SignerChange { .. } => EventKind::SignerChange,
            ChainEvent::UnstakeInit { .. } => EventKind::UnstakeInit,
            ChainEvent::NewHeaderBlock { .. } => EventKind::NewHeaderBlock,
        }
    }

    /// Validator id and staking nonce, for staking lifecycle events.
    pub fn staking_nonce(&self) -> Option<(u64, u64)> {
        match self {
            ChainEvent::Staked {
                validator_id,
                nonce,
                ..
            }
            | ChainEvent::StakeUpdate {
                validator_id,
                nonce,
                ..
            }
            | ChainEvent::SignerChange {
                validator_id,
                nonce,
                ..
            }
            | ChainEvent::UnstakeInit {
                validator_id,
                nonce,
                ..
            } => Some((*validator_id, *nonce)),
            _ => None,
        }
    }
}

/// One log entry of a receipt, still ABI encoded.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ReceiptLog {
    pub log_index: u64,
    pub address: Address,
    pub topics: Vec<Buf32>,
    pub data: Vec<u8>,
}

/// Receipt of a confirmed rootchain tx.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub logs: Vec<ReceiptLog>,
}

impl Receipt {
    pub fn log(&self, log_index: u64) -> Option<&ReceiptLog> {
        self.logs.iter().find(|l| l.log_index == log_index)
    }
}

/// A decoded log together with its position on the rootchain.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChainLog {
    pub tx_hash: TxHash,
    pub log_index: u64,
    pub block_number: u64,
    pub event: ChainEvent,
}

/// Checkpoint as stored by the rootchain contract.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RootchainHeaderBlock {
    pub number: u64,
    pub proposer: Address,
    pub start_block: u64,
    pub end_block: u64,
    pub root_hash: Buf32,
    pub created_at: u64,
}
