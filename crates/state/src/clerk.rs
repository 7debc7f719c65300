//! State-sync event records bridged from the rootchain.

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use heimdall_primitives::{params::MAX_STATE_SYNC_SIZE, prelude::*, sequence};
use serde::{Deserialize, Serialize};

use crate::errors::MsgError;

/// One externally-sourced state-sync fact accepted into consensus state.
///
/// Records are append-only.  The `id` is assigned by the rootchain state
/// sender contract and never reused.
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
pub struct EventRecord {
    pub id: u64,
    pub contract: Address,
    pub data: Vec<u8>,
    pub tx_hash: TxHash,
    pub log_index: u64,
    pub bor_chain_id: String,

    /// Consensus block time (unix seconds) at which the record was committed.
    pub record_time: u64,
}

/// Clerk module state as exported to and imported from genesis.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ClerkGenesis {
    pub event_records: Vec<EventRecord>,
    pub record_sequences: Vec<u64>,
}

/// Proposes a state-sync event record observed on the rootchain.
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
pub struct MsgEventRecord {
    /// Relayer account submitting the message.
    pub from: Address,
    pub tx_hash: TxHash,
    pub log_index: u64,
    pub block_number: u64,
    pub contract_address: Address,
    pub data: Vec<u8>,
    pub id: u64,
    pub chain_id: String,
}

impl MsgEventRecord {
    pub fn validate_basic(&self) -> Result<(), MsgError> {
        if self.from.is_zero() {
            return Err(MsgError::MissingField("from"));
        }

        if self.tx_hash.is_zero() {
            return Err(MsgError::MissingField("tx_hash"));
        }

        if self.contract_address.is_zero() {
            return Err(MsgError::MissingField("contract_address"));
        }

        if self.chain_id.is_empty() {
            return Err(MsgError::MissingField("chain_id"));
        }

        if self.data.len() > MAX_STATE_SYNC_SIZE {
            return Err(MsgError::DataTooLarge(self.data.len(), MAX_STATE_SYNC_SIZE));
        }

        if self.sequence().is_none() {
            return Err(MsgError::InvalidLogPosition(
                self.block_number,
                self.log_index,
            ));
        }

        Ok(())
    }

    /// Dedup sequence of the log this message was built from.
    pub fn sequence(&self) -> Option<u64> {
        sequence::compute_sequence(self.block_number, self.log_index)
    }

    /// Builds the record that gets persisted when this message passes.
    pub fn to_event_record(&self, record_time: u64) -> EventRecord {
        EventRecord {
            id: self.id,
            contract: self.contract_address,
            data: self.data.clone(),
            tx_hash: self.tx_hash,
            log_index: self.log_index,
            bor_chain_id: self.chain_id.clone(),
            record_time,
        }
    }
}

/// Applies the size cap to a state-sync payload.  Oversized payloads are
/// replaced by an empty one, which is the only form consensus accepts.
pub fn cap_state_sync_data(data: Vec<u8>) -> Vec<u8> {
    if data.len() > MAX_STATE_SYNC_SIZE {
        Vec::new()
    } else {
        data
    }
}
