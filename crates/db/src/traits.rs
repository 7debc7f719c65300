//! Trait definitions for low level database interfaces.  Operations are not
//! validated at this level, the module keepers are responsible for that.

use std::sync::Arc;

use heimdall_primitives::buf::Address;
use heimdall_state::{
    checkpoint::Checkpoint,
    clerk::EventRecord,
    stake::{Validator, ValidatorId},
};

use crate::DbResult;

/// Common database interface that we can parameterize module keepers over.
pub trait Database {
    type ClerkDB: ClerkDatabase + Send + Sync;
    type CheckpointDB: CheckpointDatabase + Send + Sync;
    type StakeDB: StakeDatabase + Send + Sync;
    type TopupDB: TopupDatabase + Send + Sync;

    fn clerk_db(&self) -> &Arc<Self::ClerkDB>;
    fn checkpoint_db(&self) -> &Arc<Self::CheckpointDB>;
    fn stake_db(&self) -> &Arc<Self::StakeDB>;
    fn topup_db(&self) -> &Arc<Self::TopupDB>;
}

/// Storage for state-sync event records and their dedup sequences.
pub trait ClerkDatabase {
    /// Atomically writes the record under its id and the `(record_time, id)`
    /// time index.  Either both entries are written or neither is.  Returns
    /// an error if a record with the same id exists.
    fn put_event_record(&self, record: EventRecord) -> DbResult<()>;

    /// Gets a record by id.
    fn get_event_record(&self, id: u64) -> DbResult<Option<EventRecord>>;

    /// Checks if a record with the id exists.
    fn has_event_record(&self, id: u64) -> DbResult<bool>;

    /// Returns records ascending by id, skipping `offset` and returning at
    /// most `limit`.
    fn get_event_records(&self, offset: usize, limit: usize) -> DbResult<Vec<EventRecord>>;

    /// Returns records with `from <= record_time < to` ordered by
    /// `(record_time, id)`, skipping `offset` and returning at most `limit`.
    fn get_event_records_by_time(
        &self,
        from: u64,
        to: u64,
        offset: usize,
        limit: usize,
    ) -> DbResult<Vec<EventRecord>>;

    /// Number of stored records.
    fn get_event_record_count(&self) -> DbResult<u64>;

    /// Marks an external log position as accepted.
    fn put_record_sequence(&self, sequence: u64) -> DbResult<()>;

    fn has_record_sequence(&self, sequence: u64) -> DbResult<bool>;

    /// All accepted sequences, ascending.
    fn get_record_sequences(&self) -> DbResult<Vec<u64>>;
}

/// Storage for the buffered and finalized checkpoints.
pub trait CheckpointDatabase {
    fn get_buffered_checkpoint(&self) -> DbResult<Option<Checkpoint>>;

    fn set_buffered_checkpoint(&self, checkpoint: Checkpoint) -> DbResult<()>;

    fn clear_buffered_checkpoint(&self) -> DbResult<()>;

    /// Stores a finalized checkpoint under its number.  Will not overwrite
    /// an existing entry.
    fn put_checkpoint(&self, number: u64, checkpoint: Checkpoint) -> DbResult<()>;

    fn get_checkpoint(&self, number: u64) -> DbResult<Option<Checkpoint>>;

    /// Returns the finalized checkpoint with the highest number.
    fn get_last_checkpoint(&self) -> DbResult<Option<(u64, Checkpoint)>>;

    fn get_ack_count(&self) -> DbResult<u64>;

    fn set_ack_count(&self, count: u64) -> DbResult<()>;

    fn get_last_no_ack(&self) -> DbResult<u64>;

    fn set_last_no_ack(&self, height: u64) -> DbResult<()>;
}

/// Storage for the validator set and staking dedup sequences.
pub trait StakeDatabase {
    fn put_validator(&self, validator: Validator) -> DbResult<()>;

    fn get_validator(&self, id: ValidatorId) -> DbResult<Option<Validator>>;

    /// All validators, ascending by id.
    fn get_validators(&self) -> DbResult<Vec<Validator>>;

    fn put_stake_sequence(&self, sequence: u64) -> DbResult<()>;

    fn has_stake_sequence(&self, sequence: u64) -> DbResult<bool>;
}

/// Storage for fee balances funded from the rootchain.
pub trait TopupDatabase {
    fn get_balance(&self, account: Address) -> DbResult<u128>;

    fn set_balance(&self, account: Address, balance: u128) -> DbResult<()>;

    /// All accounts with a balance, ascending by address.
    fn get_balances(&self) -> DbResult<Vec<(Address, u128)>>;

    fn put_topup_sequence(&self, sequence: u64) -> DbResult<()>;

    fn has_topup_sequence(&self, sequence: u64) -> DbResult<bool>;
}
