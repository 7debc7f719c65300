use std::collections::BTreeMap;

use heimdall_state::checkpoint::Checkpoint;
use parking_lot::RwLock;

use crate::{errors::DbError, traits::CheckpointDatabase, DbResult};

#[derive(Debug, Default)]
struct InnerState {
    buffered: Option<Checkpoint>,
    checkpoints: BTreeMap<u64, Checkpoint>,
    ack_count: u64,
    last_no_ack: u64,
}

#[derive(Debug, Default)]
pub struct StubCheckpointDb {
    state: RwLock<InnerState>,
}

impl StubCheckpointDb {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointDatabase for StubCheckpointDb {
    fn get_buffered_checkpoint(&self) -> DbResult<Option<Checkpoint>> {
        Ok(self.state.read().buffered.clone())
    }

    fn set_buffered_checkpoint(&self, checkpoint: Checkpoint) -> DbResult<()> {
        self.state.write().buffered = Some(checkpoint);
        Ok(())
    }

    fn clear_buffered_checkpoint(&self) -> DbResult<()> {
        self.state.write().buffered = None;
        Ok(())
    }

    fn put_checkpoint(&self, number: u64, checkpoint: Checkpoint) -> DbResult<()> {
        let mut st = self.state.write();
        if st.checkpoints.contains_key(&number) {
            return Err(DbError::EntryAlreadyExists("checkpoint", number));
        }
        st.checkpoints.insert(number, checkpoint);
        Ok(())
    }

    fn get_checkpoint(&self, number: u64) -> DbResult<Option<Checkpoint>> {
        Ok(self.state.read().checkpoints.get(&number).cloned())
    }

    fn get_last_checkpoint(&self) -> DbResult<Option<(u64, Checkpoint)>> {
        Ok(self
            .state
            .read()
            .checkpoints
            .last_key_value()
            .map(|(n, c)| (*n, c.clone())))
    }

    fn get_ack_count(&self) -> DbResult<u64> {
        Ok(self.state.read().ack_count)
    }

    fn set_ack_count(&self, count: u64) -> DbResult<()> {
        self.state.write().ack_count = count;
        Ok(())
    }

    fn get_last_no_ack(&self) -> DbResult<u64> {
        Ok(self.state.read().last_no_ack)
    }

    fn set_last_no_ack(&self, height: u64) -> DbResult<()> {
        self.state.write().last_no_ack = height;
        Ok(())
    }
}
