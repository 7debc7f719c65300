//! In-memory implementations of the database traits, used in tests and by
//! embedders that keep module state elsewhere.

use std::sync::Arc;

use crate::traits::Database;

pub mod checkpoint;
pub mod clerk;
pub mod stake;
pub mod topup;

pub use checkpoint::StubCheckpointDb;
pub use clerk::StubClerkDb;
pub use stake::StubStakeDb;
pub use topup::StubTopupDb;

#[derive(Debug, Clone, Default)]
pub struct StubDatabase {
    clerk: Arc<StubClerkDb>,
    checkpoint: Arc<StubCheckpointDb>,
    stake: Arc<StubStakeDb>,
    topup: Arc<StubTopupDb>,
}

impl StubDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Database for StubDatabase {
    type ClerkDB = StubClerkDb;
    type CheckpointDB = StubCheckpointDb;
    type StakeDB = StubStakeDb;
    type TopupDB = StubTopupDb;

    fn clerk_db(&self) -> &Arc<Self::ClerkDB> {
        &self.clerk
    }

    fn checkpoint_db(&self) -> &Arc<Self::CheckpointDB> {
        &self.checkpoint
    }

    fn stake_db(&self) -> &Arc<Self::StakeDB> {
        &self.stake
    }

    fn topup_db(&self) -> &Arc<Self::TopupDB> {
        &self.topup
    }
}
