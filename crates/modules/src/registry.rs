//! Wiring of the module keepers into the side-tx registry.

use std::sync::Arc;

use heimdall_chainio::traits::ChainReader;
use heimdall_db::traits::Database;
use heimdall_primitives::params::Params;
use heimdall_sidetx::{RegistryError, SideTxRegistry};
use heimdall_state::{checkpoint::MsgCpNoAck, msg::SideMsgKind};

use crate::{
    checkpoint::CheckpointKeeper, clerk::ClerkKeeper, stake::StakeKeeper, topup::TopupKeeper,
};

/// All module keepers of a node, sharing one chain reader.
pub struct Modules<D: Database, R> {
    pub clerk: Arc<ClerkKeeper<D::ClerkDB, R>>,
    pub checkpoint: Arc<CheckpointKeeper<D::CheckpointDB, R>>,
    pub stake: Arc<StakeKeeper<D::StakeDB, R>>,
    pub topup: Arc<TopupKeeper<D::TopupDB, R>>,
}

impl<D, R> Modules<D, R>
where
    D: Database,
    D::ClerkDB: 'static,
    D::CheckpointDB: 'static,
    D::StakeDB: 'static,
    D::TopupDB: 'static,
    R: ChainReader,
{
    pub fn new(db: &D, reader: Arc<R>, params: &Params) -> Self {
        let chain = params.chain().clone();

        let topup = Arc::new(TopupKeeper::new(
            db.topup_db().clone(),
            reader.clone(),
            chain.clone(),
        ));
        let checkpoint = Arc::new(CheckpointKeeper::new(
            db.checkpoint_db().clone(),
            reader.clone(),
            topup.clone(),
            chain.clone(),
            params.checkpoint().clone(),
        ));
        let clerk = Arc::new(ClerkKeeper::new(
            db.clerk_db().clone(),
            reader.clone(),
            chain.clone(),
        ));
        let stake = Arc::new(StakeKeeper::new(db.stake_db().clone(), reader, chain));

        Self {
            clerk,
            checkpoint,
            stake,
            topup,
        }
    }

    /// Registers every keeper for the msg kinds it owns, and the checkpoint
    /// keeper for no-acks.
    pub fn build_registry(&self) -> Result<SideTxRegistry, RegistryError> {
        SideTxRegistry::builder()
            .register(
                SideMsgKind::EventRecord,
                self.clerk.clone(),
                self.clerk.clone(),
            )
            .register(
                SideMsgKind::Checkpoint,
                self.checkpoint.clone(),
                self.checkpoint.clone(),
            )
            .register(
                SideMsgKind::CheckpointAck,
                self.checkpoint.clone(),
                self.checkpoint.clone(),
            )
            .register(SideMsgKind::TopupTx, self.topup.clone(), self.topup.clone())
            .register(
                SideMsgKind::ValidatorJoin,
                self.stake.clone(),
                self.stake.clone(),
            )
            .register(
                SideMsgKind::StakeUpdate,
                self.stake.clone(),
                self.stake.clone(),
            )
            .register(
                SideMsgKind::SignerUpdate,
                self.stake.clone(),
                self.stake.clone(),
            )
            .register(
                SideMsgKind::ValidatorExit,
                self.stake.clone(),
                self.stake.clone(),
            )
            .register_msg(MsgCpNoAck::METHOD_NAME, self.checkpoint.clone())
            .build()
    }
}
