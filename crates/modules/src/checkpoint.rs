//! Checkpoint proposals, acks and no-acks.
//!
//! A checkpoint passes side-tx voting into the buffer, and leaves it either
//! through an ack once it landed on the rootchain or through a no-ack once
//! its buffer time elapsed.  At most one checkpoint is buffered at a time.

use std::sync::Arc;

use async_trait::async_trait;
use heimdall_chainio::traits::ChainReader;
use heimdall_db::{traits::CheckpointDatabase, DbError, DbResult};
use heimdall_primitives::params::{ChainParams, CheckpointParams};
use heimdall_sidetx::{
    BlockContext, ModuleEvent, MsgHandler, MsgTxError, PostHandler, PostTxError, SideHandler,
};
use heimdall_state::{
    checkpoint::{Checkpoint, CheckpointGenesis, MsgCheckpoint, MsgCpAck, MsgCpNoAck},
    msg::Msg,
    vote::{SideTxResult, Vote},
};
use tracing::*;

use crate::{
    errors::{ModuleError, ModuleResult},
    topup::AccountRootProvider,
};

pub struct CheckpointKeeper<D, R> {
    db: Arc<D>,
    reader: Arc<R>,
    accounts: Arc<dyn AccountRootProvider>,
    chain_params: ChainParams,
    params: CheckpointParams,
}

impl<D: CheckpointDatabase, R: ChainReader> CheckpointKeeper<D, R> {
    pub fn new(
        db: Arc<D>,
        reader: Arc<R>,
        accounts: Arc<dyn AccountRootProvider>,
        chain_params: ChainParams,
        params: CheckpointParams,
    ) -> Self {
        Self {
            db,
            reader,
            accounts,
            chain_params,
            params,
        }
    }

    /// First Bor block the next checkpoint has to start at, `None` if the
    /// last checkpoint already ends at the last representable block.
    fn next_start_block(&self) -> DbResult<Option<u64>> {
        Ok(match self.db.get_last_checkpoint()? {
            Some((_, cp)) => cp.end_block.checked_add(1),
            None => Some(0),
        })
    }

    async fn vote_checkpoint(&self, msg: &MsgCheckpoint) -> ModuleResult<Vote> {
        if msg.bor_chain_id != self.chain_params.bor_chain_id {
            debug!(chain_id = %msg.bor_chain_id, "checkpoint for another bor chain");
            return Ok(Vote::No);
        }

        if self.db.get_buffered_checkpoint()?.is_some() {
            debug!(start = msg.start_block, "checkpoint already buffered");
            return Ok(Vote::No);
        }

        let Some(expected_start) = self.next_start_block()? else {
            debug!(start = msg.start_block, "no block left after last checkpoint");
            return Ok(Vote::No);
        };
        if msg.start_block != expected_start {
            debug!(start = msg.start_block, %expected_start, "checkpoint does not continue the last one");
            return Ok(Vote::No);
        }

        if msg.end_block < msg.start_block {
            return Ok(Vote::No);
        }

        let Some(len) = (msg.end_block - msg.start_block).checked_add(1) else {
            debug!(start = msg.start_block, end = msg.end_block, "checkpoint spans every block");
            return Ok(Vote::No);
        };
        if len > self.params.max_checkpoint_length {
            debug!(%len, max = self.params.max_checkpoint_length, "checkpoint too long");
            return Ok(Vote::No);
        }

        let account_root = self.accounts.account_root()?;
        if msg.account_root_hash != account_root {
            debug!(expected = %account_root, got = %msg.account_root_hash, "account root mismatch");
            return Ok(Vote::No);
        }

        let root = self
            .reader
            .get_root_hash(
                msg.start_block,
                msg.end_block,
                self.chain_params.bor_chain_tx_confirmations,
            )
            .await?;
        let ok = root == Some(msg.root_hash);
        if !ok {
            debug!(start = msg.start_block, end = msg.end_block, ?root, "checkpoint root mismatch");
        }

        Ok(Vote::from_bool(ok))
    }

    async fn vote_ack(&self, msg: &MsgCpAck) -> ModuleResult<Vote> {
        let Some(buffered) = self.db.get_buffered_checkpoint()? else {
            debug!(number = msg.number, "ack without buffered checkpoint");
            return Ok(Vote::No);
        };

        if !buffered.matches_ack(msg) {
            debug!(number = msg.number, "ack does not match buffered checkpoint");
            return Ok(Vote::No);
        }

        let expected = self.db.get_ack_count()? + 1;
        if msg.number != expected {
            debug!(number = msg.number, %expected, "unexpected ack number");
            return Ok(Vote::No);
        }

        let header = self
            .reader
            .get_header_block(msg.number, self.chain_params.main_chain_tx_confirmations)
            .await?;
        let ok = header.is_some_and(|h| {
            h.proposer == msg.proposer
                && h.start_block == msg.start_block
                && h.end_block == msg.end_block
                && h.root_hash == msg.root_hash
        });

        Ok(Vote::from_bool(ok))
    }

    fn apply_checkpoint(
        &self,
        ctx: &BlockContext,
        msg: &MsgCheckpoint,
    ) -> Result<Vec<ModuleEvent>, PostTxError> {
        if self.db.get_buffered_checkpoint()?.is_some() {
            warn!(start = msg.start_block, "checkpoint already buffered, skipping");
            return Ok(Vec::new());
        }

        self.db
            .set_buffered_checkpoint(msg.to_checkpoint(ctx.block_time))?;

        info!(
            start = msg.start_block,
            end = msg.end_block,
            root = %msg.root_hash,
            "buffered checkpoint"
        );
        Ok(vec![ModuleEvent::CheckpointBuffered {
            proposer: msg.proposer,
            start_block: msg.start_block,
            end_block: msg.end_block,
            root_hash: msg.root_hash,
        }])
    }

    fn apply_ack(&self, msg: &MsgCpAck) -> Result<Vec<ModuleEvent>, PostTxError> {
        let Some(buffered) = self.db.get_buffered_checkpoint()? else {
            debug!(number = msg.number, "no buffered checkpoint, ack already applied");
            return Ok(Vec::new());
        };

        let number = self.db.get_ack_count()? + 1;
        if !buffered.matches_ack(msg) || msg.number != number {
            warn!(number = msg.number, "ack does not match buffered checkpoint, skipping");
            return Ok(Vec::new());
        }

        self.db.put_checkpoint(number, buffered.clone())?;
        self.db.set_ack_count(number)?;
        self.db.clear_buffered_checkpoint()?;

        info!(%number, start = buffered.start_block, end = buffered.end_block, "checkpoint acked");
        Ok(vec![ModuleEvent::CheckpointAcked {
            number,
            start_block: buffered.start_block,
            end_block: buffered.end_block,
        }])
    }

    /// Drops the buffered checkpoint once its buffer time has elapsed
    /// without an ack.  This is an ordinary tx and needs no votes.
    pub fn handle_no_ack(
        &self,
        ctx: &BlockContext,
        msg: &MsgCpNoAck,
    ) -> ModuleResult<Vec<ModuleEvent>> {
        let buffered = self
            .db
            .get_buffered_checkpoint()?
            .ok_or(ModuleError::NoBufferedCheckpoint)?;

        let expires_at = buffered
            .timestamp
            .saturating_add(self.params.checkpoint_buffer_time);
        if ctx.block_time < expires_at {
            return Err(ModuleError::BufferNotExpired(expires_at));
        }

        self.db.clear_buffered_checkpoint()?;
        self.db.set_last_no_ack(ctx.height)?;

        info!(from = %msg.from, height = ctx.height, start = buffered.start_block, "checkpoint no-ack");
        Ok(vec![ModuleEvent::CheckpointNoAck { height: ctx.height }])
    }

    pub fn get_buffered_checkpoint(&self) -> DbResult<Option<Checkpoint>> {
        self.db.get_buffered_checkpoint()
    }

    pub fn get_last_checkpoint(&self) -> DbResult<Option<(u64, Checkpoint)>> {
        self.db.get_last_checkpoint()
    }

    pub fn get_checkpoint(&self, number: u64) -> DbResult<Option<Checkpoint>> {
        self.db.get_checkpoint(number)
    }

    pub fn get_ack_count(&self) -> DbResult<u64> {
        self.db.get_ack_count()
    }

    pub fn get_last_no_ack(&self) -> DbResult<u64> {
        self.db.get_last_no_ack()
    }

    pub fn init_genesis(&self, genesis: &CheckpointGenesis) -> ModuleResult<()> {
        if genesis.ack_count != genesis.checkpoints.len() as u64 {
            return Err(ModuleError::Genesis(format!(
                "ack count {} but {} checkpoints",
                genesis.ack_count,
                genesis.checkpoints.len()
            )));
        }

        for (i, cp) in genesis.checkpoints.iter().enumerate() {
            self.db.put_checkpoint(i as u64 + 1, cp.clone())?;
        }

        if let Some(cp) = &genesis.buffered_checkpoint {
            self.db.set_buffered_checkpoint(cp.clone())?;
        }

        self.db.set_ack_count(genesis.ack_count)?;
        self.db.set_last_no_ack(genesis.last_no_ack)?;
        info!(ack_count = genesis.ack_count, "initialized checkpoint genesis");
        Ok(())
    }

    pub fn export_genesis(&self) -> ModuleResult<CheckpointGenesis> {
        let ack_count = self.db.get_ack_count()?;
        let checkpoints = (1..=ack_count)
            .map(|n| {
                self.db
                    .get_checkpoint(n)?
                    .ok_or(DbError::MissingEntry("checkpoint", n))
            })
            .collect::<DbResult<Vec<_>>>()?;

        Ok(CheckpointGenesis {
            buffered_checkpoint: self.db.get_buffered_checkpoint()?,
            last_no_ack: self.db.get_last_no_ack()?,
            ack_count,
            checkpoints,
        })
    }
}

#[async_trait]
impl<D, R> SideHandler for CheckpointKeeper<D, R>
where
    D: CheckpointDatabase + Send + Sync + 'static,
    R: ChainReader,
{
    async fn side_handle(&self, _ctx: &BlockContext, msg: &Msg) -> Vote {
        let res = match msg {
            Msg::Checkpoint(m) => self.vote_checkpoint(m).await,
            Msg::CheckpointAck(m) => self.vote_ack(m).await,
            other => {
                warn!(method = other.method_name(), "checkpoint got foreign msg");
                return Vote::No;
            }
        };

        res.unwrap_or_else(|err| {
            warn!(method = msg.method_name(), %err, "checkpoint check failed, voting no");
            Vote::No
        })
    }
}

impl<D, R> PostHandler for CheckpointKeeper<D, R>
where
    D: CheckpointDatabase + Send + Sync + 'static,
    R: ChainReader,
{
    fn post_handle(
        &self,
        ctx: &BlockContext,
        msg: &Msg,
        result: SideTxResult,
    ) -> Result<Vec<ModuleEvent>, PostTxError> {
        if !matches!(msg, Msg::Checkpoint(_) | Msg::CheckpointAck(_)) {
            return Err(PostTxError::WrongMsg(msg.method_name()));
        }

        if result != SideTxResult::Pass {
            return Ok(Vec::new());
        }

        match msg {
            Msg::Checkpoint(m) => self.apply_checkpoint(ctx, m),
            Msg::CheckpointAck(m) => self.apply_ack(m),
            _ => Ok(Vec::new()),
        }
    }
}

impl<D, R> MsgHandler for CheckpointKeeper<D, R>
where
    D: CheckpointDatabase + Send + Sync + 'static,
    R: ChainReader,
{
    fn handle_msg(&self, ctx: &BlockContext, msg: &Msg) -> Result<Vec<ModuleEvent>, MsgTxError> {
        let Msg::CheckpointNoAck(m) = msg else {
            return Err(MsgTxError::Rejected(format!(
                "checkpoint cannot execute {}",
                msg.method_name()
            )));
        };

        match self.handle_no_ack(ctx, m) {
            Ok(events) => Ok(events),
            Err(ModuleError::Db(e)) => Err(MsgTxError::Store(e)),
            Err(err) => Err(MsgTxError::Rejected(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use heimdall_chainio::{test_utils::TestChainReader, types::RootchainHeaderBlock};
    use heimdall_db::stubs::StubCheckpointDb;
    use heimdall_primitives::buf::{Buf20, Buf32};
    use heimdall_test_utils::ArbitraryGenerator;

    use super::*;
    use crate::test_utils::*;

    const ACCOUNT_ROOT: Buf32 = Buf32([0x0a; 32]);

    struct FixedRoot;

    impl AccountRootProvider for FixedRoot {
        fn account_root(&self) -> DbResult<Buf32> {
            Ok(ACCOUNT_ROOT)
        }
    }

    type Keeper = CheckpointKeeper<StubCheckpointDb, TestChainReader>;

    fn setup() -> (Keeper, TestChainReader) {
        let reader = TestChainReader::new();
        let keeper = CheckpointKeeper::new(
            Arc::new(StubCheckpointDb::new()),
            Arc::new(reader.clone()),
            Arc::new(FixedRoot),
            ChainParams::default(),
            CheckpointParams::default(),
        );
        (keeper, reader)
    }

    fn ack_for(msg: &MsgCheckpoint, number: u64) -> MsgCpAck {
        MsgCpAck {
            from: Buf20::from([3; 20]),
            number,
            proposer: msg.proposer,
            start_block: msg.start_block,
            end_block: msg.end_block,
            root_hash: msg.root_hash,
            tx_hash: Buf32::from([0x99; 32]),
            log_index: 0,
        }
    }

    fn header_for(msg: &MsgCheckpoint, number: u64) -> RootchainHeaderBlock {
        RootchainHeaderBlock {
            number,
            proposer: msg.proposer,
            start_block: msg.start_block,
            end_block: msg.end_block,
            root_hash: msg.root_hash,
            created_at: T,
        }
    }

    #[tokio::test]
    async fn test_side_checkpoint_checks() {
        let (keeper, reader) = setup();
        let ctx = ctx_at(10, T);
        let msg = checkpoint_msg(0, 255, ACCOUNT_ROOT);

        // Bor root not known yet.
        assert_eq!(keeper.side_handle(&ctx, &Msg::Checkpoint(msg.clone())).await, Vote::No);

        reader.set_root_hash(0, 255, msg.root_hash);
        assert_eq!(keeper.side_handle(&ctx, &Msg::Checkpoint(msg.clone())).await, Vote::Yes);

        let gap = checkpoint_msg(1, 255, ACCOUNT_ROOT);
        reader.set_root_hash(1, 255, gap.root_hash);
        assert_eq!(keeper.side_handle(&ctx, &Msg::Checkpoint(gap)).await, Vote::No);

        let too_long = checkpoint_msg(0, 1024, ACCOUNT_ROOT);
        reader.set_root_hash(0, 1024, too_long.root_hash);
        assert_eq!(keeper.side_handle(&ctx, &Msg::Checkpoint(too_long)).await, Vote::No);

        let bad_accounts = checkpoint_msg(0, 255, Buf32::from([0x0b; 32]));
        assert_eq!(keeper.side_handle(&ctx, &Msg::Checkpoint(bad_accounts)).await, Vote::No);
    }

    #[tokio::test]
    async fn test_side_checkpoint_full_range_votes_no() {
        let (keeper, reader) = setup();
        let ctx = ctx_at(10, T);

        let full = checkpoint_msg(0, u64::MAX, ACCOUNT_ROOT);
        reader.set_root_hash(0, u64::MAX, full.root_hash);
        assert_eq!(keeper.side_handle(&ctx, &Msg::Checkpoint(full)).await, Vote::No);

        // Nothing can follow a checkpoint ending at the last block.
        let ag = ArbitraryGenerator::new();
        let last = Checkpoint {
            end_block: u64::MAX,
            ..ag.generate()
        };
        keeper
            .init_genesis(&CheckpointGenesis {
                ack_count: 1,
                checkpoints: vec![last],
                ..Default::default()
            })
            .unwrap();
        let after = checkpoint_msg(0, 255, ACCOUNT_ROOT);
        reader.set_root_hash(0, 255, after.root_hash);
        assert_eq!(keeper.side_handle(&ctx, &Msg::Checkpoint(after)).await, Vote::No);
    }

    #[tokio::test]
    async fn test_buffer_then_ack() {
        let (keeper, reader) = setup();
        let ctx = ctx_at(10, T);
        let msg = checkpoint_msg(0, 255, ACCOUNT_ROOT);
        reader.set_root_hash(0, 255, msg.root_hash);

        let events = keeper
            .post_handle(&ctx, &Msg::Checkpoint(msg.clone()), SideTxResult::Pass)
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(keeper.get_buffered_checkpoint().unwrap().unwrap().timestamp, T);

        // Nothing new goes in while one is buffered.
        assert_eq!(keeper.side_handle(&ctx, &Msg::Checkpoint(msg.clone())).await, Vote::No);

        let ack = ack_for(&msg, 1);
        assert_eq!(keeper.side_handle(&ctx, &Msg::CheckpointAck(ack.clone())).await, Vote::No);
        reader.set_header_block(header_for(&msg, 1));
        assert_eq!(keeper.side_handle(&ctx, &Msg::CheckpointAck(ack.clone())).await, Vote::Yes);
        assert_eq!(
            keeper.side_handle(&ctx, &Msg::CheckpointAck(ack_for(&msg, 2))).await,
            Vote::No
        );

        let events = keeper
            .post_handle(&ctx, &Msg::CheckpointAck(ack.clone()), SideTxResult::Pass)
            .unwrap();
        assert_eq!(
            events,
            vec![ModuleEvent::CheckpointAcked {
                number: 1,
                start_block: 0,
                end_block: 255
            }]
        );
        assert_eq!(keeper.get_ack_count().unwrap(), 1);
        assert_eq!(keeper.get_buffered_checkpoint().unwrap(), None);
        assert_eq!(keeper.get_last_checkpoint().unwrap().unwrap().0, 1);

        // A repeated ack changes nothing.
        assert!(keeper
            .post_handle(&ctx, &Msg::CheckpointAck(ack), SideTxResult::Pass)
            .unwrap()
            .is_empty());
        assert_eq!(keeper.get_ack_count().unwrap(), 1);

        // The next checkpoint continues from the acked one.
        let next = checkpoint_msg(256, 511, ACCOUNT_ROOT);
        reader.set_root_hash(256, 511, next.root_hash);
        assert_eq!(keeper.side_handle(&ctx, &Msg::Checkpoint(next)).await, Vote::Yes);
    }

    #[test]
    fn test_post_skip_leaves_buffer_empty() {
        let (keeper, _) = setup();
        let msg = Msg::Checkpoint(checkpoint_msg(0, 255, ACCOUNT_ROOT));
        assert!(keeper
            .post_handle(&ctx_at(10, T), &msg, SideTxResult::Skip)
            .unwrap()
            .is_empty());
        assert_eq!(keeper.get_buffered_checkpoint().unwrap(), None);
    }

    #[test]
    fn test_no_ack_after_buffer_time() {
        let (keeper, _) = setup();
        let buffer_time = CheckpointParams::default().checkpoint_buffer_time;
        let no_ack = MsgCpNoAck {
            from: Buf20::from([3; 20]),
        };

        assert!(matches!(
            keeper.handle_no_ack(&ctx_at(10, T), &no_ack),
            Err(ModuleError::NoBufferedCheckpoint)
        ));

        keeper
            .post_handle(
                &ctx_at(10, T),
                &Msg::Checkpoint(checkpoint_msg(0, 255, ACCOUNT_ROOT)),
                SideTxResult::Pass,
            )
            .unwrap();

        assert!(matches!(
            keeper.handle_no_ack(&ctx_at(11, T + buffer_time - 1), &no_ack),
            Err(ModuleError::BufferNotExpired(t)) if t == T + buffer_time
        ));

        let events = keeper
            .handle_no_ack(&ctx_at(12, T + buffer_time), &no_ack)
            .unwrap();
        assert_eq!(events, vec![ModuleEvent::CheckpointNoAck { height: 12 }]);
        assert_eq!(keeper.get_buffered_checkpoint().unwrap(), None);
        assert_eq!(keeper.get_last_no_ack().unwrap(), 12);
    }

    #[test]
    fn test_genesis_roundtrip() {
        let (keeper, _) = setup();
        let ag = ArbitraryGenerator::new();
        let genesis = CheckpointGenesis {
            buffered_checkpoint: Some(ag.generate()),
            last_no_ack: 7,
            ack_count: 2,
            checkpoints: vec![ag.generate(), ag.generate()],
        };

        keeper.init_genesis(&genesis).unwrap();
        assert_eq!(keeper.export_genesis().unwrap(), genesis);
    }

    #[test]
    fn test_genesis_rejects_bad_ack_count() {
        let (keeper, _) = setup();
        let genesis = CheckpointGenesis {
            ack_count: 3,
            ..Default::default()
        };
        assert!(matches!(
            keeper.init_genesis(&genesis),
            Err(ModuleError::Genesis(_))
        ));
    }
}
