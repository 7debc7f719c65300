use async_trait::async_trait;
use heimdall_state::{
    msg::Msg,
    vote::{SideTxResult, Vote},
};

use crate::{
    context::BlockContext,
    errors::{MsgTxError, PostTxError},
    events::ModuleEvent,
};

/// Independently re-derives a validator's vote on a side-tx message.
///
/// Must not mutate local state: every validator runs it for every block and
/// the results have to converge.  Anything that prevents a positive
/// verification is a NO.
#[async_trait]
pub trait SideHandler: Send + Sync + 'static {
    async fn side_handle(&self, ctx: &BlockContext, msg: &Msg) -> Vote;
}

/// Applies a side-tx message after the tally.
///
/// Implementations do nothing unless `result` is [`SideTxResult::Pass`] and
/// must be idempotent.  Errors are store failures and halt the node.
pub trait PostHandler: Send + Sync + 'static {
    fn post_handle(
        &self,
        ctx: &BlockContext,
        msg: &Msg,
        result: SideTxResult,
    ) -> Result<Vec<ModuleEvent>, PostTxError>;
}

/// Executes a message that needs no votes, such as a checkpoint no-ack.
///
/// Runs in block order next to the post handlers.  A
/// [`MsgTxError::Rejected`] only fails that tx, store errors halt the node.
pub trait MsgHandler: Send + Sync + 'static {
    fn handle_msg(&self, ctx: &BlockContext, msg: &Msg) -> Result<Vec<ModuleEvent>, MsgTxError>;
}
