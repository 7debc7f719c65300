use heimdall_db::DbError;
use heimdall_primitives::buf::TxHash;
use heimdall_state::{errors::CodecError, msg::SideMsgKind};
use thiserror::Error;

/// Assembling the registry failed.  Always a startup misconfiguration.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum RegistryError {
    #[error("side msg kinds without handlers: {0:?}")]
    MissingHandlers(Vec<SideMsgKind>),

    #[error("handlers registered twice for {0}")]
    DuplicateHandlers(SideMsgKind),

    #[error("msg handler registered twice for {0}")]
    DuplicateMsgHandler(&'static str),

    #[error("side msg {0} registered as a plain msg")]
    SideMsgAsPlain(&'static str),
}

/// Applying a passed side-tx failed.  These halt block processing.
#[derive(Debug, Error)]
pub enum PostTxError {
    #[error("store: {0}")]
    Store(#[from] DbError),

    #[error("post handler got unexpected msg {0}")]
    WrongMsg(&'static str),

    #[error("state invariant violated: {0}")]
    Invariant(String),
}

/// Executing a message that needs no votes failed.
#[derive(Debug, Error)]
pub enum MsgTxError {
    /// The message is not acceptable in the current state.  The tx fails
    /// and nothing changes.
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("store: {0}")]
    Store(#[from] DbError),
}

/// Failure to decode or authenticate a non-rp vote extension payload.
#[derive(Debug, Error)]
pub enum NonRpError {
    #[error("empty payload")]
    Empty,

    #[error("unknown marker byte {0:#04x}")]
    UnknownMarker(u8),

    #[error("dummy payload does not match height and chain")]
    DummyMismatch,

    #[error("checkpoint payload: {0}")]
    Checkpoint(#[from] CodecError),

    #[error("bad signature")]
    BadSignature,
}

/// A vote extension from another validator failed verification.
#[derive(Debug, Error)]
pub enum VoteExtensionError {
    #[error("vote for height {0}, expected {1}")]
    WrongHeight(u64, u64),

    #[error("vote for another block")]
    WrongBlockHash,

    #[error("duplicate response for tx {0}")]
    DuplicateResponse(TxHash),

    #[error("response for tx {0} not in the block")]
    UnknownTx(TxHash),

    #[error("malformed milestone proposition")]
    BadMilestone,

    #[error("bad extension signature")]
    BadSignature,

    #[error("non-rp extension: {0}")]
    NonRp(#[from] NonRpError),
}

#[derive(Debug, Error)]
pub enum SideTxError {
    #[error("no handlers for side msg {0}")]
    MissingHandlers(SideMsgKind),

    #[error("invalid signing key")]
    InvalidKey,

    #[error("post tx {0}: {1}")]
    Post(TxHash, #[source] PostTxError),

    #[error("msg tx {0}: {1}")]
    Msg(TxHash, #[source] DbError),
}
