use thiserror::Error;

/// Stateless validation failure of a message.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum MsgError {
    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("state sync data too large ({0} bytes, max {1})")]
    DataTooLarge(usize, usize),

    #[error("invalid block range {0}..={1}")]
    InvalidBlockRange(u64, u64),

    #[error("invalid log position (block {0}, log {1})")]
    InvalidLogPosition(u64, u64),

    #[error("invalid nonce {0}")]
    InvalidNonce(u64),

    #[error("zero amount")]
    ZeroAmount,
}

/// Failure decoding a tx or a packed payload.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("borsh: {0}")]
    Borsh(#[from] std::io::Error),

    #[error("packed payload: {0}")]
    Packed(&'static str),
}
