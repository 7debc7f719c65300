use heimdall_chainio::ClientError;
use heimdall_db::DbError;
use heimdall_primitives::buf::TxHash;
use thiserror::Error;

pub type ModuleResult<T> = Result<T, ModuleError>;

/// Errors from keeper queries and ordinary (non side-tx) message handling.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("db: {0}")]
    Db(#[from] DbError),

    #[error("chain: {0}")]
    Client(#[from] ClientError),

    #[error("no confirmed receipt for tx {0}")]
    ReceiptNotFound(TxHash),

    #[error("invalid log position (block {0}, log {1})")]
    InvalidLogPosition(u64, u64),

    #[error("no checkpoint buffered")]
    NoBufferedCheckpoint,

    #[error("checkpoint buffer open until {0}")]
    BufferNotExpired(u64),

    #[error("invalid genesis: {0}")]
    Genesis(String),
}
