use heimdall_chainio::ClientError;
use thiserror::Error;

pub type RelayResult<T> = Result<T, RelayError>;

/// Transport failures while relaying.  These say nothing about the event
/// itself, so the task is retried with backoff.
#[derive(Debug, Clone, Error)]
pub enum RelayError {
    #[error("consensus client: {0}")]
    Consensus(String),

    #[error("broadcast: {0}")]
    Broadcast(String),

    #[error("chain: {0}")]
    Chain(#[from] ClientError),
}

/// Why a tx broadcast did not go through.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum BroadcastError {
    /// The node refused the tx for good.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The relayer's account has no fee balance yet.
    #[error("account not provisioned")]
    AccountNotProvisioned,

    #[error("transport: {0}")]
    Transport(String),
}
