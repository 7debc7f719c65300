//! Error types for the chain reader.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Network error, retry might help
    #[error("network: {0}")]
    Network(String),

    /// Timeout error, retry might help
    #[error("timeout")]
    Timeout,

    /// Node returned an error
    #[error("node returned error '{1}' (code {0})")]
    Server(i32, String),

    /// Error decoding the response, retry might not help
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Unknown error, unlikely to be recoverable
    #[error("{0}")]
    Other(String),
}

impl ClientError {
    /// Whether retrying the same request later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Network(_) | ClientError::Timeout)
    }
}
