//! Reading the rootchain and Bor.  Log fetching and ABI decoding live behind
//! the [`traits::ChainReader`] trait, the rest of the node only sees decoded
//! events.

pub mod errors;
pub mod traits;
pub mod types;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use errors::ClientError;

pub type ClientResult<T> = Result<T, ClientError>;
