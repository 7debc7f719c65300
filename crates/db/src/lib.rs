//! Storage interfaces for the side-tx modules.  The node's key-value store is
//! an external collaborator, these traits are the typed collections it must
//! provide.

pub mod errors;
pub mod traits;

#[cfg(any(test, feature = "stubs"))]
pub mod stubs;

/// Wrapper result type for database operations.
pub type DbResult<T> = Result<T, errors::DbError>;

pub use errors::DbError;
