//! Module keepers for the side-tx message kinds.  Each keeper owns one
//! module's store, votes on its messages against the rootchain and applies
//! them once the validator set agrees.

mod chain;
pub mod checkpoint;
pub mod clerk;
pub mod errors;
pub mod registry;
pub mod stake;
pub mod topup;

#[cfg(test)]
mod test_utils;

pub use errors::{ModuleError, ModuleResult};
pub use registry::Modules;
