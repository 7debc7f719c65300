//! Side-transaction consensus.  Validators independently vote on messages
//! whose validity depends on external chains, the votes ride in vote
//! extensions, and the tally decides which messages get applied.

pub mod context;
pub mod errors;
pub mod events;
pub mod executor;
pub mod handler;
pub mod metrics;
pub mod non_rp;
pub mod registry;
pub mod signer;
pub mod tally;

#[cfg(test)]
mod test_utils;

pub use context::BlockContext;
pub use errors::*;
pub use events::ModuleEvent;
pub use executor::{FinalizeOutcome, SideTxExecutor, SignedVoteExtension};
pub use handler::{MsgHandler, PostHandler, SideHandler};
pub use registry::{SideTxRegistry, SideTxRegistryBuilder};
