//! Bridge relayer.  Watches the rootchain for confirmed contract events and
//! submits them to Heimdall as side-tx msgs, one worker per event family.

pub mod client;
pub mod errors;
pub mod listener;
pub mod mempool;
pub mod outcome;
pub mod processor;
pub mod scheduler;
mod service;

#[cfg(test)]
mod test_utils;

pub use errors::{BroadcastError, RelayError, RelayResult};
pub use outcome::TaskOutcome;
pub use service::start_relayer;
