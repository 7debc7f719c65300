//! Data model for the side-tx modules: messages, persisted entities and the
//! vote extension types exchanged during consensus.

pub mod checkpoint;
pub mod clerk;
pub mod errors;
pub mod msg;
pub mod stake;
pub mod topup;
pub mod tx;
pub mod vote;

pub mod prelude;
