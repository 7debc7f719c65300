//! Crate includes reusable utils for the node services that handle common
//! behavior, such as initializing the tracing framework and backoff policies.

pub mod env;
pub mod logging;
pub mod retry;
