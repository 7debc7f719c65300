mod config;
pub mod relayer;
pub mod sidetx;

pub use config::*;
