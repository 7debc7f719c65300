pub use crate::buf::*;
pub use crate::params::*;
