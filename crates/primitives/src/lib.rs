//! Collection of generic internal data types that are used widely across the
//! side-tx pipeline and the bridge relayer.

pub mod buf;
pub mod hash;
pub mod params;
pub mod sequence;

pub mod prelude;
