pub use crate::checkpoint::*;
pub use crate::clerk::*;
pub use crate::msg::{Msg, SideMsgKind};
pub use crate::stake::*;
pub use crate::topup::*;
pub use crate::tx::Tx;
pub use crate::vote::*;
