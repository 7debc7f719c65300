//! Top-level message container and the side-tx message kinds.

use std::fmt;

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use heimdall_primitives::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{checkpoint::*, clerk::*, errors::MsgError, stake::*, topup::*};

/// Every message the side-tx modules accept.
#[derive(
    Clone,
    Debug,
    Eq,
    PartialEq,
    Arbitrary,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub enum Msg {
    EventRecord(MsgEventRecord),
    Checkpoint(MsgCheckpoint),
    CheckpointAck(MsgCpAck),
    CheckpointNoAck(MsgCpNoAck),
    TopupTx(MsgTopupTx),
    ValidatorJoin(MsgValidatorJoin),
    StakeUpdate(MsgStakeUpdate),
    SignerUpdate(MsgSignerUpdate),
    ValidatorExit(MsgValidatorExit),
}

impl Msg {
    /// Fully qualified method name, as routed by the application.
    pub fn method_name(&self) -> &'static str {
        match self {
            Msg::CheckpointNoAck(_) => MsgCpNoAck::METHOD_NAME,
            other => other
                .side_kind()
                .expect("msg: side msg without kind")
                .method_name(),
        }
    }

    /// Returns the side-tx kind if this message goes through side-tx voting.
    pub fn side_kind(&self) -> Option<SideMsgKind> {
        Some(match self {
            Msg::EventRecord(_) => SideMsgKind::EventRecord,
            Msg::Checkpoint(_) => SideMsgKind::Checkpoint,
            Msg::CheckpointAck(_) => SideMsgKind::CheckpointAck,
            Msg::TopupTx(_) => SideMsgKind::TopupTx,
            Msg::ValidatorJoin(_) => SideMsgKind::ValidatorJoin,
            Msg::StakeUpdate(_) => SideMsgKind::StakeUpdate,
            Msg::SignerUpdate(_) => SideMsgKind::SignerUpdate,
            Msg::ValidatorExit(_) => SideMsgKind::ValidatorExit,
            Msg::CheckpointNoAck(_) => return None,
        })
    }

    pub fn validate_basic(&self) -> Result<(), MsgError> {
        match self {
            Msg::EventRecord(m) => m.validate_basic(),
            Msg::Checkpoint(m) => m.validate_basic(),
            Msg::CheckpointAck(m) => m.validate_basic(),
            Msg::CheckpointNoAck(m) => m.validate_basic(),
            Msg::TopupTx(m) => m.validate_basic(),
            Msg::ValidatorJoin(m) => m.validate_basic(),
            Msg::StakeUpdate(m) => m.validate_basic(),
            Msg::SignerUpdate(m) => m.validate_basic(),
            Msg::ValidatorExit(m) => m.validate_basic(),
        }
    }

    /// External log position `(tx_hash, log_index)` the message was built
    /// from, if any.
    pub fn log_position(&self) -> Option<(TxHash, u64)> {
        match self {
            Msg::EventRecord(m) => Some((m.tx_hash, m.log_index)),
            Msg::CheckpointAck(m) => Some((m.tx_hash, m.log_index)),
            Msg::TopupTx(m) => Some((m.tx_hash, m.log_index)),
            Msg::ValidatorJoin(m) => Some((m.tx_hash, m.log_index)),
            Msg::StakeUpdate(m) => Some((m.tx_hash, m.log_index)),
            Msg::SignerUpdate(m) => Some((m.tx_hash, m.log_index)),
            Msg::ValidatorExit(m) => Some((m.tx_hash, m.log_index)),
            Msg::Checkpoint(_) | Msg::CheckpointNoAck(_) => None,
        }
    }

    /// Validator the message is about, for staking lifecycle messages.
    pub fn staking_validator(&self) -> Option<ValidatorId> {
        match self {
            Msg::ValidatorJoin(m) => Some(m.val_id),
            Msg::StakeUpdate(m) => Some(m.val_id),
            Msg::SignerUpdate(m) => Some(m.val_id),
            Msg::ValidatorExit(m) => Some(m.val_id),
            _ => None,
        }
    }
}

/// Kinds of messages that go through side-tx voting.  Every kind must have
/// exactly one registered handler pair.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Arbitrary,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub enum SideMsgKind {
    EventRecord,
    Checkpoint,
    CheckpointAck,
    TopupTx,
    ValidatorJoin,
    StakeUpdate,
    SignerUpdate,
    ValidatorExit,
}

impl SideMsgKind {
    pub const ALL: [SideMsgKind; 8] = [
        SideMsgKind::EventRecord,
        SideMsgKind::Checkpoint,
        SideMsgKind::CheckpointAck,
        SideMsgKind::TopupTx,
        SideMsgKind::ValidatorJoin,
        SideMsgKind::StakeUpdate,
        SideMsgKind::SignerUpdate,
        SideMsgKind::ValidatorExit,
    ];

    pub fn method_name(&self) -> &'static str {
        match self {
            SideMsgKind::EventRecord => "/heimdallv2.clerk.MsgEventRecord",
            SideMsgKind::Checkpoint => "/heimdallv2.checkpoint.MsgCheckpoint",
            SideMsgKind::CheckpointAck => "/heimdallv2.checkpoint.MsgCpAck",
            SideMsgKind::TopupTx => "/heimdallv2.topup.MsgTopupTx",
            SideMsgKind::ValidatorJoin => "/heimdallv2.stake.MsgValidatorJoin",
            SideMsgKind::StakeUpdate => "/heimdallv2.stake.MsgStakeUpdate",
            SideMsgKind::SignerUpdate => "/heimdallv2.stake.MsgSignerUpdate",
            SideMsgKind::ValidatorExit => "/heimdallv2.stake.MsgValidatorExit",
        }
    }

    /// Looks up a kind by method name.  Unknown names, including messages
    /// that never go through side-tx voting, yield `None`.
    pub fn from_method_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.method_name() == name)
    }
}

impl fmt::Display for SideMsgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}
