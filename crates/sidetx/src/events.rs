use heimdall_primitives::buf::{Address, Buf32, TxHash};
use heimdall_state::stake::ValidatorId;

/// Domain events emitted by post handlers when they change state.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ModuleEvent {
    Record {
        id: u64,
        contract: Address,
        tx_hash: TxHash,
        log_index: u64,
        record_time: u64,
    },

    CheckpointBuffered {
        proposer: Address,
        start_block: u64,
        end_block: u64,
        root_hash: Buf32,
    },

    CheckpointAcked {
        number: u64,
        start_block: u64,
        end_block: u64,
    },

    CheckpointNoAck {
        height: u64,
    },

    FeeTopup {
        user: Address,
        fee: u128,
    },

    ValidatorJoined {
        id: ValidatorId,
        signer: Address,
        power: u64,
    },

    StakeUpdated {
        id: ValidatorId,
        power: u64,
    },

    SignerUpdated {
        id: ValidatorId,
        signer: Address,
    },

    ValidatorExiting {
        id: ValidatorId,
        deactivation_epoch: u64,
    },
}
