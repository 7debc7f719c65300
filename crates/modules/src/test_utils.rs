use heimdall_primitives::buf::{Buf20, Buf32};
use heimdall_sidetx::BlockContext;
use heimdall_state::{checkpoint::MsgCheckpoint, clerk::MsgEventRecord};

/// Block time the fixtures are committed at.
pub(crate) const T: u64 = 1_700_000_000;

pub(crate) fn ctx_at(height: u64, block_time: u64) -> BlockContext {
    BlockContext::new(height, block_time, "heimdall-137", Buf32::from([0xbb; 32]))
}

pub(crate) fn event_record_msg(id: u64) -> MsgEventRecord {
    MsgEventRecord {
        from: Buf20::from([1; 20]),
        tx_hash: Buf32::from([0xde; 32]),
        log_index: 1,
        block_number: 100,
        contract_address: Buf20::from([0xab; 20]),
        data: vec![1, 2, 3],
        id,
        chain_id: "137".to_string(),
    }
}

pub(crate) fn checkpoint_msg(start_block: u64, end_block: u64, account_root_hash: Buf32) -> MsgCheckpoint {
    MsgCheckpoint {
        proposer: Buf20::from([1; 20]),
        start_block,
        end_block,
        root_hash: Buf32::from([2; 32]),
        account_root_hash,
        bor_chain_id: "137".to_string(),
    }
}
