use heimdall_primitives::buf::Buf32;

/// Deterministic execution context of the block being built or finalized.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BlockContext {
    pub height: u64,

    /// Consensus block time, unix seconds.
    pub block_time: u64,

    /// Heimdall chain id.
    pub chain_id: String,

    /// Hash of the block the votes are cast for.
    pub block_hash: Buf32,
}

impl BlockContext {
    pub fn new(height: u64, block_time: u64, chain_id: impl Into<String>, block_hash: Buf32) -> Self {
        Self {
            height,
            block_time,
            chain_id: chain_id.into(),
            block_hash,
        }
    }
}
