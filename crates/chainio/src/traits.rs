use async_trait::async_trait;
use heimdall_primitives::buf::{Buf32, TxHash};

use crate::{
    types::{ChainEvent, ChainLog, EventKind, Receipt, RootchainHeaderBlock},
    ClientResult,
};

/// Read access to the rootchain (and, for checkpoint roots, Bor).
///
/// Every validator queries the same finalized chain state through this, so
/// implementations must only report data with the requested confirmations.
#[async_trait]
pub trait ChainReader: Sync + Send + 'static {
    /// Returns the receipt of a rootchain tx if it has at least
    /// `confirmations` confirmations, `None` if it is unknown or too shallow.
    async fn get_confirmed_receipt(
        &self,
        tx_hash: TxHash,
        confirmations: u64,
    ) -> ClientResult<Option<Receipt>>;

    /// Decodes the log at `log_index` of a receipt as an event of `kind`.
    /// Returns `None` if there is no such log or it is a different event.
    fn decode_event(&self, receipt: &Receipt, log_index: u64, kind: EventKind)
        -> Option<ChainEvent>;

    /// Height of the rootchain tip.
    async fn latest_block_number(&self) -> ClientResult<u64>;

    /// Decoded logs of the watched contracts in blocks `from..=to`, ordered
    /// by block then log index.
    async fn get_logs(&self, from: u64, to: u64) -> ClientResult<Vec<ChainLog>>;

    /// Merkle root over the Bor block headers `start..=end`, `None` if those
    /// blocks are not yet `confirmations` deep.
    async fn get_root_hash(
        &self,
        start: u64,
        end: u64,
        confirmations: u64,
    ) -> ClientResult<Option<Buf32>>;

    /// Checkpoint header block stored on the rootchain under `number`.
    async fn get_header_block(
        &self,
        number: u64,
        confirmations: u64,
    ) -> ClientResult<Option<RootchainHeaderBlock>>;
}
