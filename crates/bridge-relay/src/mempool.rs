use heimdall_primitives::buf::TxHash;
use heimdall_state::tx::Tx;
use tracing::*;

/// Checks if a msg built from the log at `(tx_hash, log_index)` is already
/// waiting in the mempool.  Pending txs that fail to decode are ignored.
pub fn is_in_flight(pending: &[Vec<u8>], tx_hash: TxHash, log_index: u64) -> bool {
    pending
        .iter()
        .filter_map(|raw| match Tx::decode(raw) {
            Ok(tx) => Some(tx),
            Err(err) => {
                trace!(%err, "skipping undecodable mempool tx");
                None
            }
        })
        .any(|tx| tx.msg.log_position() == Some((tx_hash, log_index)))
}
