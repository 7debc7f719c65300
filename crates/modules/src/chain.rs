//! Rootchain lookups shared by the side handlers and the old-tx queries.

use heimdall_chainio::{
    traits::ChainReader,
    types::{ChainEvent, EventKind},
    ClientResult,
};
use heimdall_primitives::{buf::TxHash, sequence};
use tracing::*;

use crate::errors::{ModuleError, ModuleResult};

/// Position of a log a side msg claims to be built from.
#[derive(Copy, Clone, Debug)]
pub(crate) struct LogRef {
    pub tx_hash: TxHash,
    pub log_index: u64,
    pub block_number: u64,
}

/// Fetches the confirmed receipt for `log` and decodes the event of `kind`
/// at its log index.
///
/// Returns `None` if the receipt is missing or not deep enough, if there is
/// no such event, or if the receipt is in a different block than claimed.
pub(crate) async fn fetch_event<R: ChainReader>(
    reader: &R,
    log: LogRef,
    confirmations: u64,
    kind: EventKind,
) -> ClientResult<Option<ChainEvent>> {
    let Some(receipt) = reader
        .get_confirmed_receipt(log.tx_hash, confirmations)
        .await?
    else {
        debug!(tx = %log.tx_hash, %confirmations, "no confirmed receipt");
        return Ok(None);
    };

    if receipt.block_number != log.block_number {
        debug!(
            tx = %log.tx_hash,
            claimed = log.block_number,
            actual = receipt.block_number,
            "receipt block mismatch"
        );
        return Ok(None);
    }

    let event = reader.decode_event(&receipt, log.log_index, kind);
    if event.is_none() {
        debug!(tx = %log.tx_hash, log_index = log.log_index, ?kind, "event not found in receipt");
    }
    Ok(event)
}

/// Resolves the dedup sequence of `(tx_hash, log_index)` through the
/// receipt's block number.
pub(crate) async fn log_sequence<R: ChainReader>(
    reader: &R,
    tx_hash: TxHash,
    log_index: u64,
    confirmations: u64,
) -> ModuleResult<u64> {
    let receipt = reader
        .get_confirmed_receipt(tx_hash, confirmations)
        .await?
        .ok_or(ModuleError::ReceiptNotFound(tx_hash))?;

    sequence::compute_sequence(receipt.block_number, log_index)
        .ok_or(ModuleError::InvalidLogPosition(receipt.block_number, log_index))
}
