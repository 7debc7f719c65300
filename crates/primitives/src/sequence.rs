//! Dedup sequence markers for external log positions.

/// Multiplier separating the block number from the log index in a sequence.
/// No receipt carries anywhere near this many logs.
pub const LOG_INDEX_UNIT: u64 = 100_000;

/// Computes the dedup sequence for a log at `(block_number, log_index)`.
///
/// Returns `None` if the log index would collide with the next block's range
/// or if the value overflows.
pub fn compute_sequence(block_number: u64, log_index: u64) -> Option<u64> {
    if log_index >= LOG_INDEX_UNIT {
        return None;
    }

    block_number
        .checked_mul(LOG_INDEX_UNIT)?
        .checked_add(log_index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_orders_by_block_then_log() {
        let a = compute_sequence(10, 99).unwrap();
        let b = compute_sequence(11, 0).unwrap();
        assert!(a < b);
        assert_eq!(compute_sequence(10, 1), Some(1_000_001));
    }

    #[test]
    fn test_sequence_rejects_large_log_index() {
        assert_eq!(compute_sequence(1, LOG_INDEX_UNIT), None);
    }

    #[test]
    fn test_sequence_overflow() {
        assert_eq!(compute_sequence(u64::MAX, 0), None);
    }
}
