//! Metrics sink injected into the executor.

use std::collections::BTreeMap;

use heimdall_state::{
    msg::SideMsgKind,
    vote::{SideTxResult, Vote},
};
use parking_lot::Mutex;

pub trait SideTxMetrics: Send + Sync + 'static {
    /// This validator voted on a side msg.
    fn record_side_vote(&self, kind: SideMsgKind, vote: Vote);

    /// A side handler hit the chain reader timeout.
    fn record_side_timeout(&self, kind: SideMsgKind);

    /// The tally decided a side msg.
    fn record_tally_result(&self, kind: SideMsgKind, result: SideTxResult);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl SideTxMetrics for NoopMetrics {
    fn record_side_vote(&self, _kind: SideMsgKind, _vote: Vote) {}

    fn record_side_timeout(&self, _kind: SideMsgKind) {}

    fn record_tally_result(&self, _kind: SideMsgKind, _result: SideTxResult) {}
}

#[derive(Debug, Default)]
struct Counters {
    votes: BTreeMap<(SideMsgKind, bool), u64>,
    timeouts: BTreeMap<SideMsgKind, u64>,
    results: BTreeMap<(SideMsgKind, bool), u64>,
}

/// Counts everything in memory.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    counters: Mutex<Counters>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn votes(&self, kind: SideMsgKind, vote: Vote) -> u64 {
        let key = (kind, vote == Vote::Yes);
        self.counters.lock().votes.get(&key).copied().unwrap_or(0)
    }

    pub fn timeouts(&self, kind: SideMsgKind) -> u64 {
        self.counters.lock().timeouts.get(&kind).copied().unwrap_or(0)
    }

    pub fn results(&self, kind: SideMsgKind, result: SideTxResult) -> u64 {
        let key = (kind, result == SideTxResult::Pass);
        self.counters.lock().results.get(&key).copied().unwrap_or(0)
    }
}

impl SideTxMetrics for InMemoryMetrics {
    fn record_side_vote(&self, kind: SideMsgKind, vote: Vote) {
        *self
            .counters
            .lock()
            .votes
            .entry((kind, vote == Vote::Yes))
            .or_default() += 1;
    }

    fn record_side_timeout(&self, kind: SideMsgKind) {
        *self.counters.lock().timeouts.entry(kind).or_default() += 1;
    }

    fn record_tally_result(&self, kind: SideMsgKind, result: SideTxResult) {
        *self
            .counters
            .lock()
            .results
            .entry((kind, result == SideTxResult::Pass))
            .or_default() += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_counts() {
        let m = InMemoryMetrics::new();
        m.record_side_vote(SideMsgKind::EventRecord, Vote::Yes);
        m.record_side_vote(SideMsgKind::EventRecord, Vote::Yes);
        m.record_side_vote(SideMsgKind::EventRecord, Vote::No);
        m.record_side_timeout(SideMsgKind::Checkpoint);
        m.record_tally_result(SideMsgKind::TopupTx, SideTxResult::Skip);

        assert_eq!(m.votes(SideMsgKind::EventRecord, Vote::Yes), 2);
        assert_eq!(m.votes(SideMsgKind::EventRecord, Vote::No), 1);
        assert_eq!(m.timeouts(SideMsgKind::Checkpoint), 1);
        assert_eq!(m.timeouts(SideMsgKind::EventRecord), 0);
        assert_eq!(m.results(SideMsgKind::TopupTx, SideTxResult::Skip), 1);
    }
}
