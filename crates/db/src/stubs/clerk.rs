use std::collections::{BTreeMap, BTreeSet};

use heimdall_state::clerk::EventRecord;
use parking_lot::RwLock;

use crate::{errors::DbError, traits::ClerkDatabase, DbResult};

#[derive(Debug, Default)]
struct InnerState {
    records: BTreeMap<u64, EventRecord>,

    /// `(record_time, id) -> id`
    time_index: BTreeMap<(u64, u64), u64>,

    sequences: BTreeSet<u64>,
}

/// Clerk store.  Both record indexes live behind one lock so a record write
/// is all-or-nothing.
#[derive(Debug, Default)]
pub struct StubClerkDb {
    state: RwLock<InnerState>,
}

impl StubClerkDb {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClerkDatabase for StubClerkDb {
    fn put_event_record(&self, record: EventRecord) -> DbResult<()> {
        let mut st = self.state.write();
        if st.records.contains_key(&record.id) {
            return Err(DbError::EntryAlreadyExists("event record", record.id));
        }

        st.time_index
            .insert((record.record_time, record.id), record.id);
        st.records.insert(record.id, record);
        Ok(())
    }

    fn get_event_record(&self, id: u64) -> DbResult<Option<EventRecord>> {
        Ok(self.state.read().records.get(&id).cloned())
    }

    fn has_event_record(&self, id: u64) -> DbResult<bool> {
        Ok(self.state.read().records.contains_key(&id))
    }

    fn get_event_records(&self, offset: usize, limit: usize) -> DbResult<Vec<EventRecord>> {
        let st = self.state.read();
        Ok(st
            .records
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn get_event_records_by_time(
        &self,
        from: u64,
        to: u64,
        offset: usize,
        limit: usize,
    ) -> DbResult<Vec<EventRecord>> {
        if from >= to {
            return Ok(Vec::new());
        }

        let st = self.state.read();
        st.time_index
            .range((from, 0)..(to, 0))
            .skip(offset)
            .take(limit)
            .map(|(_, id)| {
                st.records
                    .get(id)
                    .cloned()
                    .ok_or(DbError::MissingEntry("event record", *id))
            })
            .collect()
    }

    fn get_event_record_count(&self) -> DbResult<u64> {
        Ok(self.state.read().records.len() as u64)
    }

    fn put_record_sequence(&self, sequence: u64) -> DbResult<()> {
        self.state.write().sequences.insert(sequence);
        Ok(())
    }

    fn has_record_sequence(&self, sequence: u64) -> DbResult<bool> {
        Ok(self.state.read().sequences.contains(&sequence))
    }

    fn get_record_sequences(&self) -> DbResult<Vec<u64>> {
        Ok(self.state.read().sequences.iter().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use heimdall_test_utils::ArbitraryGenerator;

    use super::*;

    fn record_at(ag: &ArbitraryGenerator, id: u64, time: u64) -> EventRecord {
        let mut rec: EventRecord = ag.generate();
        rec.id = id;
        rec.record_time = time;
        rec
    }

    #[test]
    fn test_put_and_get_record() {
        let db = StubClerkDb::new();
        let ag = ArbitraryGenerator::new();
        let rec = record_at(&ag, 5, 100);

        db.put_event_record(rec.clone()).unwrap();

        assert!(db.has_event_record(5).unwrap());
        assert_eq!(db.get_event_record(5).unwrap(), Some(rec));
        assert_eq!(db.get_event_record_count().unwrap(), 1);
    }

    #[test]
    fn test_put_record_does_not_overwrite() {
        let db = StubClerkDb::new();
        let ag = ArbitraryGenerator::new();
        let first = record_at(&ag, 5, 100);
        let second = record_at(&ag, 5, 200);

        db.put_event_record(first.clone()).unwrap();
        let res = db.put_event_record(second);

        assert!(matches!(res, Err(DbError::EntryAlreadyExists(_, 5))));
        assert_eq!(db.get_event_record(5).unwrap(), Some(first));
        // The time index must not have picked up the rejected write.
        assert!(db
            .get_event_records_by_time(150, 300, 0, 10)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_time_range_is_half_open_and_sorted() {
        let db = StubClerkDb::new();
        let ag = ArbitraryGenerator::new();

        // Insert out of time order.
        for (id, time) in [(1, 30), (2, 10), (3, 20), (4, 40), (5, 20)] {
            db.put_event_record(record_at(&ag, id, time)).unwrap();
        }

        let got: Vec<_> = db
            .get_event_records_by_time(20, 40, 0, 100)
            .unwrap()
            .into_iter()
            .map(|r| (r.record_time, r.id))
            .collect();
        assert_eq!(got, vec![(20, 3), (20, 5), (30, 1)]);

        let paged: Vec<_> = db
            .get_event_records_by_time(0, 100, 1, 2)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(paged, vec![3, 5]);

        assert!(db.get_event_records_by_time(40, 40, 0, 10).unwrap().is_empty());
    }

    #[test]
    fn test_records_paged_by_id() {
        let db = StubClerkDb::new();
        let ag = ArbitraryGenerator::new();
        for id in [4, 1, 5, 2, 3] {
            db.put_event_record(record_at(&ag, id, id)).unwrap();
        }

        let ids: Vec<_> = db
            .get_event_records(1, 3)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![2, 3, 4]);
    }

    #[test]
    fn test_sequences() {
        let db = StubClerkDb::new();
        assert!(!db.has_record_sequence(1_000_001).unwrap());
        db.put_record_sequence(1_000_001).unwrap();
        db.put_record_sequence(5).unwrap();
        assert!(db.has_record_sequence(1_000_001).unwrap());
        assert_eq!(db.get_record_sequences().unwrap(), vec![5, 1_000_001]);
    }
}
