use std::collections::{BTreeMap, BTreeSet};

use heimdall_state::stake::{Validator, ValidatorId};
use parking_lot::RwLock;

use crate::{traits::StakeDatabase, DbResult};

#[derive(Debug, Default)]
struct InnerState {
    validators: BTreeMap<ValidatorId, Validator>,
    sequences: BTreeSet<u64>,
}

#[derive(Debug, Default)]
pub struct StubStakeDb {
    state: RwLock<InnerState>,
}

impl StubStakeDb {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StakeDatabase for StubStakeDb {
    fn put_validator(&self, validator: Validator) -> DbResult<()> {
        self.state.write().validators.insert(validator.id, validator);
        Ok(())
    }

    fn get_validator(&self, id: ValidatorId) -> DbResult<Option<Validator>> {
        Ok(self.state.read().validators.get(&id).cloned())
    }

    fn get_validators(&self) -> DbResult<Vec<Validator>> {
        Ok(self.state.read().validators.values().cloned().collect())
    }

    fn put_stake_sequence(&self, sequence: u64) -> DbResult<()> {
        self.state.write().sequences.insert(sequence);
        Ok(())
    }

    fn has_stake_sequence(&self, sequence: u64) -> DbResult<bool> {
        Ok(self.state.read().sequences.contains(&sequence))
    }
}

#[cfg(test)]
mod tests {
    use heimdall_test_utils::ArbitraryGenerator;

    use super::*;

    #[test]
    fn test_validators_sorted_by_id() {
        let db = StubStakeDb::new();
        let ag = ArbitraryGenerator::new();
        for id in [7, 2, 5] {
            let mut v: Validator = ag.generate();
            v.id = id;
            db.put_validator(v).unwrap();
        }

        let ids: Vec<_> = db.get_validators().unwrap().iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![2, 5, 7]);
    }

    #[test]
    fn test_put_validator_replaces() {
        let db = StubStakeDb::new();
        let mut v: Validator = ArbitraryGenerator::new().generate();
        v.id = 1;
        v.nonce = 1;
        db.put_validator(v.clone()).unwrap();

        v.nonce = 2;
        db.put_validator(v).unwrap();
        assert_eq!(db.get_validator(1).unwrap().map(|v| v.nonce), Some(2));
    }
}
