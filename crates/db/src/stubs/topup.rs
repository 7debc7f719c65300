use std::collections::{BTreeMap, BTreeSet};

use heimdall_primitives::buf::Address;
use parking_lot::RwLock;

use crate::{traits::TopupDatabase, DbResult};

#[derive(Debug, Default)]
struct InnerState {
    balances: BTreeMap<Address, u128>,
    sequences: BTreeSet<u64>,
}

#[derive(Debug, Default)]
pub struct StubTopupDb {
    state: RwLock<InnerState>,
}

impl StubTopupDb {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TopupDatabase for StubTopupDb {
    fn get_balance(&self, account: Address) -> DbResult<u128> {
        Ok(self
            .state
            .read()
            .balances
            .get(&account)
            .copied()
            .unwrap_or_default())
    }

    fn set_balance(&self, account: Address, balance: u128) -> DbResult<()> {
        let mut st = self.state.write();
        if balance == 0 {
            st.balances.remove(&account);
        } else {
            st.balances.insert(account, balance);
        }
        Ok(())
    }

    fn get_balances(&self) -> DbResult<Vec<(Address, u128)>> {
        Ok(self
            .state
            .read()
            .balances
            .iter()
            .map(|(a, b)| (*a, *b))
            .collect())
    }

    fn put_topup_sequence(&self, sequence: u64) -> DbResult<()> {
        self.state.write().sequences.insert(sequence);
        Ok(())
    }

    fn has_topup_sequence(&self, sequence: u64) -> DbResult<bool> {
        Ok(self.state.read().sequences.contains(&sequence))
    }
}
