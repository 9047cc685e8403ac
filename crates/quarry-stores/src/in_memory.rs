// Copyright 2025 Quarry Maintainers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A fully in-memory store. One `RwLock` over the whole row set makes
//! [`MemoryStore::save`] trivially atomic; reads clone. The reference
//! backend for tests and small deployments.

use parking_lot::RwLock;
use quarry_index::{BlockDelta, Store, StoreError};
use quarry_kernel::{
    Account, AccountId, Address, AppState, BakerCycle, BakingRight, Block, Cycle, CycleIndex,
    Level, Operation, OperationId, RightKind, Statistics, VotingPeriod,
};
use std::collections::BTreeMap;
use tracing::trace;

const EVENT_TARGET: &str = "quarry::stores::in_memory";

/// Identity of a right row: level, baker, kind tag, round.
type RightKey = (Level, AccountId, u8, u32);

fn right_key(right: &BakingRight) -> RightKey {
    match right.kind {
        RightKind::Baking { round } => (right.level, right.baker, 0, round),
        RightKind::Attestation { .. } => (right.level, right.baker, 1, 0),
    }
}

#[derive(Default)]
struct Inner {
    app_state: Option<AppState>,
    accounts: BTreeMap<AccountId, Account>,
    addresses: BTreeMap<Address, AccountId>,
    blocks: BTreeMap<Level, Block>,
    cycles: BTreeMap<CycleIndex, Cycle>,
    baker_cycles: BTreeMap<(CycleIndex, AccountId), BakerCycle>,
    rights: BTreeMap<RightKey, BakingRight>,
    operations: BTreeMap<OperationId, Operation>,
    statistics: BTreeMap<Level, Statistics>,
    voting_periods: BTreeMap<i32, VotingPeriod>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of block rows; test helper.
    pub fn blocks_len(&self) -> usize {
        self.inner.read().blocks.len()
    }
}

impl Store for MemoryStore {
    fn app_state(&self) -> Result<Option<AppState>, StoreError> {
        Ok(self.inner.read().app_state.clone())
    }

    fn block_at(&self, level: Level) -> Result<Option<Block>, StoreError> {
        Ok(self.inner.read().blocks.get(&level).cloned())
    }

    fn account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.inner.read().accounts.get(&id).cloned())
    }

    fn account_by_address(&self, address: &Address) -> Result<Option<Account>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .addresses
            .get(address)
            .and_then(|id| inner.accounts.get(id))
            .cloned())
    }

    fn cycle(&self, index: CycleIndex) -> Result<Option<Cycle>, StoreError> {
        Ok(self.inner.read().cycles.get(&index).cloned())
    }

    fn baker_cycle(
        &self,
        cycle: CycleIndex,
        baker: AccountId,
    ) -> Result<Option<BakerCycle>, StoreError> {
        Ok(self.inner.read().baker_cycles.get(&(cycle, baker)).cloned())
    }

    fn baker_cycles_of(&self, cycle: CycleIndex) -> Result<Vec<BakerCycle>, StoreError> {
        Ok(self
            .inner
            .read()
            .baker_cycles
            .range((cycle, AccountId::MIN)..=(cycle, AccountId::MAX))
            .map(|(_, row)| row.clone())
            .collect())
    }

    fn rights_at(&self, level: Level) -> Result<Vec<BakingRight>, StoreError> {
        Ok(self
            .inner
            .read()
            .rights
            .range((level, AccountId::MIN, 0, 0)..=(level, AccountId::MAX, u8::MAX, u32::MAX))
            .map(|(_, right)| right.clone())
            .collect())
    }

    fn operations_at(&self, level: Level) -> Result<Vec<Operation>, StoreError> {
        Ok(self
            .inner
            .read()
            .operations
            .values()
            .filter(|operation| operation.level() == level)
            .cloned()
            .collect())
    }

    fn nonces_revealed_between(
        &self,
        first: Level,
        last: Level,
    ) -> Result<Vec<Vec<u8>>, StoreError> {
        Ok(self
            .inner
            .read()
            .operations
            .values()
            .filter_map(|operation| match operation {
                Operation::NonceRevelation(op) if (first..=last).contains(&op.level) => {
                    Some(op.nonce.clone())
                }
                _ => None,
            })
            .collect())
    }

    fn statistics_at(&self, level: Level) -> Result<Option<Statistics>, StoreError> {
        Ok(self.inner.read().statistics.get(&level).copied())
    }

    fn voting_period(&self, index: i32) -> Result<Option<VotingPeriod>, StoreError> {
        Ok(self.inner.read().voting_periods.get(&index).cloned())
    }

    fn operations_count(&self) -> Result<i64, StoreError> {
        Ok(self.inner.read().operations.len() as i64)
    }

    fn bakers(&self) -> Result<Vec<Account>, StoreError> {
        Ok(self
            .inner
            .read()
            .accounts
            .values()
            .filter(|account| account.is_baker())
            .cloned()
            .collect())
    }

    fn accounts(&self) -> Result<Vec<Account>, StoreError> {
        Ok(self.inner.read().accounts.values().cloned().collect())
    }

    fn save(&self, delta: BlockDelta) -> Result<(), StoreError> {
        let mut inner = self.inner.write();

        if let Some(state) = delta.app_state {
            inner.app_state = Some(state);
        }

        for id in delta.accounts_removed {
            if let Some(account) = inner.accounts.remove(&id) {
                inner.addresses.remove(&account.address);
            }
        }
        for account in delta.accounts {
            inner.addresses.insert(account.address.clone(), account.id);
            inner.accounts.insert(account.id, account);
        }

        for level in delta.blocks_removed {
            inner.blocks.remove(&level);
        }
        for block in delta.blocks {
            inner.blocks.insert(block.level, block);
        }

        for index in delta.cycles_removed {
            inner.cycles.remove(&index);
            inner
                .baker_cycles
                .retain(|(cycle, _), _| *cycle != index);
        }
        for cycle in delta.cycles {
            inner.cycles.insert(cycle.index, cycle);
        }

        for key in delta.baker_cycles_removed {
            inner.baker_cycles.remove(&key);
        }
        for row in delta.baker_cycles {
            inner.baker_cycles.insert((row.cycle, row.baker), row);
        }

        for cycle in delta.rights_removed_cycles {
            inner.rights.retain(|_, right| right.cycle != cycle);
        }
        for right in delta.rights {
            inner.rights.insert(right_key(&right), right);
        }

        for id in delta.operations_removed {
            inner.operations.remove(&id);
        }
        for operation in delta.operations {
            inner.operations.insert(operation.id(), operation);
        }

        for level in delta.statistics_removed {
            inner.statistics.remove(&level);
        }
        for row in delta.statistics {
            inner.statistics.insert(row.level, row);
        }

        for index in delta.voting_periods_removed {
            inner.voting_periods.remove(&index);
        }
        for period in delta.voting_periods {
            inner.voting_periods.insert(period.index, period);
        }

        trace!(target: EVENT_TARGET, "delta.saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quarry_kernel::{AccountKind, RightStatus};

    fn account(id: AccountId, address: &str) -> Account {
        Account::new(id, Address::new(address), AccountKind::User, 1)
    }

    #[test]
    fn save_upserts_and_removes_in_one_call() {
        let store = MemoryStore::new();
        store
            .save(BlockDelta {
                accounts: vec![account(1, "tz1aaa"), account(2, "tz1bbb")],
                ..Default::default()
            })
            .unwrap();

        store
            .save(BlockDelta {
                accounts_removed: vec![1],
                ..Default::default()
            })
            .unwrap();

        assert_eq!(store.account(1).unwrap(), None);
        assert_eq!(
            store.account_by_address(&Address::new("tz1aaa")).unwrap(),
            None
        );
        assert!(store.account(2).unwrap().is_some());
    }

    #[test]
    fn removing_a_cycle_drops_rights_and_aggregates() {
        let store = MemoryStore::new();
        store
            .save(BlockDelta {
                rights: vec![
                    BakingRight {
                        cycle: 3,
                        level: 25,
                        baker: 1,
                        kind: RightKind::Baking { round: 0 },
                        status: RightStatus::Future,
                    },
                    BakingRight {
                        cycle: 4,
                        level: 33,
                        baker: 1,
                        kind: RightKind::Baking { round: 0 },
                        status: RightStatus::Future,
                    },
                ],
                baker_cycles: vec![BakerCycle::new(3, 1, 100), BakerCycle::new(4, 1, 100)],
                ..Default::default()
            })
            .unwrap();

        store
            .save(BlockDelta {
                cycles_removed: vec![3],
                rights_removed_cycles: vec![3],
                ..Default::default()
            })
            .unwrap();

        assert!(store.rights_at(25).unwrap().is_empty());
        assert_eq!(store.rights_at(33).unwrap().len(), 1);
        assert!(store.baker_cycle(3, 1).unwrap().is_none());
        assert!(store.baker_cycle(4, 1).unwrap().is_some());
    }

    #[test]
    fn right_upsert_replaces_by_identity() {
        let store = MemoryStore::new();
        let mut right = BakingRight {
            cycle: 0,
            level: 5,
            baker: 9,
            kind: RightKind::Attestation { slots: 2 },
            status: RightStatus::Future,
        };
        store
            .save(BlockDelta {
                rights: vec![right.clone()],
                ..Default::default()
            })
            .unwrap();

        right.status = RightStatus::Realized;
        store
            .save(BlockDelta {
                rights: vec![right.clone()],
                ..Default::default()
            })
            .unwrap();

        assert_eq!(store.rights_at(5).unwrap(), vec![right]);
    }

    #[test]
    fn nonces_are_filtered_by_inclusion_level() {
        use quarry_kernel::{Hasher, NonceRevelationOp};
        let store = MemoryStore::new();
        let op = |id: OperationId, level: Level, byte: u8| {
            Operation::NonceRevelation(NonceRevelationOp {
                id,
                level,
                hash: Hasher::hash(&[byte]),
                baker: 1,
                revealed_level: level - 4,
                revealed_cycle: 0,
                nonce: vec![byte; 32],
                reward: 5,
            })
        };
        store
            .save(BlockDelta {
                operations: vec![op(1, 9, 0xaa), op(2, 12, 0xbb), op(3, 17, 0xcc)],
                ..Default::default()
            })
            .unwrap();

        let nonces = store.nonces_revealed_between(9, 16).unwrap();
        assert_eq!(nonces, vec![vec![0xaa; 32], vec![0xbb; 32]]);
    }
}
