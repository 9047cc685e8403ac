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

use quarry_kernel::{
    Account, AccountId, Address, AppState, BakerCycle, Block, Cycle, CycleIndex, Statistics,
};
use schnellru::{ByLength, LruMap};
use std::collections::BTreeMap;
use tracing::trace;

const EVENT_TARGET: &str = "quarry::index::staging";

// StagingCache
// ----------------------------------------------------------------------------

/// The long-lived read cache behind the per-block staging context. It holds
/// *clean* entities only: anything a unit of work mutates lives in the unit's
/// own dirty map (see [`crate::pipeline::WorkUnit`]) until the single flush,
/// so LRU pressure can never drop a dirty entity.
///
/// The hot accounts population is bounded; cycles, baker-cycle aggregates,
/// the head blocks, the app state and the latest statistics row are unbounded
/// but small in count.
///
/// The synchronization loop owns the cache exclusively for the life of the
/// process; nothing here is shared or locked.
pub struct StagingCache {
    accounts: LruMap<AccountId, Account, ByLength>,
    addresses: LruMap<Address, AccountId, ByLength>,

    cycles: BTreeMap<CycleIndex, Cycle>,
    baker_cycles: BTreeMap<(CycleIndex, AccountId), BakerCycle>,

    app_state: Option<AppState>,
    statistics: Option<Statistics>,

    /// The head block and its predecessor; all a revert ever needs.
    head_block: Option<Block>,
    parent_block: Option<Block>,
}

impl StagingCache {
    pub fn new(accounts_capacity: u32) -> Self {
        Self {
            accounts: LruMap::new(ByLength::new(accounts_capacity)),
            addresses: LruMap::new(ByLength::new(accounts_capacity)),
            cycles: BTreeMap::new(),
            baker_cycles: BTreeMap::new(),
            app_state: None,
            statistics: None,
            head_block: None,
            parent_block: None,
        }
    }

    /// Drop everything. Used by the Resetting state, which treats in-memory
    /// caches as possibly poisoned.
    pub fn clear(&mut self) {
        let capacity = self.accounts.limiter().max_length();
        *self = Self::new(capacity);
        trace!(target: EVENT_TARGET, "cache.cleared");
    }

    // Accounts -----------------------------------------------------------

    pub fn account(&mut self, id: AccountId) -> Option<&Account> {
        self.accounts.get(&id).map(|account| &*account)
    }

    pub fn account_id(&mut self, address: &Address) -> Option<AccountId> {
        self.addresses.get(address).copied()
    }

    pub fn put_account(&mut self, account: Account) {
        self.addresses.insert(account.address.clone(), account.id);
        self.accounts.insert(account.id, account);
    }

    pub fn forget_account(&mut self, id: AccountId) {
        if let Some(account) = self.accounts.remove(&id) {
            self.addresses.remove(&account.address);
        }
    }

    // Cycles -------------------------------------------------------------

    pub fn cycle(&self, index: CycleIndex) -> Option<&Cycle> {
        self.cycles.get(&index)
    }

    pub fn put_cycle(&mut self, cycle: Cycle) {
        self.cycles.insert(cycle.index, cycle);
    }

    pub fn forget_cycle(&mut self, index: CycleIndex) {
        self.cycles.remove(&index);
        self.baker_cycles.retain(|(cycle, _), _| *cycle != index);
    }

    pub fn baker_cycle(&self, cycle: CycleIndex, baker: AccountId) -> Option<&BakerCycle> {
        self.baker_cycles.get(&(cycle, baker))
    }

    pub fn put_baker_cycle(&mut self, row: BakerCycle) {
        self.baker_cycles.insert((row.cycle, row.baker), row);
    }

    pub fn forget_baker_cycle(&mut self, cycle: CycleIndex, baker: AccountId) {
        self.baker_cycles.remove(&(cycle, baker));
    }

    // Singletons ---------------------------------------------------------

    pub fn app_state(&self) -> Option<&AppState> {
        self.app_state.as_ref()
    }

    pub fn put_app_state(&mut self, state: AppState) {
        self.app_state = Some(state);
    }

    pub fn statistics(&self) -> Option<&Statistics> {
        self.statistics.as_ref()
    }

    pub fn put_statistics(&mut self, statistics: Statistics) {
        self.statistics = Some(statistics);
    }

    pub fn head_block(&self) -> Option<&Block> {
        self.head_block.as_ref()
    }

    pub fn parent_block(&self) -> Option<&Block> {
        self.parent_block.as_ref()
    }

    /// Advance the head pair after an applied block.
    pub fn push_head(&mut self, block: Block) {
        self.parent_block = self.head_block.take();
        self.head_block = Some(block);
    }

    /// Retreat the head pair after a revert. The new parent is unknown
    /// without a store round-trip, so it is simply dropped and re-loaded on
    /// demand.
    pub fn pop_head(&mut self) {
        self.head_block = self.parent_block.take();
        self.parent_block = None;
    }

    pub fn set_head_pair(&mut self, head: Option<Block>, parent: Option<Block>) {
        self.head_block = head;
        self.parent_block = parent;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_kernel::AccountKind;

    fn account(id: AccountId) -> Account {
        Account::new(
            id,
            Address::new(format!("tz1acc{id:04}")),
            AccountKind::User,
            1,
        )
    }

    #[test]
    fn bounded_accounts_evict_oldest() {
        let mut cache = StagingCache::new(2);
        cache.put_account(account(1));
        cache.put_account(account(2));
        cache.put_account(account(3));

        assert!(cache.account(1).is_none());
        assert!(cache.account(2).is_some());
        assert!(cache.account(3).is_some());
        // The address index is evicted in step with the accounts.
        assert_eq!(cache.account_id(&Address::new("tz1acc0001")), None);
        assert_eq!(cache.account_id(&Address::new("tz1acc0003")), Some(3));
    }

    #[test]
    fn forgetting_a_cycle_drops_its_baker_rows() {
        let mut cache = StagingCache::new(8);
        cache.put_cycle(Cycle {
            index: 4,
            snapshot_level: 0,
            seed: quarry_kernel::Seed::zero(),
            total_stake: 0,
            total_bakers: 0,
            selected_stake: 0,
        });
        cache.put_baker_cycle(BakerCycle::new(4, 7, 100));
        cache.put_baker_cycle(BakerCycle::new(5, 7, 100));

        cache.forget_cycle(4);
        assert!(cache.cycle(4).is_none());
        assert!(cache.baker_cycle(4, 7).is_none());
        assert!(cache.baker_cycle(5, 7).is_some());
    }

    #[test]
    fn head_pair_advances_and_retreats() {
        let mut cache = StagingCache::new(2);
        assert!(cache.head_block().is_none());
        cache.pop_head();
        assert!(cache.head_block().is_none());
    }
}
