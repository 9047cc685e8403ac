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

//! The per-block unit of work. All commits of one block mutate a single
//! [`WorkUnit`]; nothing reaches the store until the unit is finished and its
//! [`BlockDelta`] saved atomically. Entities read through the unit are
//! cloned; once staged back they become the canonical instance for the rest
//! of the unit.

use crate::staging::StagingCache;
use crate::store::{BlockDelta, Store, StoreError};
use quarry_kernel::{
    Account, AccountId, AccountKind, Address, AppState, BakerCycle, BakingRight, BalanceError,
    Block, BlockHash, Cycle, CycleIndex, Level, Mutez, Operation, OperationId, OperationKinds,
    ProtocolHash, ProtocolParameters, RawBlock, RightKind, Statistics, VotingPeriod,
};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommitError {
    #[error("predecessor mismatch at level {level}: expected {expected}, block claims {found}")]
    PredecessorMismatch {
        level: Level,
        expected: BlockHash,
        found: BlockHash,
    },
    #[error(transparent)]
    Balance(#[from] BalanceError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("unknown account {0}")]
    UnknownAccount(Address),
    #[error("missing row: {0}")]
    MissingRow(String),
    #[error("malformed block: {0}")]
    MalformedBlock(String),
    #[error("no rules registered for protocol {0}")]
    UnknownProtocol(ProtocolHash),
}

// Commit
// ----------------------------------------------------------------------------

/// One slice of a block's semantics. Every commit implements an exact
/// inverse: `revert` undoes `apply` from the materialized rows alone, without
/// the raw block.
pub trait Commit: Send + Sync {
    fn apply(&self, unit: &mut WorkUnit<'_>, raw: &RawBlock) -> Result<(), CommitError>;

    fn revert(
        &self,
        unit: &mut WorkUnit<'_>,
        block: &Block,
        operations: &[Operation],
    ) -> Result<(), CommitError>;
}

// WorkUnit
// ----------------------------------------------------------------------------

/// Identity key of a right row; two baking rounds at one level are distinct
/// rights.
type RightKey = (Level, AccountId, u8, u32);

fn right_key(right: &BakingRight) -> RightKey {
    match right.kind {
        RightKind::Baking { round } => (right.level, right.baker, 0, round),
        RightKind::Attestation { .. } => (right.level, right.baker, 1, 0),
    }
}

pub struct WorkUnit<'a> {
    store: &'a dyn Store,
    cache: &'a mut StagingCache,
    params: &'a ProtocolParameters,
    level: Level,
    reverting: bool,

    app_state: AppState,
    statistics: Statistics,

    accounts: BTreeMap<AccountId, Account>,
    accounts_removed: BTreeSet<AccountId>,
    staged_addresses: BTreeMap<Address, AccountId>,

    cycles: BTreeMap<CycleIndex, Cycle>,
    cycles_removed: BTreeSet<CycleIndex>,
    baker_cycles: BTreeMap<(CycleIndex, AccountId), BakerCycle>,
    baker_cycles_removed: BTreeSet<(CycleIndex, AccountId)>,

    rights: BTreeMap<RightKey, BakingRight>,
    rights_removed_cycles: Vec<CycleIndex>,

    voting_periods: BTreeMap<i32, VotingPeriod>,
    voting_periods_removed: BTreeSet<i32>,

    operations: Vec<Operation>,
    operations_removed: Vec<OperationId>,
    kinds: OperationKinds,

    block: Option<Block>,
    blocks_removed: Vec<Level>,
    statistics_removed: Vec<Level>,
}

impl<'a> WorkUnit<'a> {
    /// Open a unit applying the block at `level`. The statistics row is
    /// carried forward from the previous level.
    pub fn for_apply(
        store: &'a dyn Store,
        cache: &'a mut StagingCache,
        params: &'a ProtocolParameters,
        level: Level,
    ) -> Result<Self, CommitError> {
        let app_state = Self::load_app_state(store, cache)?;
        let statistics = match cache.statistics().copied() {
            Some(row) if row.level == level - 1 => row,
            _ => store
                .statistics_at(level - 1)?
                .unwrap_or_else(Statistics::pre_genesis),
        }
        .carried_to(level);

        Ok(Self::empty(store, cache, params, level, false, app_state, statistics))
    }

    /// Open a unit reverting the block at `level`. The statistics row of the
    /// reverted level is dropped and the previous row restored.
    pub fn for_revert(
        store: &'a dyn Store,
        cache: &'a mut StagingCache,
        params: &'a ProtocolParameters,
        level: Level,
    ) -> Result<Self, CommitError> {
        let app_state = Self::load_app_state(store, cache)?;
        let statistics = store
            .statistics_at(level - 1)?
            .unwrap_or_else(Statistics::pre_genesis);

        let mut unit = Self::empty(store, cache, params, level, true, app_state, statistics);
        unit.statistics_removed.push(level);
        Ok(unit)
    }

    #[allow(clippy::too_many_arguments)]
    fn empty(
        store: &'a dyn Store,
        cache: &'a mut StagingCache,
        params: &'a ProtocolParameters,
        level: Level,
        reverting: bool,
        app_state: AppState,
        statistics: Statistics,
    ) -> Self {
        Self {
            store,
            cache,
            params,
            level,
            reverting,
            app_state,
            statistics,
            accounts: BTreeMap::new(),
            accounts_removed: BTreeSet::new(),
            staged_addresses: BTreeMap::new(),
            cycles: BTreeMap::new(),
            cycles_removed: BTreeSet::new(),
            baker_cycles: BTreeMap::new(),
            baker_cycles_removed: BTreeSet::new(),
            rights: BTreeMap::new(),
            rights_removed_cycles: Vec::new(),
            voting_periods: BTreeMap::new(),
            voting_periods_removed: BTreeSet::new(),
            operations: Vec::new(),
            operations_removed: Vec::new(),
            kinds: OperationKinds::none(),
            block: None,
            blocks_removed: Vec::new(),
            statistics_removed: Vec::new(),
        }
    }

    fn load_app_state(
        store: &dyn Store,
        cache: &mut StagingCache,
    ) -> Result<AppState, CommitError> {
        if let Some(state) = cache.app_state() {
            return Ok(state.clone());
        }
        Ok(store.app_state()?.unwrap_or_else(AppState::pre_genesis))
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn params(&self) -> &ProtocolParameters {
        self.params
    }

    pub fn app_state(&self) -> &AppState {
        &self.app_state
    }

    pub fn app_state_mut(&mut self) -> &mut AppState {
        &mut self.app_state
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    // Accounts -----------------------------------------------------------

    /// Point read by id: dirty map first, then cache, then store.
    pub fn account(&mut self, id: AccountId) -> Result<Account, CommitError> {
        if let Some(account) = self.accounts.get(&id) {
            return Ok(account.clone());
        }
        if let Some(account) = self.cache.account(id) {
            return Ok(account.clone());
        }
        self.store
            .account(id)?
            .ok_or_else(|| CommitError::MissingRow(format!("account {id}")))
    }

    pub fn find_account(&mut self, address: &Address) -> Result<Option<Account>, CommitError> {
        if let Some(id) = self.staged_addresses.get(address) {
            return Ok(self.accounts.get(id).cloned());
        }
        if let Some(id) = self.cache.account_id(address) {
            return Ok(Some(self.account(id)?));
        }
        match self.store.account_by_address(address)? {
            // Overlay a dirty copy if the account was already touched.
            Some(stored) => match self.accounts.get(&stored.id) {
                _ if self.accounts_removed.contains(&stored.id) => Ok(None),
                Some(dirty) => Ok(Some(dirty.clone())),
                None => Ok(Some(stored)),
            },
            None => Ok(None),
        }
    }

    pub fn expect_account(&mut self, address: &Address) -> Result<Account, CommitError> {
        self.find_account(address)?
            .ok_or_else(|| CommitError::UnknownAccount(address.clone()))
    }

    /// Fetch or create the account behind `address`. Creation mints a fresh
    /// surrogate id; ids are never reused, even across reverts.
    pub fn ensure_account(
        &mut self,
        address: &Address,
        kind: AccountKind,
    ) -> Result<Account, CommitError> {
        if let Some(account) = self.find_account(address)? {
            return Ok(account);
        }
        let id = self.app_state.next_account_id();
        let account = Account::new(id, address.clone(), kind, self.level);
        self.stage_account(account.clone());
        Ok(account)
    }

    /// Stage a mutated account; it becomes the canonical instance for the
    /// rest of this unit.
    pub fn stage_account(&mut self, account: Account) {
        self.accounts_removed.remove(&account.id);
        self.staged_addresses
            .insert(account.address.clone(), account.id);
        self.accounts.insert(account.id, account);
    }

    /// Undo an account creation. Only valid while reverting the block that
    /// created the account.
    pub fn delete_account(&mut self, id: AccountId) -> Result<(), CommitError> {
        let account = self.account(id)?;
        self.staged_addresses.remove(&account.address);
        self.accounts.remove(&id);
        self.accounts_removed.insert(id);
        Ok(())
    }

    /// Apply a signed balance delta and propagate it into the delegate's
    /// staking balance. The one mutation path both apply and revert use for
    /// spendable value.
    pub fn adjust_balance(&mut self, id: AccountId, delta: Mutez) -> Result<(), CommitError> {
        let mut account = self.account(id)?;
        account.adjust_balance(delta)?;
        let delegate = account.delegate;
        self.stage_account(account);

        if let Some(delegate) = delegate {
            let mut baker = self.account(delegate)?;
            let address = baker.address.clone();
            baker
                .baker_mut()?
                .adjust_staking(&address, delta, delegate != id)?;
            self.stage_account(baker);
        }
        Ok(())
    }

    pub fn credit(&mut self, id: AccountId, amount: Mutez) -> Result<(), CommitError> {
        self.adjust_balance(id, amount)
    }

    pub fn debit(&mut self, id: AccountId, amount: Mutez) -> Result<(), CommitError> {
        self.adjust_balance(id, -amount)
    }

    /// Move a baker's frozen deposit and mirror the move in the running
    /// `total_frozen` aggregate.
    pub fn adjust_frozen(&mut self, id: AccountId, delta: Mutez) -> Result<(), CommitError> {
        let mut account = self.account(id)?;
        let address = account.address.clone();
        account.baker_mut()?.adjust_frozen(&address, delta)?;
        self.stage_account(account);
        self.statistics.total_frozen += delta;
        Ok(())
    }

    /// Move a baker's staking balance without touching any spendable
    /// balance (delegation moves, slashing).
    pub fn adjust_staking(
        &mut self,
        id: AccountId,
        delta: Mutez,
        delegated: bool,
    ) -> Result<(), CommitError> {
        let mut account = self.account(id)?;
        let address = account.address.clone();
        account
            .baker_mut()?
            .adjust_staking(&address, delta, delegated)?;
        self.stage_account(account);
        Ok(())
    }

    // Supply channels ----------------------------------------------------
    //
    // Negative deltas are the revert direction.

    pub fn mint(&mut self, delta: Mutez) {
        self.statistics.total_created += delta;
    }

    pub fn burn(&mut self, delta: Mutez) {
        self.statistics.total_burned += delta;
    }

    pub fn activate(&mut self, delta: Mutez) {
        self.statistics.total_activated += delta;
    }

    pub fn bootstrap(&mut self, delta: Mutez) {
        self.statistics.total_bootstrapped += delta;
    }

    // Cycles -------------------------------------------------------------

    pub fn cycle(&mut self, index: CycleIndex) -> Result<Option<Cycle>, CommitError> {
        if self.cycles_removed.contains(&index) {
            return Ok(None);
        }
        if let Some(cycle) = self.cycles.get(&index) {
            return Ok(Some(cycle.clone()));
        }
        if let Some(cycle) = self.cache.cycle(index) {
            return Ok(Some(cycle.clone()));
        }
        Ok(self.store.cycle(index)?)
    }

    pub fn stage_cycle(&mut self, cycle: Cycle) {
        self.cycles_removed.remove(&cycle.index);
        self.cycles.insert(cycle.index, cycle);
    }

    /// Drop a cycle together with its rights and baker aggregates. The
    /// revert of the block that created the cycle.
    pub fn delete_cycle(&mut self, index: CycleIndex) {
        self.cycles.remove(&index);
        self.cycles_removed.insert(index);
        self.baker_cycles.retain(|(cycle, _), _| *cycle != index);
        self.rights.retain(|_, right| right.cycle != index);
        self.rights_removed_cycles.push(index);
    }

    pub fn baker_cycle(
        &mut self,
        cycle: CycleIndex,
        baker: AccountId,
    ) -> Result<Option<BakerCycle>, CommitError> {
        if self.cycles_removed.contains(&cycle)
            || self.baker_cycles_removed.contains(&(cycle, baker))
        {
            return Ok(None);
        }
        if let Some(row) = self.baker_cycles.get(&(cycle, baker)) {
            return Ok(Some(row.clone()));
        }
        if let Some(row) = self.cache.baker_cycle(cycle, baker) {
            return Ok(Some(row.clone()));
        }
        Ok(self.store.baker_cycle(cycle, baker)?)
    }

    pub fn expect_baker_cycle(
        &mut self,
        cycle: CycleIndex,
        baker: AccountId,
    ) -> Result<BakerCycle, CommitError> {
        self.baker_cycle(cycle, baker)?
            .ok_or_else(|| CommitError::MissingRow(format!("baker_cycle ({cycle}, {baker})")))
    }

    pub fn stage_baker_cycle(&mut self, row: BakerCycle) {
        self.baker_cycles_removed.remove(&(row.cycle, row.baker));
        self.baker_cycles.insert((row.cycle, row.baker), row);
    }

    /// Drop a single aggregate row; the revert of an on-demand creation.
    pub fn delete_baker_cycle(&mut self, cycle: CycleIndex, baker: AccountId) {
        self.baker_cycles.remove(&(cycle, baker));
        self.baker_cycles_removed.insert((cycle, baker));
    }

    /// Stored aggregates of one cycle, overlaid with staged rows.
    pub fn baker_cycles_of(&mut self, cycle: CycleIndex) -> Result<Vec<BakerCycle>, CommitError> {
        let mut keyed: BTreeMap<AccountId, BakerCycle> = self
            .store
            .baker_cycles_of(cycle)?
            .into_iter()
            .map(|row| (row.baker, row))
            .collect();
        for ((c, baker), row) in &self.baker_cycles {
            if *c == cycle {
                keyed.insert(*baker, row.clone());
            }
        }
        Ok(keyed.into_values().collect())
    }

    // Rights -------------------------------------------------------------

    /// Rights at a level, staged upserts overlaid on stored rows. Needed
    /// because the first block of a chain resolves rights that the very same
    /// unit bulk-created.
    pub fn rights_at(&mut self, level: Level) -> Result<Vec<BakingRight>, CommitError> {
        let mut keyed: BTreeMap<RightKey, BakingRight> = self
            .store
            .rights_at(level)?
            .into_iter()
            .filter(|right| !self.rights_removed_cycles.contains(&right.cycle))
            .map(|right| (right_key(&right), right))
            .collect();
        for (key, right) in &self.rights {
            if right.level == level {
                keyed.insert(*key, right.clone());
            }
        }
        Ok(keyed.into_values().collect())
    }

    pub fn stage_right(&mut self, right: BakingRight) {
        self.rights.insert(right_key(&right), right);
    }

    pub fn stage_rights(&mut self, rights: Vec<BakingRight>) {
        for right in rights {
            self.stage_right(right);
        }
    }

    // Voting periods -----------------------------------------------------

    pub fn voting_period(&mut self, index: i32) -> Result<Option<VotingPeriod>, CommitError> {
        if self.voting_periods_removed.contains(&index) {
            return Ok(None);
        }
        if let Some(period) = self.voting_periods.get(&index) {
            return Ok(Some(period.clone()));
        }
        Ok(self.store.voting_period(index)?)
    }

    pub fn stage_voting_period(&mut self, period: VotingPeriod) {
        self.voting_periods_removed.remove(&period.index);
        self.voting_periods.insert(period.index, period);
    }

    /// Drop a period row; the revert of the block that opened it.
    pub fn delete_voting_period(&mut self, index: i32) {
        self.voting_periods.remove(&index);
        self.voting_periods_removed.insert(index);
    }

    // Pass-through reads -------------------------------------------------

    pub fn stored_block_at(&self, level: Level) -> Result<Option<Block>, CommitError> {
        if let Some(head) = self.cache.head_block() {
            if head.level == level {
                return Ok(Some(head.clone()));
            }
        }
        if let Some(parent) = self.cache.parent_block() {
            if parent.level == level {
                return Ok(Some(parent.clone()));
            }
        }
        Ok(self.store.block_at(level)?)
    }

    /// Nonces revealed by operations included during `cycle`, the input to
    /// seed chaining.
    pub fn nonces_revealed_in(&self, cycle: CycleIndex) -> Result<Vec<Vec<u8>>, CommitError> {
        let first = self.params.first_level_of(cycle);
        let last = self.params.last_level_of(cycle);
        Ok(self.store.nonces_revealed_between(first, last)?)
    }

    /// Registered bakers with dirty overlays; the stake snapshot source.
    pub fn bakers(&mut self) -> Result<Vec<Account>, CommitError> {
        let mut keyed: BTreeMap<AccountId, Account> = self
            .store
            .bakers()?
            .into_iter()
            .filter(|account| !self.accounts_removed.contains(&account.id))
            .map(|account| (account.id, account))
            .collect();
        for (id, account) in &self.accounts {
            if account.is_baker() {
                keyed.insert(*id, account.clone());
            } else {
                keyed.remove(id);
            }
        }
        Ok(keyed.into_values().collect())
    }

    // Block and operations -----------------------------------------------

    pub fn stage_block(&mut self, block: Block) {
        self.block = Some(block);
    }

    pub fn block_mut(&mut self) -> Result<&mut Block, CommitError> {
        self.block
            .as_mut()
            .ok_or_else(|| CommitError::MissingRow("staged block".into()))
    }

    pub fn remove_block(&mut self, level: Level) {
        self.blocks_removed.push(level);
    }

    /// Materialize an operation row and mark its kind on the staged block.
    pub fn push_operation(&mut self, operation: Operation) {
        self.kinds.insert(operation.kind());
        self.operations.push(operation);
    }

    pub fn drop_operation(&mut self, id: OperationId) {
        self.operations_removed.push(id);
    }

    // Finishing ----------------------------------------------------------

    /// Close an apply unit: write the staged entities back into the cache as
    /// clean and assemble the delta for one atomic save.
    pub fn finish_apply(mut self) -> Result<BlockDelta, CommitError> {
        let mut block = self
            .block
            .take()
            .ok_or_else(|| CommitError::MissingRow("staged block".into()))?;
        block.operations = self.kinds;

        self.cache.put_app_state(self.app_state.clone());
        self.cache.put_statistics(self.statistics);
        for account in self.accounts.values() {
            self.cache.put_account(account.clone());
        }
        for cycle in self.cycles.values() {
            self.cache.put_cycle(cycle.clone());
        }
        for row in self.baker_cycles.values() {
            self.cache.put_baker_cycle(row.clone());
        }
        self.cache.push_head(block.clone());

        Ok(BlockDelta {
            app_state: Some(self.app_state),
            accounts: self.accounts.into_values().collect(),
            accounts_removed: Vec::new(),
            blocks: vec![block],
            blocks_removed: Vec::new(),
            cycles: self.cycles.into_values().collect(),
            cycles_removed: Vec::new(),
            baker_cycles: self.baker_cycles.into_values().collect(),
            baker_cycles_removed: Vec::new(),
            rights: self.rights.into_values().collect(),
            rights_removed_cycles: Vec::new(),
            operations: self.operations,
            operations_removed: Vec::new(),
            statistics: vec![self.statistics],
            statistics_removed: Vec::new(),
            voting_periods: self.voting_periods.into_values().collect(),
            voting_periods_removed: Vec::new(),
        })
    }

    /// Close a revert unit. Removed entities are forgotten by the cache;
    /// surviving mutations are written back as clean.
    pub fn finish_revert(mut self) -> Result<BlockDelta, CommitError> {
        debug_assert!(self.reverting);

        self.cache.put_app_state(self.app_state.clone());
        self.cache.put_statistics(self.statistics);
        for account in self.accounts.values() {
            self.cache.put_account(account.clone());
        }
        for id in &self.accounts_removed {
            self.cache.forget_account(*id);
        }
        for cycle in self.cycles.values() {
            self.cache.put_cycle(cycle.clone());
        }
        for index in &self.cycles_removed {
            self.cache.forget_cycle(*index);
        }
        for row in self.baker_cycles.values() {
            self.cache.put_baker_cycle(row.clone());
        }
        for (cycle, baker) in &self.baker_cycles_removed {
            self.cache.forget_baker_cycle(*cycle, *baker);
        }
        self.cache.pop_head();

        Ok(BlockDelta {
            app_state: Some(self.app_state),
            accounts: self.accounts.into_values().collect(),
            accounts_removed: self.accounts_removed.into_iter().collect(),
            blocks: Vec::new(),
            blocks_removed: self.blocks_removed,
            cycles: self.cycles.into_values().collect(),
            cycles_removed: self.cycles_removed.into_iter().collect(),
            baker_cycles: self.baker_cycles.into_values().collect(),
            baker_cycles_removed: self.baker_cycles_removed.into_iter().collect(),
            rights: self.rights.into_values().collect(),
            rights_removed_cycles: self.rights_removed_cycles,
            operations: Vec::new(),
            operations_removed: self.operations_removed,
            statistics: Vec::new(),
            statistics_removed: self.statistics_removed,
            voting_periods: self.voting_periods.into_values().collect(),
            voting_periods_removed: self.voting_periods_removed.into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    // Use the externally built `quarry_index` (via the self dev-dependency)
    // rather than `super::*`: `MemoryStore` implements that instance's
    // `Store` trait, which the test binary's `crate::Store` is not.
    use pretty_assertions::assert_eq;
    use quarry_index::{CommitError, StagingCache, WorkUnit};
    use quarry_kernel::{AccountKind, Address, BakingRight, ProtocolParameters, RightKind};
    use quarry_stores::in_memory::MemoryStore;

    fn fixture() -> (MemoryStore, StagingCache, ProtocolParameters) {
        (
            MemoryStore::new(),
            StagingCache::new(64),
            ProtocolParameters::for_tests(),
        )
    }

    #[test]
    fn created_accounts_mint_monotonic_ids() {
        let (store, mut cache, params) = fixture();
        let mut unit = WorkUnit::for_apply(&store, &mut cache, &params, 1).unwrap();

        let a = unit
            .ensure_account(&Address::new("tz1aaa"), AccountKind::User)
            .unwrap();
        let b = unit
            .ensure_account(&Address::new("tz1bbb"), AccountKind::User)
            .unwrap();
        let a_again = unit
            .ensure_account(&Address::new("tz1aaa"), AccountKind::User)
            .unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(a_again.id, a.id);
        assert_eq!(unit.app_state().account_counter, 2);
    }

    #[test]
    fn dirty_entries_survive_cache_pressure() {
        let store = MemoryStore::new();
        let mut cache = StagingCache::new(2);
        let params = ProtocolParameters::for_tests();
        let mut unit = WorkUnit::for_apply(&store, &mut cache, &params, 1).unwrap();

        // Far more staged accounts than the clean cache can hold.
        let ids: Vec<_> = (0..8)
            .map(|i| {
                let account = unit
                    .ensure_account(&Address::new(format!("tz1hot{i:02}")), AccountKind::User)
                    .unwrap();
                unit.credit(account.id, 100 + i).unwrap();
                account.id
            })
            .collect();

        for (i, id) in ids.iter().enumerate() {
            assert_eq!(unit.account(*id).unwrap().balance, 100 + i as i64);
        }
    }

    #[test]
    fn balance_moves_propagate_to_the_delegate() {
        let (store, mut cache, params) = fixture();
        let mut unit = WorkUnit::for_apply(&store, &mut cache, &params, 1).unwrap();

        let mut baker = unit
            .ensure_account(&Address::new("tz1baker"), AccountKind::User)
            .unwrap();
        baker.adjust_balance(10_000).unwrap();
        baker.promote_to_baker(5);
        unit.stage_account(baker.clone());

        let mut delegator = unit
            .ensure_account(&Address::new("tz1user"), AccountKind::User)
            .unwrap();
        delegator.delegate = Some(baker.id);
        unit.stage_account(delegator.clone());

        unit.credit(delegator.id, 700).unwrap();
        let baker = unit.account(baker.id).unwrap();
        assert_eq!(baker.baker.as_ref().unwrap().staking_balance, 10_700);
        assert_eq!(baker.baker.as_ref().unwrap().delegated_balance, 700);

        // Self-credit moves staking but not the delegated share.
        unit.credit(baker.id, 300).unwrap();
        let baker = unit.account(baker.id).unwrap();
        assert_eq!(baker.balance, 10_300);
        assert_eq!(baker.baker.as_ref().unwrap().staking_balance, 11_000);
        assert_eq!(baker.baker.as_ref().unwrap().delegated_balance, 700);
    }

    #[test]
    fn frozen_moves_track_total_frozen() {
        let (store, mut cache, params) = fixture();
        let mut unit = WorkUnit::for_apply(&store, &mut cache, &params, 1).unwrap();

        let mut baker = unit
            .ensure_account(&Address::new("tz1baker"), AccountKind::User)
            .unwrap();
        baker.promote_to_baker(5);
        let id = baker.id;
        unit.stage_account(baker);

        unit.adjust_frozen(id, 900).unwrap();
        assert_eq!(unit.statistics().total_frozen, 900);
        unit.adjust_frozen(id, -400).unwrap();
        assert_eq!(unit.statistics().total_frozen, 500);

        let err = unit.adjust_frozen(id, -600).unwrap_err();
        assert!(matches!(err, CommitError::Balance(_)));
    }

    #[test]
    fn finish_apply_requires_a_staged_block() {
        let (store, mut cache, params) = fixture();
        let unit = WorkUnit::for_apply(&store, &mut cache, &params, 1).unwrap();
        assert!(matches!(
            unit.finish_apply(),
            Err(CommitError::MissingRow(_))
        ));
    }

    #[test]
    fn staged_rights_overlay_stored_rows() {
        let (store, mut cache, params) = fixture();
        let mut unit = WorkUnit::for_apply(&store, &mut cache, &params, 1).unwrap();

        unit.stage_right(BakingRight {
            cycle: 0,
            level: 1,
            baker: 7,
            kind: RightKind::Baking { round: 0 },
            status: quarry_kernel::RightStatus::Future,
        });
        let rights = unit.rights_at(1).unwrap();
        assert_eq!(rights.len(), 1);

        // Upserting the same identity replaces, not duplicates.
        unit.stage_right(BakingRight {
            cycle: 0,
            level: 1,
            baker: 7,
            kind: RightKind::Baking { round: 0 },
            status: quarry_kernel::RightStatus::Realized,
        });
        let rights = unit.rights_at(1).unwrap();
        assert_eq!(rights.len(), 1);
        assert_eq!(rights[0].status, quarry_kernel::RightStatus::Realized);
    }
}
