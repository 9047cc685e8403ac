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
    Account, AccountId, Address, AppState, BakerCycle, BakingRight, Block, Cycle, CycleIndex,
    Level, Operation, OperationId, Statistics, VotingPeriod,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),
    #[error("store row missing: {0}")]
    Missing(String),
}

// Store
// ----------------------------------------------------------------------------

/// Read/write contract over the materialized store. The engine performs
/// point reads while processing a block and persists all effects of one unit
/// of work through a single atomic [`Store::save`]; bulk-loaded rows
/// (pre-computed rights) travel in the same delta. Backends decide how to
/// make `save` atomic.
pub trait Store: Send + Sync {
    fn app_state(&self) -> Result<Option<AppState>, StoreError>;

    fn block_at(&self, level: Level) -> Result<Option<Block>, StoreError>;

    fn account(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    fn account_by_address(&self, address: &Address) -> Result<Option<Account>, StoreError>;

    fn cycle(&self, index: CycleIndex) -> Result<Option<Cycle>, StoreError>;

    fn baker_cycle(
        &self,
        cycle: CycleIndex,
        baker: AccountId,
    ) -> Result<Option<BakerCycle>, StoreError>;

    fn baker_cycles_of(&self, cycle: CycleIndex) -> Result<Vec<BakerCycle>, StoreError>;

    /// All rights at a level, any status.
    fn rights_at(&self, level: Level) -> Result<Vec<BakingRight>, StoreError>;

    /// Operations materialized for one block, in operation-id order.
    fn operations_at(&self, level: Level) -> Result<Vec<Operation>, StoreError>;

    /// Nonces revealed by operations included in blocks of `first..=last`,
    /// in operation-id order. Input to seed chaining.
    fn nonces_revealed_between(
        &self,
        first: Level,
        last: Level,
    ) -> Result<Vec<Vec<u8>>, StoreError>;

    fn statistics_at(&self, level: Level) -> Result<Option<Statistics>, StoreError>;

    fn voting_period(&self, index: i32) -> Result<Option<VotingPeriod>, StoreError>;

    /// Total number of materialized operation rows.
    fn operations_count(&self) -> Result<i64, StoreError>;

    /// Registered bakers (active and deactivated), for stake snapshots.
    fn bakers(&self) -> Result<Vec<Account>, StoreError>;

    /// Full account scan; used by diagnostics and reconciliation, never on
    /// the per-block hot path.
    fn accounts(&self) -> Result<Vec<Account>, StoreError>;

    /// Atomically persist all effects of one unit of work.
    fn save(&self, delta: BlockDelta) -> Result<(), StoreError>;
}

// Shared handles delegate, so a store can be owned by the sync loop and
// observed by background diagnostics at the same time.
impl<S: Store> Store for std::sync::Arc<S> {
    fn app_state(&self) -> Result<Option<AppState>, StoreError> {
        (**self).app_state()
    }

    fn block_at(&self, level: Level) -> Result<Option<Block>, StoreError> {
        (**self).block_at(level)
    }

    fn account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        (**self).account(id)
    }

    fn account_by_address(&self, address: &Address) -> Result<Option<Account>, StoreError> {
        (**self).account_by_address(address)
    }

    fn cycle(&self, index: CycleIndex) -> Result<Option<Cycle>, StoreError> {
        (**self).cycle(index)
    }

    fn baker_cycle(
        &self,
        cycle: CycleIndex,
        baker: AccountId,
    ) -> Result<Option<BakerCycle>, StoreError> {
        (**self).baker_cycle(cycle, baker)
    }

    fn baker_cycles_of(&self, cycle: CycleIndex) -> Result<Vec<BakerCycle>, StoreError> {
        (**self).baker_cycles_of(cycle)
    }

    fn rights_at(&self, level: Level) -> Result<Vec<BakingRight>, StoreError> {
        (**self).rights_at(level)
    }

    fn operations_at(&self, level: Level) -> Result<Vec<Operation>, StoreError> {
        (**self).operations_at(level)
    }

    fn nonces_revealed_between(
        &self,
        first: Level,
        last: Level,
    ) -> Result<Vec<Vec<u8>>, StoreError> {
        (**self).nonces_revealed_between(first, last)
    }

    fn statistics_at(&self, level: Level) -> Result<Option<Statistics>, StoreError> {
        (**self).statistics_at(level)
    }

    fn voting_period(&self, index: i32) -> Result<Option<VotingPeriod>, StoreError> {
        (**self).voting_period(index)
    }

    fn operations_count(&self) -> Result<i64, StoreError> {
        (**self).operations_count()
    }

    fn bakers(&self) -> Result<Vec<Account>, StoreError> {
        (**self).bakers()
    }

    fn accounts(&self) -> Result<Vec<Account>, StoreError> {
        (**self).accounts()
    }

    fn save(&self, delta: BlockDelta) -> Result<(), StoreError> {
        (**self).save(delta)
    }
}

// BlockDelta
// ----------------------------------------------------------------------------

/// Everything one unit of work (one applied or one reverted block) changes,
/// in a single struct so a backend can apply it in one transaction. A revert
/// populates the `*_removed` sides; an apply mostly the upsert sides.
#[derive(Debug, Default)]
pub struct BlockDelta {
    /// The new singleton value; always present in a non-empty delta.
    pub app_state: Option<AppState>,

    pub accounts: Vec<Account>,
    pub accounts_removed: Vec<AccountId>,

    pub blocks: Vec<Block>,
    pub blocks_removed: Vec<Level>,

    pub cycles: Vec<Cycle>,
    /// Removing a cycle also removes its baker-cycle aggregates.
    pub cycles_removed: Vec<CycleIndex>,

    pub baker_cycles: Vec<BakerCycle>,
    pub baker_cycles_removed: Vec<(CycleIndex, AccountId)>,

    /// Bulk-appended future rights (cycle creation) and status updates;
    /// upserted by (level, baker, kind).
    pub rights: Vec<BakingRight>,
    /// Drops every right of a cycle (revert of the block that created it).
    pub rights_removed_cycles: Vec<CycleIndex>,

    pub operations: Vec<Operation>,
    pub operations_removed: Vec<OperationId>,

    pub statistics: Vec<Statistics>,
    pub statistics_removed: Vec<Level>,

    pub voting_periods: Vec<VotingPeriod>,
    pub voting_periods_removed: Vec<i32>,
}

impl BlockDelta {
    pub fn is_empty(&self) -> bool {
        self.app_state.is_none()
            && self.accounts.is_empty()
            && self.accounts_removed.is_empty()
            && self.blocks.is_empty()
            && self.blocks_removed.is_empty()
            && self.cycles.is_empty()
            && self.cycles_removed.is_empty()
            && self.baker_cycles.is_empty()
            && self.baker_cycles_removed.is_empty()
            && self.rights.is_empty()
            && self.rights_removed_cycles.is_empty()
            && self.operations.is_empty()
            && self.operations_removed.is_empty()
            && self.statistics.is_empty()
            && self.statistics_removed.is_empty()
            && self.voting_periods.is_empty()
            && self.voting_periods_removed.is_empty()
    }
}
