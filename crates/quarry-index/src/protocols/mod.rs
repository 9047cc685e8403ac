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

//! Versioned commit dispatch. A block is processed as a fixed sequence of
//! slots; each protocol epoch may override the commit behind a slot, and
//! unoverridden slots inherit from earlier epochs. Reverting replays the
//! slots backwards with the exact inverses, resolved against the epoch the
//! block was originally baked under.

pub mod commits;

use crate::pipeline::{Commit, CommitError, WorkUnit};
use crate::staging::StagingCache;
use crate::store::Store;
use quarry_kernel::{
    Level, OperationKind, OperationKinds, ProtocolHash, ProtocolParameters, RawBlock,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

const EVENT_TARGET: &str = "quarry::index::protocols";

pub type Epoch = u32;

// Slots
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Slot {
    Migration,
    Cycles,
    BlockHeader,
    Activations,
    Attestations,
    Transactions,
    Delegations,
    Originations,
    DoubleBakings,
    NonceRevelations,
    Rights,
    Voting,
}

impl Slot {
    /// The operation kind a slot materializes, `None` for structural slots
    /// that run on every block regardless of content.
    fn operation_kind(self) -> Option<OperationKind> {
        match self {
            Slot::Activations => Some(OperationKind::Activation),
            Slot::Attestations => Some(OperationKind::Attestation),
            Slot::Transactions => Some(OperationKind::Transaction),
            Slot::Delegations => Some(OperationKind::Delegation),
            Slot::Originations => Some(OperationKind::Origination),
            Slot::DoubleBakings => Some(OperationKind::DoubleBaking),
            Slot::NonceRevelations => Some(OperationKind::NonceRevelation),
            Slot::Migration
            | Slot::Cycles
            | Slot::BlockHeader
            | Slot::Rights
            | Slot::Voting => None,
        }
    }
}

/// Whether a revert can skip `slot` for a block carrying `kinds`: operation
/// slots whose kind never appeared in the block have nothing to undo.
fn skips_on_revert(slot: Slot, kinds: OperationKinds) -> bool {
    slot.operation_kind()
        .is_some_and(|kind| !kinds.contains(kind))
}

/// The order commits run in when applying. Reverting walks it backwards.
pub const APPLY_ORDER: [Slot; 12] = [
    Slot::Migration,
    Slot::Cycles,
    Slot::BlockHeader,
    Slot::Activations,
    Slot::Attestations,
    Slot::Transactions,
    Slot::Delegations,
    Slot::Originations,
    Slot::DoubleBakings,
    Slot::NonceRevelations,
    Slot::Rights,
    Slot::Voting,
];

// RuleTable
// ----------------------------------------------------------------------------

/// Commits per (epoch, slot). Resolution walks the epoch axis backwards so
/// an epoch only registers the slots it changes.
#[derive(Default)]
pub struct RuleTable {
    epochs: BTreeMap<Epoch, BTreeMap<Slot, Arc<dyn Commit>>>,
}

impl RuleTable {
    pub fn register(&mut self, epoch: Epoch, slot: Slot, commit: Arc<dyn Commit>) {
        self.epochs.entry(epoch).or_default().insert(slot, commit);
    }

    /// The commit governing `slot` under `epoch`: the latest registration at
    /// or below the epoch. `None` for slots no epoch has claimed.
    pub fn resolve(&self, epoch: Epoch, slot: Slot) -> Option<&Arc<dyn Commit>> {
        self.epochs
            .range(..=epoch)
            .rev()
            .find_map(|(_, slots)| slots.get(&slot))
    }

    /// The standard table: epoch 0 carries the full set, epoch 1 folds a
    /// verifiable-delay output into the seed and runs a one-off grace
    /// migration at its boundary.
    pub fn standard() -> Self {
        let mut table = Self::default();
        table.register(0, Slot::Cycles, Arc::new(commits::CyclesCommit::new(false)));
        table.register(0, Slot::BlockHeader, Arc::new(commits::BlockHeaderCommit));
        table.register(0, Slot::Activations, Arc::new(commits::ActivationsCommit));
        table.register(0, Slot::Attestations, Arc::new(commits::AttestationsCommit));
        table.register(0, Slot::Transactions, Arc::new(commits::TransactionsCommit));
        table.register(0, Slot::Delegations, Arc::new(commits::DelegationsCommit));
        table.register(0, Slot::Originations, Arc::new(commits::OriginationsCommit));
        table.register(0, Slot::DoubleBakings, Arc::new(commits::DoubleBakingsCommit));
        table.register(
            0,
            Slot::NonceRevelations,
            Arc::new(commits::NonceRevelationsCommit),
        );
        table.register(0, Slot::Rights, Arc::new(commits::RightsCommit));
        table.register(0, Slot::Voting, Arc::new(commits::VotingCommit));

        table.register(1, Slot::Cycles, Arc::new(commits::CyclesCommit::new(true)));
        table.register(1, Slot::Migration, Arc::new(commits::GraceMigration));
        table
    }
}

// ProtocolDirectory
// ----------------------------------------------------------------------------

/// Protocol hashes seen on the chain, in upgrade order. Hashes register
/// themselves the first time a block announces them, so the directory needs
/// no hardcoded chain knowledge.
#[derive(Debug, Default)]
pub struct ProtocolDirectory {
    epochs: BTreeMap<ProtocolHash, Epoch>,
}

impl ProtocolDirectory {
    pub fn epoch_of(&self, protocol: &ProtocolHash) -> Option<Epoch> {
        self.epochs.get(protocol).copied()
    }

    /// Register a protocol hash at the next epoch; idempotent.
    pub fn register(&mut self, protocol: &ProtocolHash) -> Epoch {
        if let Some(epoch) = self.epochs.get(protocol) {
            return *epoch;
        }
        let epoch = self.epochs.len() as Epoch;
        info!(target: EVENT_TARGET, %protocol, %epoch, "protocol.registered");
        self.epochs.insert(protocol.clone(), epoch);
        epoch
    }
}

// Pipeline
// ----------------------------------------------------------------------------

pub struct Pipeline {
    params: ProtocolParameters,
    table: RuleTable,
    directory: ProtocolDirectory,
}

impl Pipeline {
    pub fn new(params: ProtocolParameters) -> Self {
        Self {
            params,
            table: RuleTable::standard(),
            directory: ProtocolDirectory::default(),
        }
    }

    pub fn params(&self) -> &ProtocolParameters {
        &self.params
    }

    /// Apply one raw block on top of the current head. The whole block is
    /// one unit of work: either every commit lands in one atomic save, or
    /// nothing reaches the store.
    pub fn commit_block(
        &mut self,
        store: &dyn Store,
        cache: &mut StagingCache,
        raw: &RawBlock,
    ) -> Result<Level, CommitError> {
        let level = raw.header.level;
        let mut unit = WorkUnit::for_apply(store, cache, &self.params, level)?;

        let state = unit.app_state();
        if level != state.level + 1 {
            return Err(CommitError::MalformedBlock(format!(
                "block at level {level} cannot extend head at {}",
                state.level
            )));
        }
        if raw.header.predecessor != state.hash {
            return Err(CommitError::PredecessorMismatch {
                level,
                expected: state.hash.clone(),
                found: raw.header.predecessor.clone(),
            });
        }

        let epoch = self.directory.register(&raw.protocol);
        debug!(target: EVENT_TARGET, %level, %epoch, "block.applying");

        for slot in APPLY_ORDER {
            if let Some(commit) = self.table.resolve(epoch, slot) {
                commit.apply(&mut unit, raw)?;
            }
        }

        store.save(unit.finish_apply()?)?;
        Ok(level)
    }

    /// Revert the head block, leaving the store exactly as it was before
    /// that block was applied (modulo never-reused surrogate id counters).
    pub fn revert_last_block(
        &mut self,
        store: &dyn Store,
        cache: &mut StagingCache,
    ) -> Result<Level, CommitError> {
        let level = cache_head_level(store, cache)?
            .ok_or_else(|| CommitError::MissingRow("no head block to revert".into()))?;
        let mut unit = WorkUnit::for_revert(store, cache, &self.params, level)?;

        let block = unit
            .stored_block_at(level)?
            .ok_or_else(|| CommitError::MissingRow(format!("block {level}")))?;
        let operations = store.operations_at(level)?;

        let epoch = self
            .directory
            .epoch_of(&block.protocol)
            .ok_or_else(|| CommitError::UnknownProtocol(block.protocol.clone()))?;
        debug!(target: EVENT_TARGET, %level, %epoch, "block.reverting");

        for slot in APPLY_ORDER.iter().rev() {
            if skips_on_revert(*slot, block.operations) {
                continue;
            }
            if let Some(commit) = self.table.resolve(epoch, *slot) {
                commit.revert(&mut unit, &block, &operations)?;
            }
        }

        store.save(unit.finish_revert()?)?;
        Ok(level - 1)
    }
}

fn cache_head_level(
    store: &dyn Store,
    cache: &StagingCache,
) -> Result<Option<Level>, CommitError> {
    if let Some(state) = cache.app_state() {
        return Ok((state.level >= 0).then_some(state.level));
    }
    match store.app_state()? {
        Some(state) if state.level >= 0 => Ok(Some(state.level)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_kernel::Hasher;

    #[test]
    fn resolution_walks_epochs_backwards() {
        let table = RuleTable::standard();
        // Inherited slot: epoch 1 never re-registers the header commit.
        assert!(table.resolve(1, Slot::BlockHeader).is_some());
        // Migration exists only from epoch 1 on.
        assert!(table.resolve(0, Slot::Migration).is_none());
        assert!(table.resolve(1, Slot::Migration).is_some());
        assert!(table.resolve(7, Slot::Migration).is_some());
    }

    #[test]
    fn revert_skips_operation_slots_absent_from_the_block() {
        let empty = OperationKinds::none();
        let mut kinds = OperationKinds::none();
        kinds.insert(OperationKind::Transaction);

        // Structural slots always run.
        assert!(!skips_on_revert(Slot::BlockHeader, empty));
        assert!(!skips_on_revert(Slot::Cycles, empty));
        assert!(!skips_on_revert(Slot::Rights, empty));
        assert!(!skips_on_revert(Slot::Voting, empty));

        // Operation slots run only when their kind appeared.
        assert!(skips_on_revert(Slot::Transactions, empty));
        assert!(!skips_on_revert(Slot::Transactions, kinds));
        assert!(skips_on_revert(Slot::Delegations, kinds));
        assert!(skips_on_revert(Slot::Attestations, kinds));
    }

    #[test]
    fn every_operation_kind_has_a_slot() {
        let slots: Vec<_> = APPLY_ORDER
            .iter()
            .filter_map(|slot| slot.operation_kind())
            .collect();
        assert_eq!(slots.len(), 7);
        let unique: std::collections::BTreeSet<_> =
            slots.iter().map(|kind| *kind as u32).collect();
        assert_eq!(unique.len(), slots.len());
    }

    #[test]
    fn directory_registers_in_upgrade_order() {
        let mut directory = ProtocolDirectory::default();
        let alpha = Hasher::hash(b"proto-alpha");
        let beta = Hasher::hash(b"proto-beta");

        assert_eq!(directory.register(&alpha), 0);
        assert_eq!(directory.register(&beta), 1);
        assert_eq!(directory.register(&alpha), 0);
        assert_eq!(directory.epoch_of(&beta), Some(1));
    }
}
