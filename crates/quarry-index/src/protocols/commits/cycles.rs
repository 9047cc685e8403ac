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

//! Cycle rollover. At the first level of cycle `c` this commit extends the
//! grace period of bakers that were active in `c - 1`, re-evaluates
//! deactivation flags, and creates cycle `c + preserved_cycles` with its
//! seed, stake snapshot, rights and baker aggregates. The first block of the
//! chain bootstraps all of cycles `0..=preserved_cycles` at once.

use crate::pipeline::{Commit, CommitError, WorkUnit};
use crate::protocols::commits::stake_snapshot;
use crate::rights::seed::{chain_seed, fold_vdf, genesis_seed};
use crate::rights::{compute_cycle_rights, CycleRights};
use quarry_kernel::{
    Account, BakerCycle, Block, Cycle, CycleIndex, Level, Mutez, Operation, ProtocolParameters,
    RawBlock, Seed,
};
use tracing::debug;

const EVENT_TARGET: &str = "quarry::index::commits::cycles";

pub struct CyclesCommit {
    /// Whether this epoch folds a verifiable-delay output into the seed.
    fold_vdf: bool,
}

impl CyclesCommit {
    pub fn new(fold_vdf: bool) -> Self {
        Self { fold_vdf }
    }

    fn seed_for(
        &self,
        unit: &mut WorkUnit<'_>,
        target: CycleIndex,
        entering: CycleIndex,
        vdf: Option<&Vec<u8>>,
    ) -> Result<Seed, CommitError> {
        if target == 0 {
            return Ok(genesis_seed());
        }
        let previous = unit
            .cycle(target - 1)?
            .ok_or_else(|| CommitError::MissingRow(format!("cycle {}", target - 1)))?;
        let nonces = if entering == 0 {
            Vec::new()
        } else {
            unit.nonces_revealed_in(entering - 1)?
        };
        let mut seed = chain_seed(&previous.seed, target, &nonces);
        if self.fold_vdf {
            if let Some(vdf) = vdf {
                seed = fold_vdf(&seed, vdf);
            }
        }
        Ok(seed)
    }

    fn create_cycle(
        &self,
        unit: &mut WorkUnit<'_>,
        target: CycleIndex,
        entering: CycleIndex,
        vdf: Option<&Vec<u8>>,
    ) -> Result<(), CommitError> {
        let seed = self.seed_for(unit, target, entering, vdf)?;
        let snapshot = stake_snapshot(unit)?;
        let total_stake: Mutez = snapshot.iter().map(|(_, _, stake)| *stake).sum();

        let CycleRights {
            rights,
            expected,
            selected_stake,
        } = compute_cycle_rights(unit.params(), target, &seed, &snapshot);

        debug!(
            target: EVENT_TARGET,
            cycle = target,
            bakers = snapshot.len(),
            rights = rights.len(),
            "cycle.created"
        );

        unit.stage_cycle(Cycle {
            index: target,
            snapshot_level: unit.params().snapshot_level_for(target),
            seed,
            total_stake,
            total_bakers: snapshot.len() as i64,
            selected_stake,
        });
        for (_, baker, stake) in &snapshot {
            // A row may already exist on demand: the genesis proposer bakes
            // in cycle 0 before the cycle row does.
            let mut row = unit
                .baker_cycle(target, *baker)?
                .unwrap_or_else(|| BakerCycle::new(target, *baker, 0));
            row.staking_balance = *stake;
            if let Some(exp) = expected.get(baker) {
                row.future_blocks += exp.blocks;
                row.future_attestations += exp.attestation_slots;
            }
            unit.stage_baker_cycle(row);
        }
        unit.stage_rights(rights);
        Ok(())
    }
}

impl Commit for CyclesCommit {
    fn apply(&self, unit: &mut WorkUnit<'_>, raw: &RawBlock) -> Result<(), CommitError> {
        let level = raw.header.level;
        let params = unit.params();
        if !starts_cycle(params, level) {
            return Ok(());
        }
        let entering = params.cycle_of(level);
        let preserved = params.preserved_cycles;

        if entering >= 1 {
            extend_grace_periods(unit, entering)?;
            refresh_deactivations(unit, entering)?;
        }

        for target in entering..=entering + preserved {
            if unit.cycle(target)?.is_none() {
                self.create_cycle(unit, target, entering, raw.vdf.as_ref())?;
            }
        }
        Ok(())
    }

    fn revert(
        &self,
        unit: &mut WorkUnit<'_>,
        block: &Block,
        _operations: &[Operation],
    ) -> Result<(), CommitError> {
        let level = block.level;
        let params = unit.params();
        if !starts_cycle(params, level) {
            return Ok(());
        }
        let entering = params.cycle_of(level);
        let preserved = params.preserved_cycles;

        // Drop the cycles this block created: all of them for the bootstrap
        // block, only the furthest one afterwards.
        if entering == 0 {
            for target in 0..=preserved {
                delete_cycle_keeping_activity(unit, target)?;
            }
        } else {
            delete_cycle_keeping_activity(unit, entering + preserved)?;
        }

        if entering >= 1 {
            restore_grace_periods(unit, entering)?;
            restore_deactivations(unit, entering)?;
        }
        Ok(())
    }
}

/// The first block of a cycle is the one right after a cycle end. Genesis
/// (level 0) precedes cycle 0's span and never rolls anything over.
fn starts_cycle(params: &ProtocolParameters, level: Level) -> bool {
    level == 1 || params.is_cycle_end(level - 1)
}

/// Undo a cycle creation. Every intervening block has already been reverted,
/// so each aggregate row holds exactly what creation wrote plus whatever
/// on-demand activity preceded the cycle row (genesis bootstrap only). The
/// activity part must survive the deletion.
fn delete_cycle_keeping_activity(
    unit: &mut WorkUnit<'_>,
    target: CycleIndex,
) -> Result<(), CommitError> {
    let survivors: Vec<BakerCycle> = unit
        .baker_cycles_of(target)?
        .into_iter()
        .filter_map(|row| {
            let stripped = BakerCycle {
                staking_balance: 0,
                future_blocks: 0,
                future_attestations: 0,
                ..row
            };
            (stripped != BakerCycle::new(target, stripped.baker, 0)).then_some(stripped)
        })
        .collect();
    unit.delete_cycle(target);
    for row in survivors {
        unit.stage_baker_cycle(row);
    }
    Ok(())
}

/// A baker active during the cycle that just ended gets its grace window
/// pushed out. The overwritten value is parked on the aggregate row so the
/// revert can restore it.
fn extend_grace_periods(unit: &mut WorkUnit<'_>, entering: CycleIndex) -> Result<(), CommitError> {
    let ended = entering - 1;
    for mut row in unit.baker_cycles_of(ended)? {
        if !row.is_active() {
            continue;
        }
        let mut account = unit.account(row.baker)?;
        let Some(baker) = account.baker.as_mut() else {
            continue;
        };
        row.prior_grace_period = Some(baker.grace_period);
        baker.grace_period = ended + unit.params().grace_period_cycles;
        unit.stage_account(account);
        unit.stage_baker_cycle(row);
    }
    Ok(())
}

fn restore_grace_periods(unit: &mut WorkUnit<'_>, entering: CycleIndex) -> Result<(), CommitError> {
    let ended = entering - 1;
    for mut row in unit.baker_cycles_of(ended)? {
        let Some(prior) = row.prior_grace_period.take() else {
            continue;
        };
        let mut account = unit.account(row.baker)?;
        if let Some(baker) = account.baker.as_mut() {
            baker.grace_period = prior;
            unit.stage_account(account);
        }
        unit.stage_baker_cycle(row);
    }
    Ok(())
}

/// `deactivated` is derived: a baker whose grace window closed before the
/// cycle being entered is inactive.
fn refresh_deactivations(unit: &mut WorkUnit<'_>, entering: CycleIndex) -> Result<(), CommitError> {
    set_deactivations(unit, entering)
}

/// Re-derive the flags for the boundary that preceded this one.
fn restore_deactivations(
    unit: &mut WorkUnit<'_>,
    entering: CycleIndex,
) -> Result<(), CommitError> {
    if entering >= 2 {
        set_deactivations(unit, entering - 1)
    } else {
        // Before the first rollover nothing was ever deactivated.
        for account in unit.bakers()? {
            clear_deactivation(unit, account)?;
        }
        Ok(())
    }
}

fn set_deactivations(unit: &mut WorkUnit<'_>, boundary: CycleIndex) -> Result<(), CommitError> {
    for mut account in unit.bakers()? {
        let Some(baker) = account.baker.as_mut() else {
            continue;
        };
        let flag = baker.grace_period < boundary;
        if baker.deactivated != flag {
            baker.deactivated = flag;
            unit.stage_account(account);
        }
    }
    Ok(())
}

fn clear_deactivation(unit: &mut WorkUnit<'_>, mut account: Account) -> Result<(), CommitError> {
    if let Some(baker) = account.baker.as_mut() {
        if baker.deactivated {
            baker.deactivated = false;
            unit.stage_account(account);
        }
    }
    Ok(())
}
