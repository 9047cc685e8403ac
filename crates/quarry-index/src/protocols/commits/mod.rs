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

//! One commit per concern. Each `apply` is paired with an exact `revert`
//! that reconstructs the prior state from materialized rows alone.

mod activations;
mod attestations;
mod block_header;
mod cycles;
mod delegations;
mod double_bakings;
mod migrations;
mod nonce_revelations;
mod originations;
mod rights;
mod transactions;
mod voting;

pub use activations::ActivationsCommit;
pub use attestations::AttestationsCommit;
pub use block_header::BlockHeaderCommit;
pub use cycles::CyclesCommit;
pub use delegations::DelegationsCommit;
pub use double_bakings::DoubleBakingsCommit;
pub use migrations::GraceMigration;
pub use nonce_revelations::NonceRevelationsCommit;
pub use originations::OriginationsCommit;
pub use rights::RightsCommit;
pub use transactions::TransactionsCommit;
pub use voting::VotingCommit;

use crate::pipeline::{CommitError, WorkUnit};
use quarry_kernel::{AccountId, Address, BakerCycle, CycleIndex, Level, Mutez};

/// Bakers eligible for a stake snapshot: registered, not deactivated,
/// non-zero stake. Cycle creation freezes it for rights, a voting rollover
/// for ballot power.
fn stake_snapshot(
    unit: &mut WorkUnit<'_>,
) -> Result<Vec<(Address, AccountId, Mutez)>, CommitError> {
    Ok(unit
        .bakers()?
        .into_iter()
        .filter_map(|account| {
            let baker = account.baker.as_ref()?;
            if baker.deactivated || baker.staking_balance <= 0 {
                return None;
            }
            Some((account.address.clone(), account.id, baker.staking_balance))
        })
        .collect())
}

/// Record that an operation touched an account.
fn touch(unit: &mut WorkUnit<'_>, id: AccountId, level: Level) -> Result<(), CommitError> {
    let mut account = unit.account(id)?;
    account.operations_count += 1;
    account.last_level = level;
    unit.stage_account(account);
    Ok(())
}

/// Undo [`touch`]. `last_level` is advisory and retreats one level when it
/// pointed at the reverted block.
fn untouch(unit: &mut WorkUnit<'_>, id: AccountId, level: Level) -> Result<(), CommitError> {
    let mut account = unit.account(id)?;
    account.operations_count -= 1;
    if account.last_level == level {
        account.last_level = (level - 1).max(account.first_level);
    }
    unit.stage_account(account);
    Ok(())
}

/// Delete an account again if the operation being reverted is what created
/// it. After the revert's debits a created-here account is indistinguishable
/// from never having existed except for these fields.
fn release_if_created_here(
    unit: &mut WorkUnit<'_>,
    id: AccountId,
    level: Level,
) -> Result<(), CommitError> {
    let account = unit.account(id)?;
    if account.first_level == level
        && account.operations_count == 0
        && account.balance == 0
        && account.delegate.is_none()
        && !account.is_baker()
    {
        unit.delete_account(id)?;
    }
    Ok(())
}

/// The aggregate row for a baker in a cycle, created on demand for bakers
/// outside the cycle's snapshot (possible on young chains).
fn or_create_baker_cycle(
    unit: &mut WorkUnit<'_>,
    cycle: CycleIndex,
    baker: AccountId,
) -> Result<BakerCycle, CommitError> {
    Ok(unit
        .baker_cycle(cycle, baker)?
        .unwrap_or_else(|| BakerCycle::new(cycle, baker, 0)))
}

/// Drop an on-demand aggregate row again once a revert has zeroed it.
fn release_baker_cycle_if_pristine(unit: &mut WorkUnit<'_>, row: &BakerCycle) {
    if *row == BakerCycle::new(row.cycle, row.baker, row.staking_balance)
        && row.staking_balance == 0
    {
        unit.delete_baker_cycle(row.cycle, row.baker);
    }
}
