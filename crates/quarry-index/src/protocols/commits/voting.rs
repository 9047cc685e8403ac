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

//! Voting bookkeeping. The period and epoch counters are pure functions of
//! the level, so their inverse is a recomputation. The voting power
//! distribution frozen at each period's first level is not: it is
//! materialized as a row from the same stake snapshot the rights sampler
//! uses, and deleted again when the opening block is reverted.

use crate::pipeline::{Commit, CommitError, WorkUnit};
use crate::protocols::commits::stake_snapshot;
use quarry_kernel::{
    Block, Level, Mutez, Operation, ProtocolParameters, RawBlock, VoterPower, VotingPeriod,
};
use tracing::debug;

const EVENT_TARGET: &str = "quarry::index::commits::voting";

/// Governance periods per epoch (proposal, exploration, cooldown, adoption).
const PERIODS_PER_EPOCH: i32 = 4;

pub struct VotingCommit;

impl Commit for VotingCommit {
    fn apply(&self, unit: &mut WorkUnit<'_>, raw: &RawBlock) -> Result<(), CommitError> {
        let level = raw.header.level;
        set_voting_position(unit, level);
        if !starts_period(unit.params(), level) {
            return Ok(());
        }

        let index = unit.params().voting_period_of(level);
        let voters: Vec<VoterPower> = stake_snapshot(unit)?
            .into_iter()
            .map(|(_, baker, stake)| VoterPower {
                baker,
                power: stake,
            })
            .collect();
        let total_power: Mutez = voters.iter().map(|voter| voter.power).sum();

        debug!(
            target: EVENT_TARGET,
            period = index,
            voters = voters.len(),
            "period.opened"
        );
        unit.stage_voting_period(VotingPeriod {
            index,
            epoch: index / PERIODS_PER_EPOCH,
            first_level: level,
            total_power,
            voters,
        });
        Ok(())
    }

    fn revert(
        &self,
        unit: &mut WorkUnit<'_>,
        block: &Block,
        _operations: &[Operation],
    ) -> Result<(), CommitError> {
        let level = block.level;
        set_voting_position(unit, level - 1);
        if starts_period(unit.params(), level) {
            let index = unit.params().voting_period_of(level);
            unit.delete_voting_period(index);
        }
        Ok(())
    }
}

/// The first block of a period is the one right after a period end. Genesis
/// sits before period 0's span; level 1 opens it.
fn starts_period(params: &ProtocolParameters, level: Level) -> bool {
    level == 1 || params.is_voting_period_end(level - 1)
}

fn set_voting_position(unit: &mut WorkUnit<'_>, level: Level) {
    let period = unit.params().voting_period_of(level);
    let state = unit.app_state_mut();
    state.voting_period = period;
    state.voting_epoch = period / PERIODS_PER_EPOCH;
}
