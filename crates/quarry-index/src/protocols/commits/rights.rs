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

//! Right settlement. Once the header and operation commits have realized
//! their rights, whatever is still pending at this level was missed. Runs
//! last so it sees the block's realizations; its revert therefore runs first
//! and only touches the missed rows.

use crate::pipeline::{Commit, CommitError, WorkUnit};
use crate::protocols::commits::or_create_baker_cycle;
use quarry_kernel::{Block, Operation, RawBlock, RightKind, RightStatus};

pub struct RightsCommit;

impl Commit for RightsCommit {
    fn apply(&self, unit: &mut WorkUnit<'_>, raw: &RawBlock) -> Result<(), CommitError> {
        let level = raw.header.level;
        let cycle = unit.params().cycle_of(level);

        for mut right in unit.rights_at(level)? {
            if right.status != RightStatus::Future {
                continue;
            }
            let mut row = or_create_baker_cycle(unit, cycle, right.baker)?;
            match right.kind {
                RightKind::Baking { round: 0 } => {
                    row.future_blocks -= 1;
                    row.missed_blocks += 1;
                }
                // Only round-zero priorities count as missed blocks.
                RightKind::Baking { .. } => {}
                RightKind::Attestation { slots } => {
                    row.future_attestations -= slots as i64;
                    row.missed_attestations += slots as i64;
                }
            }
            unit.stage_baker_cycle(row);
            right.status = RightStatus::Missed;
            unit.stage_right(right);
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
        let cycle = unit.params().cycle_of(level);

        for mut right in unit.rights_at(level)? {
            if right.status != RightStatus::Missed {
                continue;
            }
            let mut row = or_create_baker_cycle(unit, cycle, right.baker)?;
            match right.kind {
                RightKind::Baking { round: 0 } => {
                    row.future_blocks += 1;
                    row.missed_blocks -= 1;
                }
                RightKind::Baking { .. } => {}
                RightKind::Attestation { slots } => {
                    row.future_attestations += slots as i64;
                    row.missed_attestations -= slots as i64;
                }
            }
            unit.stage_baker_cycle(row);
            right.status = RightStatus::Future;
            unit.stage_right(right);
        }
        Ok(())
    }
}
