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

//! Attestations of the block's own level. Rewards are minted per slot, the
//! attester's right flips to realized, and the cycle aggregates move.

use crate::pipeline::{Commit, CommitError, WorkUnit};
use crate::protocols::commits::{or_create_baker_cycle, touch, untouch};
use quarry_kernel::{
    AttestationOp, Block, Operation, RawBlock, RawOperation, RightKind, RightStatus,
};

pub struct AttestationsCommit;

impl Commit for AttestationsCommit {
    fn apply(&self, unit: &mut WorkUnit<'_>, raw: &RawBlock) -> Result<(), CommitError> {
        let level = raw.header.level;
        let cycle = unit.params().cycle_of(level);
        let reward_per_slot = unit.params().attestation_reward_per_slot;

        for operation in &raw.operations {
            let RawOperation::Attestation {
                hash,
                source,
                slots,
            } = operation
            else {
                continue;
            };

            let attester = unit.expect_account(source)?;
            let reward = *slots as i64 * reward_per_slot;
            unit.credit(attester.id, reward)?;
            unit.mint(reward);
            touch(unit, attester.id, level)?;

            let right = unit.rights_at(level)?.into_iter().find(|right| {
                right.baker == attester.id && matches!(right.kind, RightKind::Attestation { .. })
            });
            let mut row = or_create_baker_cycle(unit, cycle, attester.id)?;
            row.attestations += *slots as i64;
            row.attestation_rewards += reward;
            if let Some(mut right) = right {
                row.future_attestations -= *slots as i64;
                right.status = RightStatus::Realized;
                unit.stage_right(right);
            }
            unit.stage_baker_cycle(row);

            let id = unit.app_state_mut().next_operation_id();
            unit.push_operation(Operation::Attestation(AttestationOp {
                id,
                level,
                hash: *hash,
                baker: attester.id,
                slots: *slots,
                reward,
            }));
        }
        Ok(())
    }

    fn revert(
        &self,
        unit: &mut WorkUnit<'_>,
        block: &Block,
        operations: &[Operation],
    ) -> Result<(), CommitError> {
        let level = block.level;
        let cycle = unit.params().cycle_of(level);

        for operation in operations.iter().rev() {
            let Operation::Attestation(op) = operation else {
                continue;
            };

            let right = unit.rights_at(level)?.into_iter().find(|right| {
                right.baker == op.baker
                    && matches!(right.kind, RightKind::Attestation { .. })
                    && right.status == RightStatus::Realized
            });
            let mut row = or_create_baker_cycle(unit, cycle, op.baker)?;
            row.attestations -= op.slots as i64;
            row.attestation_rewards -= op.reward;
            if let Some(mut right) = right {
                row.future_attestations += op.slots as i64;
                right.status = RightStatus::Future;
                unit.stage_right(right);
            }
            unit.stage_baker_cycle(row);

            unit.debit(op.baker, op.reward)?;
            unit.mint(-op.reward);
            untouch(unit, op.baker, level)?;
            unit.drop_operation(op.id);
        }
        Ok(())
    }
}
