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

//! Seed nonce revelations. The nonce bytes are materialized on the row
//! because seed chaining reads them back when future cycles are created.

use crate::pipeline::{Commit, CommitError, WorkUnit};
use crate::protocols::commits::{touch, untouch};
use quarry_kernel::{Block, NonceRevelationOp, Operation, RawBlock, RawOperation};

pub struct NonceRevelationsCommit;

impl Commit for NonceRevelationsCommit {
    fn apply(&self, unit: &mut WorkUnit<'_>, raw: &RawBlock) -> Result<(), CommitError> {
        let level = raw.header.level;
        for operation in &raw.operations {
            let RawOperation::NonceRevelation {
                hash,
                source,
                revealed_level,
                nonce,
                reward,
            } = operation
            else {
                continue;
            };

            let baker = unit.expect_account(source)?;
            unit.credit(baker.id, *reward)?;
            unit.mint(*reward);
            touch(unit, baker.id, level)?;

            let id = unit.app_state_mut().next_operation_id();
            unit.push_operation(Operation::NonceRevelation(NonceRevelationOp {
                id,
                level,
                hash: *hash,
                baker: baker.id,
                revealed_level: *revealed_level,
                revealed_cycle: unit.params().cycle_of(*revealed_level),
                nonce: nonce.clone(),
                reward: *reward,
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
        for operation in operations.iter().rev() {
            let Operation::NonceRevelation(op) = operation else {
                continue;
            };
            unit.debit(op.baker, op.reward)?;
            unit.mint(-op.reward);
            untouch(unit, op.baker, block.level)?;
            unit.drop_operation(op.id);
        }
        Ok(())
    }
}
