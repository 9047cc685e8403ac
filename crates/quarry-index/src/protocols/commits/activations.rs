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

//! Commitment activations. Value enters supply through the `activated`
//! channel, except in the genesis block where it counts as bootstrapped.

use crate::pipeline::{Commit, CommitError, WorkUnit};
use crate::protocols::commits::{release_if_created_here, touch, untouch};
use quarry_kernel::{
    ActivationOp, AccountKind, Block, Operation, RawBlock, RawOperation,
};

pub struct ActivationsCommit;

impl Commit for ActivationsCommit {
    fn apply(&self, unit: &mut WorkUnit<'_>, raw: &RawBlock) -> Result<(), CommitError> {
        let level = raw.header.level;
        for operation in &raw.operations {
            let RawOperation::Activation {
                hash,
                account,
                amount,
            } = operation
            else {
                continue;
            };

            let holder = unit.ensure_account(account, AccountKind::User)?;
            unit.credit(holder.id, *amount)?;
            if level == 0 {
                unit.bootstrap(*amount);
            } else {
                unit.activate(*amount);
            }
            touch(unit, holder.id, level)?;

            let id = unit.app_state_mut().next_operation_id();
            unit.push_operation(Operation::Activation(ActivationOp {
                id,
                level,
                hash: *hash,
                account: holder.id,
                amount: *amount,
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
            let Operation::Activation(op) = operation else {
                continue;
            };
            unit.debit(op.account, op.amount)?;
            if block.level == 0 {
                unit.bootstrap(-op.amount);
            } else {
                unit.activate(-op.amount);
            }
            untouch(unit, op.account, block.level)?;
            release_if_created_here(unit, op.account, block.level)?;
            unit.drop_operation(op.id);
        }
        Ok(())
    }
}
