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

//! Plain value transfers. The fee leaves the sender here and reaches the
//! proposer through the header commit, so transfers net to zero inside the
//! block.

use crate::pipeline::{Commit, CommitError, WorkUnit};
use crate::protocols::commits::{release_if_created_here, touch, untouch};
use quarry_kernel::{AccountKind, Block, Operation, RawBlock, RawOperation, TransactionOp};

pub struct TransactionsCommit;

impl Commit for TransactionsCommit {
    fn apply(&self, unit: &mut WorkUnit<'_>, raw: &RawBlock) -> Result<(), CommitError> {
        let level = raw.header.level;
        for operation in &raw.operations {
            let RawOperation::Transaction {
                hash,
                source,
                destination,
                amount,
                fee,
            } = operation
            else {
                continue;
            };

            let sender = unit.expect_account(source)?;
            let kind = if destination.is_implicit() {
                AccountKind::User
            } else {
                AccountKind::Contract
            };
            let target = unit.ensure_account(destination, kind)?;

            unit.debit(sender.id, amount + fee)?;
            unit.credit(target.id, *amount)?;
            touch(unit, sender.id, level)?;
            touch(unit, target.id, level)?;

            let id = unit.app_state_mut().next_operation_id();
            unit.push_operation(Operation::Transaction(TransactionOp {
                id,
                level,
                hash: *hash,
                sender: sender.id,
                target: target.id,
                amount: *amount,
                fee: *fee,
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
        // Reverse id order: a later transfer may spend value an earlier one
        // delivered within the same block.
        for operation in operations.iter().rev() {
            let Operation::Transaction(op) = operation else {
                continue;
            };
            unit.debit(op.target, op.amount)?;
            unit.credit(op.sender, op.amount + op.fee)?;
            untouch(unit, op.sender, block.level)?;
            untouch(unit, op.target, block.level)?;
            release_if_created_here(unit, op.target, block.level)?;
            unit.drop_operation(op.id);
        }
        Ok(())
    }
}
