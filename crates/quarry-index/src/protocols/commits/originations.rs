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

//! Contract originations. The origination burn is the one place ordinary
//! operations destroy value.

use crate::pipeline::{Commit, CommitError, WorkUnit};
use crate::protocols::commits::{release_if_created_here, touch, untouch};
use quarry_kernel::{AccountKind, Block, Operation, OriginationOp, RawBlock, RawOperation};

pub struct OriginationsCommit;

impl Commit for OriginationsCommit {
    fn apply(&self, unit: &mut WorkUnit<'_>, raw: &RawBlock) -> Result<(), CommitError> {
        let level = raw.header.level;
        let burn = unit.params().origination_burn;

        for operation in &raw.operations {
            let RawOperation::Origination {
                hash,
                source,
                contract,
                balance,
                fee,
            } = operation
            else {
                continue;
            };

            let sender = unit.expect_account(source)?;
            let originated = unit.ensure_account(contract, AccountKind::Contract)?;

            unit.debit(sender.id, balance + fee + burn)?;
            unit.credit(originated.id, *balance)?;
            unit.burn(burn);
            touch(unit, sender.id, level)?;
            touch(unit, originated.id, level)?;

            let id = unit.app_state_mut().next_operation_id();
            unit.push_operation(Operation::Origination(OriginationOp {
                id,
                level,
                hash: *hash,
                sender: sender.id,
                contract: originated.id,
                contract_address: contract.clone(),
                balance: *balance,
                fee: *fee,
                burn,
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
            let Operation::Origination(op) = operation else {
                continue;
            };
            unit.debit(op.contract, op.balance)?;
            unit.credit(op.sender, op.balance + op.fee + op.burn)?;
            unit.burn(-op.burn);
            untouch(unit, op.sender, block.level)?;
            untouch(unit, op.contract, block.level)?;
            release_if_created_here(unit, op.contract, block.level)?;
            unit.drop_operation(op.id);
        }
        Ok(())
    }
}
