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

//! Delegation moves. A self-delegation registers (or re-activates) a baker;
//! anything else moves the sender's balance between staking pools. The
//! operation row records the balance that moved and the baker-state fields a
//! promotion overwrote, which is everything the inverse needs.

use crate::pipeline::{Commit, CommitError, WorkUnit};
use crate::protocols::commits::{touch, untouch};
use quarry_kernel::{
    AccountId, AccountKind, Block, DelegationOp, Operation, RawBlock, RawOperation,
};

pub struct DelegationsCommit;

impl Commit for DelegationsCommit {
    fn apply(&self, unit: &mut WorkUnit<'_>, raw: &RawBlock) -> Result<(), CommitError> {
        let level = raw.header.level;
        let grace = unit.params().cycle_of(level) + unit.params().grace_period_cycles;

        for operation in &raw.operations {
            let RawOperation::Delegation {
                hash,
                source,
                delegate,
                fee,
            } = operation
            else {
                continue;
            };

            let sender = unit.expect_account(source)?;
            unit.debit(sender.id, *fee)?;

            let mut sender = unit.account(sender.id)?;
            let staked = sender.balance;
            let prev_delegate = sender.delegate;
            let self_delegation = delegate.as_ref() == Some(source);
            let (prev_grace_period, prev_deactivated) = if self_delegation {
                match &sender.baker {
                    Some(baker) => (Some(baker.grace_period), Some(baker.deactivated)),
                    None => (None, None),
                }
            } else {
                (None, None)
            };

            // Detach from the current pool.
            if let Some(prev) = prev_delegate {
                unit.adjust_staking(prev, -staked, prev != sender.id)?;
                if prev != sender.id {
                    bump_delegators(unit, prev, -1)?;
                }
                sender = unit.account(sender.id)?;
                sender.delegate = None;
                unit.stage_account(sender.clone());
            }

            // Attach to the new one.
            let new_delegate = match delegate {
                None => None,
                Some(_) if self_delegation => {
                    let mut sender = unit.account(sender.id)?;
                    if sender.is_baker() {
                        let baker = sender.baker_mut()?;
                        baker.deactivated = false;
                        baker.grace_period = grace;
                        sender.delegate = Some(sender.id);
                        let id = sender.id;
                        unit.stage_account(sender);
                        unit.adjust_staking(id, staked, false)?;
                    } else {
                        sender.promote_to_baker(grace);
                        unit.stage_account(sender);
                    }
                    Some(self_id(unit, source)?)
                }
                Some(address) => {
                    let pool = unit.expect_account(address)?;
                    unit.adjust_staking(pool.id, staked, true)?;
                    bump_delegators(unit, pool.id, 1)?;
                    let mut sender = unit.account(sender.id)?;
                    sender.delegate = Some(pool.id);
                    unit.stage_account(sender);
                    Some(pool.id)
                }
            };

            let sender_id = self_id(unit, source)?;
            touch(unit, sender_id, level)?;
            let id = unit.app_state_mut().next_operation_id();
            unit.push_operation(Operation::Delegation(DelegationOp {
                id,
                level,
                hash: *hash,
                sender: sender_id,
                prev_delegate,
                new_delegate,
                fee: *fee,
                staked_amount: staked,
                prev_grace_period,
                prev_deactivated,
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
        // Reverse id order, as fees may be paid from funds received earlier
        // in the same block.
        for operation in operations.iter().rev() {
            let Operation::Delegation(op) = operation else {
                continue;
            };

            // Detach from the pool the operation attached to.
            match op.new_delegate {
                Some(delegate) if delegate == op.sender => {
                    let mut sender = unit.account(op.sender)?;
                    match (op.prev_grace_period, op.prev_deactivated) {
                        // The operation promoted a plain account; demote it.
                        (None, _) => {
                            sender.kind = AccountKind::User;
                            sender.baker = None;
                            sender.delegate = None;
                            unit.stage_account(sender);
                        }
                        // The operation re-activated an existing baker.
                        (Some(grace), deactivated) => {
                            let baker = sender.baker_mut()?;
                            baker.grace_period = grace;
                            baker.deactivated = deactivated.unwrap_or(false);
                            sender.delegate = None;
                            unit.stage_account(sender);
                            unit.adjust_staking(op.sender, -op.staked_amount, false)?;
                        }
                    }
                }
                Some(delegate) => {
                    unit.adjust_staking(delegate, -op.staked_amount, true)?;
                    bump_delegators(unit, delegate, -1)?;
                    let mut sender = unit.account(op.sender)?;
                    sender.delegate = None;
                    unit.stage_account(sender);
                }
                None => {}
            }

            // Re-attach to the previous pool.
            if let Some(prev) = op.prev_delegate {
                unit.adjust_staking(prev, op.staked_amount, prev != op.sender)?;
                if prev != op.sender {
                    bump_delegators(unit, prev, 1)?;
                }
            }
            let mut sender = unit.account(op.sender)?;
            sender.delegate = op.prev_delegate;
            unit.stage_account(sender);

            unit.credit(op.sender, op.fee)?;
            untouch(unit, op.sender, block.level)?;
            unit.drop_operation(op.id);
        }
        Ok(())
    }
}

fn bump_delegators(
    unit: &mut WorkUnit<'_>,
    baker: AccountId,
    delta: i64,
) -> Result<(), CommitError> {
    let mut account = unit.account(baker)?;
    account.baker_mut()?.delegators_count += delta;
    unit.stage_account(account);
    Ok(())
}

fn self_id(
    unit: &mut WorkUnit<'_>,
    address: &quarry_kernel::Address,
) -> Result<AccountId, CommitError> {
    Ok(unit.expect_account(address)?.id)
}
