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

//! Header effects: the block row itself, the proposer's reward and fee
//! income, the proposer's freezer moves, the advancing app state, and the
//! resolution of the proposer's baking right.

use crate::pipeline::{Commit, CommitError, WorkUnit};
use crate::protocols::commits::{or_create_baker_cycle, release_baker_cycle_if_pristine};
use quarry_kernel::{
    AccountKind, AppState, Block, Mutez, Operation, OperationKinds, RawBlock, RawOperation,
    RightKind, RightStatus,
};

pub struct BlockHeaderCommit;

impl Commit for BlockHeaderCommit {
    fn apply(&self, unit: &mut WorkUnit<'_>, raw: &RawBlock) -> Result<(), CommitError> {
        let level = raw.header.level;

        let declared: Mutez = raw.operations.iter().map(operation_fee).sum();
        if declared != raw.fees {
            return Err(CommitError::MalformedBlock(format!(
                "header declares {} in fees, operations carry {}",
                raw.fees, declared
            )));
        }

        let mut proposer = unit.ensure_account(&raw.proposer, AccountKind::User)?;
        if !proposer.is_baker() {
            let cycle = unit.params().cycle_of(level);
            proposer.promote_to_baker(cycle + unit.params().grace_period_cycles);
        }
        proposer.last_level = level;
        let proposer_id = proposer.id;
        unit.stage_account(proposer);

        unit.credit(proposer_id, raw.reward + raw.fees)?;
        unit.mint(raw.reward);

        let frozen_change: Mutez = raw
            .freezer_updates
            .iter()
            .filter(|update| update.delegate == raw.proposer)
            .map(|update| update.change)
            .sum();
        if frozen_change != 0 {
            unit.adjust_frozen(proposer_id, frozen_change)?;
        }

        let state = unit.app_state_mut();
        state.level = level;
        state.hash = raw.header.hash;
        state.timestamp = raw.header.timestamp;
        state.protocol = raw.protocol;
        state.next_protocol = raw.next_protocol;

        unit.stage_block(Block {
            level,
            hash: raw.header.hash,
            predecessor: raw.header.predecessor,
            timestamp: raw.header.timestamp,
            protocol: raw.protocol,
            proposer: proposer_id,
            reward: raw.reward,
            fees: raw.fees,
            frozen_change,
            operations: OperationKinds::none(),
        });

        // Resolve the proposer's baking right; levels without rights exist
        // only before the first cycle row (the genesis block).
        let cycle = unit.params().cycle_of(level);
        let proposer_right = unit.rights_at(level)?.into_iter().find(|right| {
            right.baker == proposer_id && matches!(right.kind, RightKind::Baking { .. })
        });
        let mut row = or_create_baker_cycle(unit, cycle, proposer_id)?;
        row.blocks += 1;
        row.block_rewards += raw.reward;
        if let Some(mut right) = proposer_right {
            if matches!(right.kind, RightKind::Baking { round: 0 }) {
                row.future_blocks -= 1;
            }
            right.status = RightStatus::Realized;
            unit.stage_right(right);
        }
        unit.stage_baker_cycle(row);

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

        let realized = unit.rights_at(level)?.into_iter().find(|right| {
            right.baker == block.proposer
                && matches!(right.kind, RightKind::Baking { .. })
                && right.status == RightStatus::Realized
        });
        let mut row = or_create_baker_cycle(unit, cycle, block.proposer)?;
        row.blocks -= 1;
        row.block_rewards -= block.reward;
        if let Some(mut right) = realized {
            if matches!(right.kind, RightKind::Baking { round: 0 }) {
                row.future_blocks += 1;
            }
            right.status = RightStatus::Future;
            unit.stage_right(right);
        }
        unit.stage_baker_cycle(row.clone());
        release_baker_cycle_if_pristine(unit, &row);

        if block.frozen_change != 0 {
            unit.adjust_frozen(block.proposer, -block.frozen_change)?;
        }
        unit.debit(block.proposer, block.reward + block.fees)?;
        unit.mint(-block.reward);

        let mut proposer = unit.account(block.proposer)?;
        if proposer.last_level == level {
            proposer.last_level = (level - 1).max(proposer.first_level);
        }
        unit.stage_account(proposer);

        // Rewind the app state to the predecessor block.
        let previous = unit.stored_block_at(level - 1)?;
        let state = unit.app_state_mut();
        match previous {
            Some(parent) => {
                state.level = parent.level;
                state.hash = parent.hash;
                state.timestamp = parent.timestamp;
                state.next_protocol = block.protocol;
                state.protocol = parent.protocol;
            }
            None => {
                let counters = (state.account_counter, state.operation_counter);
                *state = AppState::pre_genesis();
                state.account_counter = counters.0;
                state.operation_counter = counters.1;
            }
        }

        unit.remove_block(level);
        Ok(())
    }
}

fn operation_fee(operation: &RawOperation) -> Mutez {
    match operation {
        RawOperation::Transaction { fee, .. }
        | RawOperation::Delegation { fee, .. }
        | RawOperation::Origination { fee, .. } => *fee,
        RawOperation::DoubleBakingEvidence { .. }
        | RawOperation::NonceRevelation { .. }
        | RawOperation::Attestation { .. }
        | RawOperation::Activation { .. } => 0,
    }
}
