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

//! Double-baking evidence. The offender forfeits `lost_staked` from balance,
//! staking and frozen deposit; the accuser (always the block's proposer)
//! pockets the denunciation reward and the remainder is burned.
//!
//! When the node attaches no freezer record naming the offender, the loss is
//! attributed to the block proposer. That fallback is known to be
//! best-effort; the row is flagged so downstream consumers can tell.

use crate::pipeline::{Commit, CommitError, WorkUnit};
use crate::protocols::commits::{touch, untouch};
use quarry_kernel::{Block, DoubleBakingOp, Operation, RawBlock, RawOperation};
use tracing::warn;

const EVENT_TARGET: &str = "quarry::index::commits::double_baking";

pub struct DoubleBakingsCommit;

impl Commit for DoubleBakingsCommit {
    fn apply(&self, unit: &mut WorkUnit<'_>, raw: &RawBlock) -> Result<(), CommitError> {
        let level = raw.header.level;
        for operation in &raw.operations {
            let RawOperation::DoubleBakingEvidence {
                hash,
                offender,
                reward,
                lost_staked,
            } = operation
            else {
                continue;
            };

            let accuser = unit.expect_account(&raw.proposer)?;
            let (offender_address, fallback) = match offender {
                Some(address) => (address.clone(), false),
                None => {
                    warn!(
                        target: EVENT_TARGET,
                        %level,
                        "evidence names no offender, attributing to the proposer"
                    );
                    (raw.proposer.clone(), true)
                }
            };
            let offender = unit.expect_account(&offender_address)?;

            unit.debit(offender.id, *lost_staked)?;
            unit.adjust_frozen(offender.id, -lost_staked)?;
            unit.credit(accuser.id, *reward)?;
            unit.burn(lost_staked - reward);
            touch(unit, accuser.id, level)?;

            let id = unit.app_state_mut().next_operation_id();
            unit.push_operation(Operation::DoubleBaking(DoubleBakingOp {
                id,
                level,
                hash: *hash,
                accuser: accuser.id,
                offender: offender.id,
                reward: *reward,
                lost_staked: *lost_staked,
                offender_fallback: fallback,
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
            let Operation::DoubleBaking(op) = operation else {
                continue;
            };
            unit.burn(-(op.lost_staked - op.reward));
            unit.debit(op.accuser, op.reward)?;
            unit.adjust_frozen(op.offender, op.lost_staked)?;
            unit.credit(op.offender, op.lost_staked)?;
            untouch(unit, op.accuser, block.level)?;
            unit.drop_operation(op.id);
        }
        Ok(())
    }
}
