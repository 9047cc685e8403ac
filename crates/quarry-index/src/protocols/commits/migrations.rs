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

//! One-off state rewrites at protocol upgrade boundaries. A migration
//! self-gates on the boundary block and ships its own downgrade, run when
//! that block is reverted.

use crate::pipeline::{Commit, CommitError, WorkUnit};
use quarry_kernel::{Block, Operation, RawBlock};
use tracing::info;

const EVENT_TARGET: &str = "quarry::index::commits::migrations";

/// The second protocol grants every active baker one extra grace cycle on
/// upgrade.
pub struct GraceMigration;

impl Commit for GraceMigration {
    fn apply(&self, unit: &mut WorkUnit<'_>, raw: &RawBlock) -> Result<(), CommitError> {
        let state = unit.app_state();
        if state.level < 0 || state.protocol == raw.protocol {
            return Ok(());
        }
        info!(
            target: EVENT_TARGET,
            level = raw.header.level,
            protocol = %raw.protocol,
            "migration.grace_extension"
        );
        shift_grace(unit, 1)
    }

    fn revert(
        &self,
        unit: &mut WorkUnit<'_>,
        block: &Block,
        _operations: &[Operation],
    ) -> Result<(), CommitError> {
        let Some(previous) = unit.stored_block_at(block.level - 1)? else {
            return Ok(());
        };
        if previous.protocol == block.protocol {
            return Ok(());
        }
        info!(
            target: EVENT_TARGET,
            level = block.level,
            protocol = %block.protocol,
            "migration.grace_extension.downgrade"
        );
        shift_grace(unit, -1)
    }
}

fn shift_grace(unit: &mut WorkUnit<'_>, delta: i64) -> Result<(), CommitError> {
    for mut account in unit.bakers()? {
        let Some(baker) = account.baker.as_mut() else {
            continue;
        };
        if baker.deactivated {
            continue;
        }
        baker.grace_period += delta;
        unit.stage_account(account);
    }
    Ok(())
}
