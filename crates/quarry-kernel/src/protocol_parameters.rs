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

use crate::{CycleIndex, Level, Mutez, ONE_COIN};
use serde::{Deserialize, Serialize};

// ProtocolParameters
// ----------------------------------------------------------------------------

/// Parameters governing cycle layout, rights and rewards. Unlike physical
/// network constants these *can* change when the chain upgrades its protocol,
/// which is why every protocol epoch carries its own copy and why migrations
/// must rewrite derived state when the copy changes (see the commit
/// pipeline).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolParameters {
    /// Number of levels per baking cycle.
    pub blocks_per_cycle: i64,

    /// How many cycles ahead rights are pre-computed. The cycle governing
    /// level `l` was created when cycle `cycle(l) - preserved_cycles` was
    /// entered.
    pub preserved_cycles: i64,

    /// Number of levels per voting period.
    pub blocks_per_voting_period: i64,

    /// Attestation slots per level.
    pub committee_size: u32,

    /// How many baking priorities (rounds) to pre-compute per level.
    pub max_baking_rounds: u32,

    /// Fixed reward credited to the proposer of a block.
    pub block_reward: Mutez,

    /// Reward per attestation slot actually used.
    pub attestation_reward_per_slot: Mutez,

    /// Amount burned when originating a new contract.
    pub origination_burn: Mutez,

    /// Number of cycles without activity before a baker is deactivated.
    pub grace_period_cycles: i64,
}

impl ProtocolParameters {
    /// The cycle a level belongs to. Level 0 is the genesis block and sits in
    /// cycle 0 together with levels `1..=blocks_per_cycle`.
    pub fn cycle_of(&self, level: Level) -> CycleIndex {
        if level <= 0 {
            0
        } else {
            (level - 1) / self.blocks_per_cycle
        }
    }

    /// First level of a cycle (never 0; genesis precedes cycle 0's span).
    pub fn first_level_of(&self, cycle: CycleIndex) -> Level {
        cycle * self.blocks_per_cycle + 1
    }

    pub fn last_level_of(&self, cycle: CycleIndex) -> Level {
        (cycle + 1) * self.blocks_per_cycle
    }

    pub fn is_cycle_end(&self, level: Level) -> bool {
        level >= 1 && level % self.blocks_per_cycle == 0
    }

    /// The level whose stake distribution seeds rights for `cycle`. Taken at
    /// the end of the cycle `preserved_cycles + 1` before it, so the
    /// distribution is final well before rights are consumed.
    pub fn snapshot_level_for(&self, cycle: CycleIndex) -> Level {
        let source = cycle - self.preserved_cycles - 1;
        if source < 0 {
            0
        } else {
            self.last_level_of(source)
        }
    }

    pub fn voting_period_of(&self, level: Level) -> i32 {
        if level <= 0 {
            0
        } else {
            ((level - 1) / self.blocks_per_voting_period) as i32
        }
    }

    pub fn is_voting_period_end(&self, level: Level) -> bool {
        level >= 1 && level % self.blocks_per_voting_period == 0
    }
}

impl Default for ProtocolParameters {
    fn default() -> Self {
        Self {
            blocks_per_cycle: 4096,
            preserved_cycles: 5,
            blocks_per_voting_period: 16384,
            committee_size: 128,
            max_baking_rounds: 8,
            block_reward: 10 * ONE_COIN,
            attestation_reward_per_slot: ONE_COIN / 100,
            origination_burn: ONE_COIN / 4,
            grace_period_cycles: 4,
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl ProtocolParameters {
    /// Small cycles so that scenario tests cross several boundaries within a
    /// hundred blocks.
    pub fn for_tests() -> Self {
        Self {
            blocks_per_cycle: 8,
            preserved_cycles: 2,
            blocks_per_voting_period: 16,
            committee_size: 4,
            max_baking_rounds: 2,
            block_reward: 1_000,
            attestation_reward_per_slot: 10,
            origination_burn: 250,
            grace_period_cycles: 2,
        }
    }
}
