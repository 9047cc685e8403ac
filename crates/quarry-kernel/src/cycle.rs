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

use crate::{AccountId, CycleIndex, Level, Mutez, Seed};
use serde::{Deserialize, Serialize};

// Cycle
// ----------------------------------------------------------------------------

/// One row per baking cycle, created `preserved_cycles` ahead of the cycle it
/// governs so that rights can be pre-computed. Deleted only when the block
/// that created it is reverted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cycle {
    pub index: CycleIndex,

    /// Level whose stake distribution was frozen for this cycle.
    pub snapshot_level: Level,

    /// The chained entropy driving the sampler for this cycle.
    pub seed: Seed,

    /// Sum of staking balances of all bakers in the snapshot.
    pub total_stake: Mutez,

    pub total_bakers: i64,

    /// Stake of the bakers actually selected for at least one right.
    pub selected_stake: Mutez,
}

// BakerCycle
// ----------------------------------------------------------------------------

/// Per (baker, cycle) aggregate, updated incrementally as rights are consumed
/// and as actual blocks/attestations are observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BakerCycle {
    pub cycle: CycleIndex,
    pub baker: AccountId,

    /// Stake the baker held in this cycle's snapshot.
    pub staking_balance: Mutez,

    pub future_blocks: i64,
    pub blocks: i64,
    pub missed_blocks: i64,

    pub future_attestations: i64,
    pub attestations: i64,
    pub missed_attestations: i64,

    pub block_rewards: Mutez,
    pub attestation_rewards: Mutez,

    /// Grace period the baker had before this cycle's activity extended it.
    /// Set at the following cycle's rollover; carries the revert datum for
    /// the extension.
    pub prior_grace_period: Option<CycleIndex>,
}

impl BakerCycle {
    pub fn new(cycle: CycleIndex, baker: AccountId, staking_balance: Mutez) -> Self {
        Self {
            cycle,
            baker,
            staking_balance,
            future_blocks: 0,
            blocks: 0,
            missed_blocks: 0,
            future_attestations: 0,
            attestations: 0,
            missed_attestations: 0,
            block_rewards: 0,
            attestation_rewards: 0,
            prior_grace_period: None,
        }
    }

    /// A baker was active in a cycle if it realized any right in it.
    pub fn is_active(&self) -> bool {
        self.blocks > 0 || self.attestations > 0
    }
}
