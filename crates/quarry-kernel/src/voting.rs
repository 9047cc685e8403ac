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

use crate::{AccountId, Level, Mutez};
use serde::{Deserialize, Serialize};

// VotingPeriod
// ----------------------------------------------------------------------------

/// One governance period, with the voting power distribution frozen at its
/// first level. Power comes from the same stake snapshot the rights sampler
/// consumes, so ballots and baking rights agree on who counts. Deleted only
/// when the block that opened the period is reverted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingPeriod {
    pub index: i32,

    /// Governance epoch this period belongs to.
    pub epoch: i32,

    pub first_level: Level,

    /// Sum of all voters' power at the period's first level.
    pub total_power: Mutez,

    /// Eligible voters in snapshot order.
    pub voters: Vec<VoterPower>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterPower {
    pub baker: AccountId,
    pub power: Mutez,
}

impl VotingPeriod {
    pub fn total_voters(&self) -> i64 {
        self.voters.len() as i64
    }
}
