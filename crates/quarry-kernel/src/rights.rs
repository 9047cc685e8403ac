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

use crate::{AccountId, CycleIndex, Level};
use serde::{Deserialize, Serialize};

// BakingRight
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RightKind {
    /// The right to produce the block at `level` with the given priority.
    Baking { round: u32 },
    /// The right to attest the block at `level`, carrying this many
    /// committee slots.
    Attestation { slots: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RightStatus {
    /// The level has not been processed yet.
    Future,
    /// The right was exercised.
    Realized,
    /// The level passed and the right went unused.
    Missed,
}

/// One row per (cycle, level, baker, kind), produced by the sampler ahead of
/// time and resolved to `Realized`/`Missed` as the level is processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BakingRight {
    pub cycle: CycleIndex,
    pub level: Level,
    pub baker: AccountId,
    pub kind: RightKind,
    pub status: RightStatus,
}
