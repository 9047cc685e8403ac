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

use crate::{Level, Mutez};
use serde::{Deserialize, Serialize};

// Statistics
// ----------------------------------------------------------------------------

/// Running supply-level ledger, one row per level. The four privileged
/// categories are the only channels through which value enters or leaves the
/// indexed account population; everything else must net to zero inside a
/// block (see the accounting discipline in the commit pipeline).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub level: Level,

    /// Value present in genesis balances.
    pub total_bootstrapped: Mutez,

    /// Value entering through commitment activations.
    pub total_activated: Mutez,

    /// Value minted as rewards.
    pub total_created: Mutez,

    /// Value destroyed (origination burns, slashing remainders).
    pub total_burned: Mutez,

    /// Value locked in baker security deposits. Not part of the supply
    /// equation; tracked for diagnostics against the node.
    pub total_frozen: Mutez,
}

impl Statistics {
    pub fn pre_genesis() -> Self {
        Self {
            level: -1,
            total_bootstrapped: 0,
            total_activated: 0,
            total_created: 0,
            total_burned: 0,
            total_frozen: 0,
        }
    }

    /// Carry the running totals into the next level's row.
    pub fn carried_to(&self, level: Level) -> Self {
        Self { level, ..*self }
    }

    /// The supply that must equal the sum of all account balances.
    pub fn total_supply(&self) -> Mutez {
        self.total_bootstrapped + self.total_activated + self.total_created - self.total_burned
    }
}
