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

use crate::{BlockHash, Level, ProtocolHash};
use serde::{Deserialize, Serialize};

// AppState
// ----------------------------------------------------------------------------

/// The singleton "where are we" record. Overwritten exactly once per applied
/// or reverted block, never deleted. Its level always refers to an existing
/// block row, or -1 before genesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppState {
    pub level: Level,
    pub hash: BlockHash,
    pub timestamp: u64,

    /// Protocol the head block was baked under.
    pub protocol: ProtocolHash,

    /// Protocol announced for the next block; differs from `protocol` only
    /// across an upgrade boundary.
    pub next_protocol: ProtocolHash,

    pub voting_epoch: i32,
    pub voting_period: i32,

    /// Monotonic counters minting surrogate identifiers. Never reused, even
    /// across reverts, so identifiers stay stable for downstream consumers.
    pub account_counter: i64,
    pub operation_counter: i64,
}

impl AppState {
    pub fn pre_genesis() -> Self {
        Self {
            level: -1,
            hash: BlockHash::zero(),
            timestamp: 0,
            protocol: ProtocolHash::zero(),
            next_protocol: ProtocolHash::zero(),
            voting_epoch: 0,
            voting_period: 0,
            account_counter: 0,
            operation_counter: 0,
        }
    }

    pub fn next_account_id(&mut self) -> i64 {
        self.account_counter += 1;
        self.account_counter
    }

    pub fn next_operation_id(&mut self) -> i64 {
        self.operation_counter += 1;
        self.operation_counter
    }
}
