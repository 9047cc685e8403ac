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

use crate::{AccountId, BlockHash, Level, Mutez, OperationKind, ProtocolHash};
use serde::{Deserialize, Serialize};

// Block
// ----------------------------------------------------------------------------

/// One materialized block row. Immutable once several levels deep; the most
/// recent row is deleted during a revert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub level: Level,
    pub hash: BlockHash,
    pub predecessor: BlockHash,
    pub timestamp: u64,
    pub protocol: ProtocolHash,
    pub proposer: AccountId,
    pub reward: Mutez,
    pub fees: Mutez,

    /// Net change to the proposer's frozen deposit carried by this block's
    /// freezer records. Persisted so a revert can undo it without the raw
    /// block.
    pub frozen_change: Mutez,

    /// Which operation kinds this block contains; lets a revert skip commits
    /// whose kind never appeared in the block.
    pub operations: OperationKinds,
}

// OperationKinds
// ----------------------------------------------------------------------------

/// A bitmask over [`OperationKind`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationKinds(u32);

impl OperationKinds {
    pub fn none() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, kind: OperationKind) {
        self.0 |= 1 << kind as u32;
    }

    pub fn contains(&self, kind: OperationKind) -> bool {
        self.0 & (1 << kind as u32) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<OperationKind> for OperationKinds {
    fn from_iter<T: IntoIterator<Item = OperationKind>>(iter: T) -> Self {
        let mut kinds = Self::none();
        for kind in iter {
            kinds.insert(kind);
        }
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_tracks_kinds() {
        let mut kinds = OperationKinds::none();
        assert!(kinds.is_empty());
        kinds.insert(OperationKind::Transaction);
        kinds.insert(OperationKind::DoubleBaking);
        assert!(kinds.contains(OperationKind::Transaction));
        assert!(kinds.contains(OperationKind::DoubleBaking));
        assert!(!kinds.contains(OperationKind::Delegation));
    }
}
