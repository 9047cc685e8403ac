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

//! The node's native JSON documents, as fetched over the wire. These are
//! *inputs* to the commit pipeline and are never stored: every materialized
//! row must be revertible without them.

use crate::{Address, BlockHash, Level, Mutez, OperationHash, ProtocolHash};
use serde::{Deserialize, Serialize};

// Headers
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawHeader {
    pub level: Level,
    pub hash: BlockHash,
    pub predecessor: BlockHash,
    pub timestamp: u64,
}

// Blocks
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBlock {
    pub header: RawHeader,
    pub protocol: ProtocolHash,
    pub next_protocol: ProtocolHash,

    /// Address of the baker that produced this block.
    pub proposer: Address,

    pub reward: Mutez,
    pub fees: Mutez,

    #[serde(default)]
    pub operations: Vec<RawOperation>,

    /// Freezer balance-update records attached to the block by the node.
    /// Consulted by slashing commits to attribute offenders.
    #[serde(default)]
    pub freezer_updates: Vec<RawFreezerUpdate>,

    /// Verifiable-delay-function output carried by cycle-boundary blocks
    /// under protocol epochs that fold one into the seed. Absent elsewhere.
    #[serde(default, with = "opt_hex_bytes")]
    pub vdf: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFreezerUpdate {
    pub delegate: Address,
    pub change: Mutez,
}

// Operations
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawOperation {
    Transaction {
        hash: OperationHash,
        source: Address,
        destination: Address,
        amount: Mutez,
        fee: Mutez,
    },
    Delegation {
        hash: OperationHash,
        source: Address,
        delegate: Option<Address>,
        fee: Mutez,
    },
    Origination {
        hash: OperationHash,
        source: Address,
        contract: Address,
        balance: Mutez,
        fee: Mutez,
    },
    DoubleBakingEvidence {
        hash: OperationHash,
        /// The offender, when the node attached a freezer update naming one.
        offender: Option<Address>,
        reward: Mutez,
        lost_staked: Mutez,
    },
    NonceRevelation {
        hash: OperationHash,
        source: Address,
        revealed_level: Level,
        #[serde(with = "hex_bytes")]
        nonce: Vec<u8>,
        reward: Mutez,
    },
    Attestation {
        hash: OperationHash,
        source: Address,
        slots: u32,
    },
    Activation {
        hash: OperationHash,
        account: Address,
        amount: Mutez,
    },
}

impl RawOperation {
    pub fn hash(&self) -> &OperationHash {
        match self {
            RawOperation::Transaction { hash, .. }
            | RawOperation::Delegation { hash, .. }
            | RawOperation::Origination { hash, .. }
            | RawOperation::DoubleBakingEvidence { hash, .. }
            | RawOperation::NonceRevelation { hash, .. }
            | RawOperation::Attestation { hash, .. }
            | RawOperation::Activation { hash, .. } => hash,
        }
    }
}

// Checkpoints
// ----------------------------------------------------------------------------

/// The node's own view of selected aggregates at a level, fetched by the
/// consistency diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCheckpoint {
    pub level: Level,
    pub total_supply: Mutez,
    pub total_frozen: Mutez,
    pub operations_count: i64,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

mod opt_hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let s: Option<String> = Option::deserialize(deserializer)?;
        s.map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
