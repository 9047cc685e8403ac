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

//! Shared data model of the indexer: primitive identifiers, the materialized
//! entity rows owned by the synchronization engine, and the raw JSON
//! documents the remote node serves.

pub mod account;
pub mod address;
pub mod app_state;
pub mod block;
pub mod cycle;
pub mod hash;
pub mod mutez;
pub mod operation;
pub mod protocol_parameters;
pub mod raw;
pub mod rights;
pub mod statistics;
pub mod voting;

#[cfg(any(test, feature = "test-utils"))]
pub mod generators;

pub use account::{Account, AccountId, AccountKind, BakerState, BalanceError};
pub use address::{Address, AddressKind};
pub use app_state::AppState;
pub use block::{Block, OperationKinds};
pub use cycle::{BakerCycle, Cycle};
pub use hash::{BlockHash, Hash, HashParseError, Hasher, OperationHash, ProtocolHash, Seed};
pub use mutez::{Mutez, ONE_COIN};
pub use operation::{
    ActivationOp, AttestationOp, DelegationOp, DoubleBakingOp, NonceRevelationOp, Operation,
    OperationId, OperationKind, OriginationOp, TransactionOp,
};
pub use protocol_parameters::ProtocolParameters;
pub use raw::{RawBlock, RawCheckpoint, RawFreezerUpdate, RawHeader, RawOperation};
pub use rights::{BakingRight, RightKind, RightStatus};
pub use statistics::Statistics;
pub use voting::{VoterPower, VotingPeriod};

/// Block height. Signed so that "-1 before genesis" is representable in
/// `AppState`.
pub type Level = i64;

/// Index of a baking cycle.
pub type CycleIndex = i64;
