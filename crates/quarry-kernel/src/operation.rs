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

use crate::{AccountId, Address, CycleIndex, Level, Mutez, OperationHash};
use serde::{Deserialize, Serialize};

pub type OperationId = i64;

// OperationKind
// ----------------------------------------------------------------------------

/// Discriminant used for dispatching commits and for the per-block kind
/// bitmask. The enum value is the bit position; do not reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum OperationKind {
    Transaction = 0,
    Delegation = 1,
    Origination = 2,
    DoubleBaking = 3,
    NonceRevelation = 4,
    Attestation = 5,
    Activation = 6,
}

// Operation rows
// ----------------------------------------------------------------------------
//
// Each row must carry enough to exactly undo its balance/counter/relationship
// effects from the stored fields alone; reverting never re-fetches the raw
// node response.

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOp {
    pub id: OperationId,
    pub level: Level,
    pub hash: OperationHash,
    pub sender: AccountId,
    pub target: AccountId,
    pub amount: Mutez,
    pub fee: Mutez,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationOp {
    pub id: OperationId,
    pub level: Level,
    pub hash: OperationHash,
    pub sender: AccountId,
    pub prev_delegate: Option<AccountId>,
    pub new_delegate: Option<AccountId>,
    pub fee: Mutez,

    /// The sender's balance at the time the delegation moved; this is the
    /// amount that changed hands between the two bakers' staking balances
    /// and is required to invert the move exactly.
    pub staked_amount: Mutez,

    /// Baker-state fields of the sender before a self-delegation promoted it,
    /// `None` when the sender already was a baker (or never became one).
    /// Needed to undo the promotion exactly.
    pub prev_grace_period: Option<CycleIndex>,
    pub prev_deactivated: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginationOp {
    pub id: OperationId,
    pub level: Level,
    pub hash: OperationHash,
    pub sender: AccountId,
    pub contract: AccountId,
    pub contract_address: Address,
    pub balance: Mutez,
    pub fee: Mutez,
    pub burn: Mutez,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoubleBakingOp {
    pub id: OperationId,
    pub level: Level,
    pub hash: OperationHash,
    pub accuser: AccountId,
    pub offender: AccountId,

    /// Credited to the accuser.
    pub reward: Mutez,

    /// Removed from the offender's frozen deposit and staking balance. The
    /// difference `lost_staked - reward` is burned.
    pub lost_staked: Mutez,

    /// True when the raw evidence carried no freezer update and the offender
    /// was attributed to the block proposer instead. Known best-effort
    /// fallback; see the double-baking commit.
    pub offender_fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceRevelationOp {
    pub id: OperationId,
    pub level: Level,
    pub hash: OperationHash,
    pub baker: AccountId,
    pub revealed_level: Level,
    pub revealed_cycle: CycleIndex,
    pub nonce: Vec<u8>,
    pub reward: Mutez,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationOp {
    pub id: OperationId,
    pub level: Level,
    pub hash: OperationHash,
    pub baker: AccountId,
    pub slots: u32,
    pub reward: Mutez,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationOp {
    pub id: OperationId,
    pub level: Level,
    pub hash: OperationHash,
    pub account: AccountId,
    pub amount: Mutez,
}

// Operation
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Transaction(TransactionOp),
    Delegation(DelegationOp),
    Origination(OriginationOp),
    DoubleBaking(DoubleBakingOp),
    NonceRevelation(NonceRevelationOp),
    Attestation(AttestationOp),
    Activation(ActivationOp),
}

impl Operation {
    pub fn id(&self) -> OperationId {
        match self {
            Operation::Transaction(op) => op.id,
            Operation::Delegation(op) => op.id,
            Operation::Origination(op) => op.id,
            Operation::DoubleBaking(op) => op.id,
            Operation::NonceRevelation(op) => op.id,
            Operation::Attestation(op) => op.id,
            Operation::Activation(op) => op.id,
        }
    }

    pub fn level(&self) -> Level {
        match self {
            Operation::Transaction(op) => op.level,
            Operation::Delegation(op) => op.level,
            Operation::Origination(op) => op.level,
            Operation::DoubleBaking(op) => op.level,
            Operation::NonceRevelation(op) => op.level,
            Operation::Attestation(op) => op.level,
            Operation::Activation(op) => op.level,
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Transaction(_) => OperationKind::Transaction,
            Operation::Delegation(_) => OperationKind::Delegation,
            Operation::Origination(_) => OperationKind::Origination,
            Operation::DoubleBaking(_) => OperationKind::DoubleBaking,
            Operation::NonceRevelation(_) => OperationKind::NonceRevelation,
            Operation::Attestation(_) => OperationKind::Attestation,
            Operation::Activation(_) => OperationKind::Activation,
        }
    }
}
