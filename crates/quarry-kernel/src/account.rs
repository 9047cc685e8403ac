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

use crate::{Address, CycleIndex, Level, Mutez};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type AccountId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountKind {
    User,
    Baker,
    Contract,
    Rollup,
}

// Account
// ----------------------------------------------------------------------------

/// One indexed account. All variants share identity and spendable balance;
/// bakers additionally carry the staking sub-state. A `User` account is
/// promoted to `Baker` when it self-delegates, and the promotion is never
/// undone (deactivation is a flag, not a demotion), matching how the chain
/// itself treats baker registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub address: Address,
    pub kind: AccountKind,

    /// Spendable balance. Must never go negative; a violation is a fatal
    /// consistency error, not a recoverable one.
    pub balance: Mutez,

    /// The baker this account delegates to, if any. A baker delegates to
    /// itself.
    pub delegate: Option<AccountId>,

    pub operations_count: i64,
    pub first_level: Level,
    pub last_level: Level,

    /// Present iff `kind == Baker`.
    pub baker: Option<BakerState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BakerState {
    /// Own balance plus everything delegated to this baker. The sampler
    /// weighs bakers by this value.
    pub staking_balance: Mutez,

    /// The externally delegated share of `staking_balance`. Invariant:
    /// `staking_balance >= delegated_balance`.
    pub delegated_balance: Mutez,

    /// Security deposit locked while baking; slashable.
    pub frozen_deposit: Mutez,

    /// Last cycle of the activity grace window. A baker still inactive past
    /// this cycle is deactivated at the next cycle rollover.
    pub grace_period: CycleIndex,

    pub delegators_count: i64,
    pub deactivated: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BalanceError {
    #[error("balance of {address} would drop to {result} (delta {delta})")]
    NegativeBalance {
        address: Address,
        result: Mutez,
        delta: Mutez,
    },
    #[error("frozen deposit of {address} would drop to {result} (delta {delta})")]
    NegativeFrozen {
        address: Address,
        result: Mutez,
        delta: Mutez,
    },
    #[error("staking balance of {address} would drop below its delegated balance ({staking} < {delegated})")]
    StakingBelowDelegated {
        address: Address,
        staking: Mutez,
        delegated: Mutez,
    },
    #[error("account {address} is not a baker")]
    NotABaker { address: Address },
}

impl Account {
    pub fn new(id: AccountId, address: Address, kind: AccountKind, level: Level) -> Self {
        Self {
            id,
            address,
            kind,
            balance: 0,
            delegate: None,
            operations_count: 0,
            first_level: level,
            last_level: level,
            baker: None,
        }
    }

    /// Apply a signed balance delta, refusing to let the balance go
    /// negative. Both apply and revert paths go through here, so reverts get
    /// the same protection.
    pub fn adjust_balance(&mut self, delta: Mutez) -> Result<(), BalanceError> {
        let result = self.balance + delta;
        if result < 0 {
            return Err(BalanceError::NegativeBalance {
                address: self.address.clone(),
                result,
                delta,
            });
        }
        self.balance = result;
        Ok(())
    }

    pub fn is_baker(&self) -> bool {
        self.baker.is_some()
    }

    pub fn baker_mut(&mut self) -> Result<&mut BakerState, BalanceError> {
        let address = self.address.clone();
        self.baker
            .as_mut()
            .ok_or(BalanceError::NotABaker { address })
    }

    /// Promote a user account into a baker (self-delegation). Idempotent on
    /// an existing baker.
    pub fn promote_to_baker(&mut self, grace_period: CycleIndex) {
        if self.baker.is_none() {
            self.kind = AccountKind::Baker;
            self.delegate = Some(self.id);
            self.baker = Some(BakerState {
                staking_balance: self.balance,
                delegated_balance: 0,
                frozen_deposit: 0,
                grace_period,
                delegators_count: 0,
                deactivated: false,
            });
        }
    }
}

impl BakerState {
    /// Move the staking balance by `delta`, keeping the
    /// `staking >= delegated` invariant. `delegated` says whether the moved
    /// value belongs to a delegator (in which case both totals move).
    pub fn adjust_staking(
        &mut self,
        address: &Address,
        delta: Mutez,
        delegated: bool,
    ) -> Result<(), BalanceError> {
        let staking = self.staking_balance + delta;
        let delegated_balance = if delegated {
            self.delegated_balance + delta
        } else {
            self.delegated_balance
        };
        if staking < delegated_balance || delegated_balance < 0 {
            return Err(BalanceError::StakingBelowDelegated {
                address: address.clone(),
                staking,
                delegated: delegated_balance,
            });
        }
        self.staking_balance = staking;
        self.delegated_balance = delegated_balance;
        Ok(())
    }

    pub fn adjust_frozen(&mut self, address: &Address, delta: Mutez) -> Result<(), BalanceError> {
        let result = self.frozen_deposit + delta;
        if result < 0 {
            return Err(BalanceError::NegativeFrozen {
                address: address.clone(),
                result,
                delta,
            });
        }
        self.frozen_deposit = result;
        Ok(())
    }
}
