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

//! Consistency diagnostics. These never mutate anything: they cross-check
//! the materialized rows against each other (and optionally against the
//! node's own aggregates) and report every violation found. Full scans, so
//! intended for operators and tests rather than the per-block hot path.

use crate::store::{Store, StoreError};
use quarry_kernel::{AccountId, Level, Mutez, RawCheckpoint};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

const EVENT_TARGET: &str = "quarry::index::diagnostics";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Finding {
    #[error("account balances sum to {actual}, supply ledger says {expected}")]
    SupplyMismatch { expected: Mutez, actual: Mutez },

    #[error("frozen deposits sum to {actual}, ledger says {expected}")]
    FrozenMismatch { expected: Mutez, actual: Mutez },

    #[error(
        "baker {baker}: staking balance {staking} != own balance {own} + delegated {delegated}"
    )]
    StakingMismatch {
        baker: AccountId,
        staking: Mutez,
        own: Mutez,
        delegated: Mutez,
    },

    #[error("baker {baker}: delegated balance {recorded} != delegator balances {actual}")]
    DelegatedMismatch {
        baker: AccountId,
        recorded: Mutez,
        actual: Mutez,
    },

    #[error("block {level} does not link to its predecessor")]
    BrokenChain { level: Level },

    #[error("app state points at {expected} but the head block row is {actual:?}")]
    HeadMismatch {
        expected: Level,
        actual: Option<Level>,
    },

    #[error("checkpoint is for level {checkpoint}, head is {head}")]
    CheckpointLevelSkew { checkpoint: Level, head: Level },

    #[error("node reports supply {remote}, ledger says {local}")]
    CheckpointSupply { remote: Mutez, local: Mutez },

    #[error("node reports {remote} frozen, ledger says {local}")]
    CheckpointFrozen { remote: Mutez, local: Mutez },

    #[error("node reports {remote} operations, store holds {local}")]
    CheckpointOperations { remote: i64, local: i64 },
}

/// Cross-check the account population against the running supply ledger and
/// the staking relationships.
pub fn reconcile(store: &dyn Store) -> Result<Vec<Finding>, StoreError> {
    let mut findings = Vec::new();

    let Some(state) = store.app_state()? else {
        return Ok(findings);
    };
    let Some(statistics) = store.statistics_at(state.level)? else {
        return Ok(findings);
    };

    let accounts = store.accounts()?;

    let balances: Mutez = accounts.iter().map(|account| account.balance).sum();
    if balances != statistics.total_supply() {
        findings.push(Finding::SupplyMismatch {
            expected: statistics.total_supply(),
            actual: balances,
        });
    }

    let frozen: Mutez = accounts
        .iter()
        .filter_map(|account| account.baker.as_ref())
        .map(|baker| baker.frozen_deposit)
        .sum();
    if frozen != statistics.total_frozen {
        findings.push(Finding::FrozenMismatch {
            expected: statistics.total_frozen,
            actual: frozen,
        });
    }

    // Externally delegated value per baker, recomputed from the delegators.
    let mut delegated: BTreeMap<AccountId, Mutez> = BTreeMap::new();
    for account in &accounts {
        if let Some(delegate) = account.delegate {
            if delegate != account.id {
                *delegated.entry(delegate).or_default() += account.balance;
            }
        }
    }

    for account in &accounts {
        let Some(baker) = account.baker.as_ref() else {
            continue;
        };
        let actual = delegated.get(&account.id).copied().unwrap_or_default();
        if baker.delegated_balance != actual {
            findings.push(Finding::DelegatedMismatch {
                baker: account.id,
                recorded: baker.delegated_balance,
                actual,
            });
        }
        if baker.staking_balance != account.balance + baker.delegated_balance {
            findings.push(Finding::StakingMismatch {
                baker: account.id,
                staking: baker.staking_balance,
                own: account.balance,
                delegated: baker.delegated_balance,
            });
        }
    }

    report(&findings);
    Ok(findings)
}

/// Walk the block rows and verify the hash chain plus the head pointer.
pub fn verify_chain(store: &dyn Store) -> Result<Vec<Finding>, StoreError> {
    let mut findings = Vec::new();

    let Some(state) = store.app_state()? else {
        return Ok(findings);
    };
    if state.level < 0 {
        return Ok(findings);
    }

    let head = store.block_at(state.level)?;
    if head.as_ref().map(|block| block.hash) != Some(state.hash) {
        findings.push(Finding::HeadMismatch {
            expected: state.level,
            actual: head.as_ref().map(|block| block.level),
        });
    }

    let mut previous = store.block_at(0)?;
    for level in 1..=state.level {
        let block = store.block_at(level)?;
        match (&previous, &block) {
            (Some(parent), Some(child)) if child.predecessor == parent.hash => {}
            _ => findings.push(Finding::BrokenChain { level }),
        }
        previous = block;
    }

    report(&findings);
    Ok(findings)
}

/// Compare local aggregates against the node's own view of the same level.
pub fn verify_checkpoint(
    store: &dyn Store,
    checkpoint: &RawCheckpoint,
) -> Result<Vec<Finding>, StoreError> {
    let mut findings = Vec::new();

    let Some(state) = store.app_state()? else {
        return Ok(findings);
    };
    if checkpoint.level != state.level {
        findings.push(Finding::CheckpointLevelSkew {
            checkpoint: checkpoint.level,
            head: state.level,
        });
        report(&findings);
        return Ok(findings);
    }
    let Some(statistics) = store.statistics_at(state.level)? else {
        return Ok(findings);
    };

    if checkpoint.total_supply != statistics.total_supply() {
        findings.push(Finding::CheckpointSupply {
            remote: checkpoint.total_supply,
            local: statistics.total_supply(),
        });
    }
    if checkpoint.total_frozen != statistics.total_frozen {
        findings.push(Finding::CheckpointFrozen {
            remote: checkpoint.total_frozen,
            local: statistics.total_frozen,
        });
    }
    let local_operations = store.operations_count()?;
    if checkpoint.operations_count != local_operations {
        findings.push(Finding::CheckpointOperations {
            remote: checkpoint.operations_count,
            local: local_operations,
        });
    }

    report(&findings);
    Ok(findings)
}

fn report(findings: &[Finding]) {
    for finding in findings {
        warn!(target: EVENT_TARGET, %finding, "diagnostics.finding");
    }
}
