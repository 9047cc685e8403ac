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

//! End-to-end scenarios over a scripted chain: linear synchronization, a
//! one-block fork, slashing, and exact apply/revert round trips. Everything
//! runs against the in-memory store with the small test parameters
//! (8 levels per cycle, 2 preserved cycles).

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use quarry_index::{
    diagnostics, ChainHead, Pipeline, StagingCache, Store, SyncConfig, SyncError, SyncLoop,
};
use quarry_kernel::{
    Account, Address, AppState, BakerCycle, BakingRight, Block, BlockHash, Cycle, Hasher, Level,
    Mutez, Operation, OperationHash, ProtocolHash, ProtocolParameters, RawBlock, RawCheckpoint,
    RawHeader, RawOperation, RightKind, RightStatus, Statistics, VoterPower, VotingPeriod,
};
use quarry_node::fake::{block_id, FakeChain};
use quarry_stores::MemoryStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

const ALICE: &str = "tz1alice";
const BOB: &str = "tz1bob";
const CAROL: &str = "tz1carol";

fn proto() -> ProtocolHash {
    Hasher::hash(b"proto/alpha")
}

fn op_hash(tag: &[u8]) -> OperationHash {
    Hasher::hash(tag)
}

fn operation_fee(operation: &RawOperation) -> Mutez {
    match operation {
        RawOperation::Transaction { fee, .. }
        | RawOperation::Delegation { fee, .. }
        | RawOperation::Origination { fee, .. } => *fee,
        _ => 0,
    }
}

/// A block whose header fees match its operations and whose hash is derived
/// from (level, salt), so forks are just a different salt.
fn block(
    level: Level,
    predecessor: BlockHash,
    salt: &[u8],
    proposer: &str,
    operations: Vec<RawOperation>,
) -> RawBlock {
    let params = ProtocolParameters::for_tests();
    let fees = operations.iter().map(operation_fee).sum();
    RawBlock {
        header: RawHeader {
            level,
            hash: block_id(level, salt),
            predecessor,
            timestamp: 1_700_000_000 + level as u64 * 15,
        },
        protocol: proto(),
        next_protocol: proto(),
        proposer: Address::new(proposer),
        reward: if level == 0 { 0 } else { params.block_reward },
        fees,
        operations,
        freezer_updates: vec![],
        vdf: None,
    }
}

fn genesis() -> RawBlock {
    block(
        0,
        BlockHash::zero(),
        b"main",
        ALICE,
        vec![RawOperation::Activation {
            hash: op_hash(b"activate/alice"),
            account: Address::new(ALICE),
            amount: 1_000_000,
        }],
    )
}

/// Genesis plus `levels` empty blocks, all proposed by the genesis baker.
fn linear_chain(levels: Level) -> Vec<RawBlock> {
    let mut blocks = vec![genesis()];
    for level in 1..=levels {
        let predecessor = blocks[(level - 1) as usize].header.hash;
        blocks.push(block(level, predecessor, b"main", ALICE, vec![]));
    }
    blocks
}

// Engine: the pipeline driven directly, no sync loop in between.
// ----------------------------------------------------------------------------

struct Engine {
    store: MemoryStore,
    cache: StagingCache,
    pipeline: Pipeline,
}

impl Engine {
    fn new() -> Self {
        Self {
            store: MemoryStore::new(),
            cache: StagingCache::new(128),
            pipeline: Pipeline::new(ProtocolParameters::for_tests()),
        }
    }

    fn apply(&mut self, raw: &RawBlock) {
        self.pipeline
            .commit_block(&self.store, &mut self.cache, raw)
            .unwrap();
    }

    fn revert(&mut self) -> Level {
        self.pipeline
            .revert_last_block(&self.store, &mut self.cache)
            .unwrap()
    }

    fn account(&self, address: &str) -> Account {
        self.store
            .account_by_address(&Address::new(address))
            .unwrap()
            .unwrap()
    }

    fn statistics(&self, level: Level) -> Statistics {
        self.store.statistics_at(level).unwrap().unwrap()
    }

    fn assert_consistent(&self) {
        assert_eq!(diagnostics::reconcile(&self.store).unwrap(), vec![]);
        assert_eq!(diagnostics::verify_chain(&self.store).unwrap(), vec![]);
    }
}

async fn wait_for_head(
    rx: &mut watch::Receiver<Option<ChainHead>>,
    level: Level,
    hash: BlockHash,
) {
    loop {
        if rx
            .borrow_and_update()
            .as_ref()
            .is_some_and(|head| head.level == level && head.hash == hash)
        {
            return;
        }
        rx.changed().await.unwrap();
    }
}

// Linear synchronization
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn linear_sync_reaches_the_remote_head() {
    let chain = FakeChain::new();
    chain.push_all(linear_chain(100));
    // The node agrees at the head, so the periodic cross-check stays quiet.
    chain.set_checkpoint(RawCheckpoint {
        level: 100,
        total_supply: 1_000_000 + 100 * 1_000,
        total_frozen: 0,
        operations_count: 1,
    });

    let store = Arc::new(MemoryStore::new());
    let cancel = CancellationToken::new();
    let (sync, mut head_rx) = SyncLoop::new(
        chain.clone(),
        store.clone(),
        Pipeline::new(ProtocolParameters::for_tests()),
        StagingCache::new(256),
        SyncConfig {
            checkpoint_every: 1,
            ..SyncConfig::default()
        },
        cancel.clone(),
    );
    let loop_handle = tokio::spawn(sync.run());

    wait_for_head(&mut head_rx, 100, block_id(100, b"main")).await;
    cancel.cancel();
    loop_handle.await.unwrap().unwrap();

    assert_eq!(store.blocks_len(), 101);
    let state = store.app_state().unwrap().unwrap();
    assert_eq!(state.level, 100);
    assert_eq!(state.hash, block_id(100, b"main"));

    // One bootstrapped activation, one minted reward per non-genesis block.
    let statistics = store.statistics_at(100).unwrap().unwrap();
    assert_eq!(statistics.total_supply(), 1_000_000 + 100 * 1_000);
    assert_eq!(statistics.total_frozen, 0);

    assert_eq!(diagnostics::reconcile(store.as_ref()).unwrap(), vec![]);
    assert_eq!(diagnostics::verify_chain(store.as_ref()).unwrap(), vec![]);
}

#[tokio::test(start_paused = true)]
async fn one_block_fork_rebases_and_reapplies() {
    let chain = FakeChain::new();
    let main = linear_chain(50);
    chain.push_all(main.clone());

    let store = Arc::new(MemoryStore::new());
    let cancel = CancellationToken::new();
    let (sync, mut head_rx) = SyncLoop::new(
        chain.clone(),
        store.clone(),
        Pipeline::new(ProtocolParameters::for_tests()),
        StagingCache::new(256),
        SyncConfig::default(),
        cancel.clone(),
    );
    let loop_handle = tokio::spawn(sync.run());

    wait_for_head(&mut head_rx, 50, block_id(50, b"main")).await;

    // The node switches to a branch that replaces the tip block.
    chain.truncate(50);
    let fork_50 = block(50, main[49].header.hash, b"fork", BOB, vec![]);
    let fork_51 = block(51, fork_50.header.hash, b"fork", BOB, vec![]);
    chain.push(fork_50);
    chain.push(fork_51);

    wait_for_head(&mut head_rx, 51, block_id(51, b"fork")).await;
    cancel.cancel();
    loop_handle.await.unwrap().unwrap();

    // Exactly one row per level, and level 50 now carries the fork block.
    assert_eq!(store.blocks_len(), 52);
    assert_eq!(
        store.block_at(50).unwrap().unwrap().hash,
        block_id(50, b"fork")
    );
    assert_eq!(
        store.block_at(51).unwrap().unwrap().predecessor,
        block_id(50, b"fork")
    );

    assert_eq!(diagnostics::reconcile(store.as_ref()).unwrap(), vec![]);
    assert_eq!(diagnostics::verify_chain(store.as_ref()).unwrap(), vec![]);
}

#[tokio::test(start_paused = true)]
async fn an_equal_length_branch_switch_is_detected() {
    let chain = FakeChain::new();
    let main = linear_chain(2);
    chain.push_all(main.clone());

    let store = Arc::new(MemoryStore::new());
    let cancel = CancellationToken::new();
    let (sync, mut head_rx) = SyncLoop::new(
        chain.clone(),
        store.clone(),
        Pipeline::new(ProtocolParameters::for_tests()),
        StagingCache::new(256),
        SyncConfig::default(),
        cancel.clone(),
    );
    let loop_handle = tokio::spawn(sync.run());

    wait_for_head(&mut head_rx, 2, block_id(2, b"main")).await;

    // The node replaces its tip with a same-height block: the head level
    // never moves, only the hash does.
    chain.push(block(2, main[1].header.hash, b"fork", BOB, vec![]));

    wait_for_head(&mut head_rx, 2, block_id(2, b"fork")).await;
    cancel.cancel();
    loop_handle.await.unwrap().unwrap();

    assert_eq!(store.blocks_len(), 3);
    assert_eq!(
        store.block_at(2).unwrap().unwrap().hash,
        block_id(2, b"fork")
    );
    assert_eq!(diagnostics::reconcile(store.as_ref()).unwrap(), vec![]);
    assert_eq!(diagnostics::verify_chain(store.as_ref()).unwrap(), vec![]);
}

#[tokio::test(start_paused = true)]
async fn a_lagging_node_is_waited_out_not_unwound() {
    let chain = FakeChain::new();
    let main = linear_chain(7);
    chain.push_all(main[..=5].to_vec());

    let store = Arc::new(MemoryStore::new());
    let cancel = CancellationToken::new();
    let (sync, mut head_rx) = SyncLoop::new(
        chain.clone(),
        store.clone(),
        Pipeline::new(ProtocolParameters::for_tests()),
        StagingCache::new(256),
        SyncConfig::default(),
        cancel.clone(),
    );
    let loop_handle = tokio::spawn(sync.run());

    wait_for_head(&mut head_rx, 5, block_id(5, b"main")).await;

    // The node restarts from an older state on the same branch.
    chain.truncate(3);
    tokio::time::sleep(Duration::from_secs(600)).await;

    // Nothing was reverted while the node lagged behind us.
    assert_eq!(store.app_state().unwrap().unwrap().level, 5);
    assert_eq!(store.blocks_len(), 6);

    // Once the node passes us again, syncing resumes where it left off.
    chain.push_all(main[3..].to_vec());
    wait_for_head(&mut head_rx, 7, block_id(7, b"main")).await;
    cancel.cancel();
    loop_handle.await.unwrap().unwrap();

    assert_eq!(store.blocks_len(), 8);
    assert_eq!(diagnostics::reconcile(store.as_ref()).unwrap(), vec![]);
    assert_eq!(diagnostics::verify_chain(store.as_ref()).unwrap(), vec![]);
}

#[tokio::test(start_paused = true)]
async fn a_divergent_checkpoint_halts_synchronization() {
    let chain = FakeChain::new();
    chain.push_all(linear_chain(3));
    // The node's own ledger disagrees about the supply at level 3.
    chain.set_checkpoint(RawCheckpoint {
        level: 3,
        total_supply: 999,
        total_frozen: 0,
        operations_count: 1,
    });

    let store = Arc::new(MemoryStore::new());
    let (sync, _head_rx) = SyncLoop::new(
        chain.clone(),
        store.clone(),
        Pipeline::new(ProtocolParameters::for_tests()),
        StagingCache::new(256),
        SyncConfig {
            checkpoint_every: 1,
            ..SyncConfig::default()
        },
        CancellationToken::new(),
    );

    let err = sync.run().await.unwrap_err();
    assert!(matches!(err, SyncError::Diverged(_)), "got {err:?}");
    // The offending block itself had landed; nothing beyond it did.
    assert_eq!(store.app_state().unwrap().unwrap().level, 3);
}

// Slashing
// ----------------------------------------------------------------------------

#[test]
fn double_baking_slashes_and_reverts_exactly() {
    let mut engine = Engine::new();

    let b0 = genesis();
    let b1 = block(1, b0.header.hash, b"main", ALICE, vec![]);
    // Bob bakes once and locks a deposit through the block's freezer records.
    let mut b2 = block(2, b1.header.hash, b"main", BOB, vec![]);
    b2.freezer_updates = vec![quarry_kernel::RawFreezerUpdate {
        delegate: Address::new(BOB),
        change: 400,
    }];
    let b3 = block(
        3,
        b2.header.hash,
        b"main",
        ALICE,
        vec![RawOperation::DoubleBakingEvidence {
            hash: op_hash(b"evidence/bob"),
            offender: Some(Address::new(BOB)),
            reward: 100,
            lost_staked: 400,
        }],
    );

    for raw in [&b0, &b1, &b2, &b3] {
        engine.apply(raw);
    }

    // The accuser pockets 100, the offender forfeits 400, 300 is burned.
    let alice = engine.account(ALICE);
    assert_eq!(alice.balance, 1_000_000 + 2 * 1_000 + 100);

    let bob = engine.account(BOB);
    let bob_baker = bob.baker.as_ref().unwrap();
    assert_eq!(bob.balance, 600);
    assert_eq!(bob_baker.frozen_deposit, 0);
    assert_eq!(bob_baker.staking_balance, 600);

    let statistics = engine.statistics(3);
    assert_eq!(statistics.total_burned, 300);
    assert_eq!(statistics.total_created, 3_000);
    assert_eq!(statistics.total_frozen, 0);
    assert_eq!(statistics.total_supply(), 1_002_700);

    let operations = engine.store.operations_at(3).unwrap();
    let [Operation::DoubleBaking(op)] = operations.as_slice() else {
        panic!("expected a single double-baking row, got {operations:?}");
    };
    assert_eq!(op.reward, 100);
    assert_eq!(op.lost_staked, 400);
    assert!(!op.offender_fallback);
    engine.assert_consistent();

    // Reverting the evidence block restores everything.
    assert_eq!(engine.revert(), 2);

    let alice = engine.account(ALICE);
    assert_eq!(alice.balance, 1_000_000 + 2 * 1_000);

    let bob = engine.account(BOB);
    let bob_baker = bob.baker.as_ref().unwrap();
    assert_eq!(bob.balance, 1_000);
    assert_eq!(bob_baker.frozen_deposit, 400);
    assert_eq!(bob_baker.staking_balance, 1_000);

    let statistics = engine.statistics(2);
    assert_eq!(statistics.total_burned, 0);
    assert_eq!(statistics.total_frozen, 400);
    assert_eq!(engine.store.operations_count().unwrap(), 1);
    engine.assert_consistent();
}

// Apply/revert symmetry
// ----------------------------------------------------------------------------

/// Everything the store holds, over ranges wide enough for the scenarios.
/// Surrogate id counters advance monotonically across reverts and
/// `last_level` retreats only approximately, so both are masked.
#[derive(Debug, PartialEq)]
struct StoreSnapshot {
    state: AppState,
    accounts: Vec<Account>,
    blocks: Vec<Option<Block>>,
    cycles: Vec<Option<Cycle>>,
    baker_cycles: Vec<Vec<BakerCycle>>,
    rights: Vec<Vec<BakingRight>>,
    statistics: Vec<Option<Statistics>>,
    voting_periods: Vec<Option<VotingPeriod>>,
    operations: i64,
}

fn snapshot(store: &MemoryStore) -> StoreSnapshot {
    let mut state = store.app_state().unwrap().unwrap();
    state.account_counter = 0;
    state.operation_counter = 0;

    let mut accounts = store.accounts().unwrap();
    for account in &mut accounts {
        account.last_level = 0;
    }

    StoreSnapshot {
        state,
        accounts,
        blocks: (0..=20).map(|l| store.block_at(l).unwrap()).collect(),
        cycles: (0..=5).map(|c| store.cycle(c).unwrap()).collect(),
        baker_cycles: (0..=5).map(|c| store.baker_cycles_of(c).unwrap()).collect(),
        rights: (0..=48).map(|l| store.rights_at(l).unwrap()).collect(),
        statistics: (0..=20).map(|l| store.statistics_at(l).unwrap()).collect(),
        voting_periods: (0..=2).map(|p| store.voting_period(p).unwrap()).collect(),
        operations: store.operations_count().unwrap(),
    }
}

#[test]
fn value_received_and_respent_in_one_block_reverts_cleanly() {
    let mut engine = Engine::new();
    let b0 = genesis();
    engine.apply(&b0);
    let before = snapshot(&engine.store);

    // Dave only ever holds money in the middle of the block: the second
    // transfer spends exactly what the first one delivered.
    let b1 = block(
        1,
        b0.header.hash,
        b"main",
        ALICE,
        vec![
            RawOperation::Transaction {
                hash: op_hash(b"tx/fund-dave"),
                source: Address::new(ALICE),
                destination: Address::new("tz1dave"),
                amount: 100,
                fee: 0,
            },
            RawOperation::Transaction {
                hash: op_hash(b"tx/dave-forwards"),
                source: Address::new("tz1dave"),
                destination: Address::new(CAROL),
                amount: 100,
                fee: 0,
            },
        ],
    );
    engine.apply(&b1);
    engine.assert_consistent();
    assert_eq!(engine.account("tz1dave").balance, 0);
    assert_eq!(engine.account(CAROL).balance, 100);

    assert_eq!(engine.revert(), 0);
    engine.assert_consistent();
    assert_eq!(snapshot(&engine.store), before);
    assert!(engine
        .store
        .account_by_address(&Address::new(CAROL))
        .unwrap()
        .is_none());
}

#[test]
fn cycle_boundary_block_reverts_to_the_exact_prior_state() {
    let mut engine = Engine::new();

    let mut blocks = vec![genesis()];
    let push = |blocks: &mut Vec<RawBlock>, proposer: &str, ops: Vec<RawOperation>| {
        let level = blocks.len() as Level;
        let predecessor = blocks[(level - 1) as usize].header.hash;
        blocks.push(block(level, predecessor, b"main", proposer, ops));
    };

    push(
        &mut blocks,
        ALICE,
        vec![RawOperation::Transaction {
            hash: op_hash(b"tx/seed-carol"),
            source: Address::new(ALICE),
            destination: Address::new(CAROL),
            amount: 50_000,
            fee: 10,
        }],
    );
    push(
        &mut blocks,
        ALICE,
        vec![RawOperation::Delegation {
            hash: op_hash(b"delegate/carol"),
            source: Address::new(CAROL),
            delegate: Some(Address::new(ALICE)),
            fee: 5,
        }],
    );
    push(
        &mut blocks,
        ALICE,
        vec![RawOperation::Origination {
            hash: op_hash(b"originate/counter"),
            source: Address::new(ALICE),
            contract: Address::new("KT1counter"),
            balance: 20_000,
            fee: 7,
        }],
    );
    for _ in 4..=16 {
        push(&mut blocks, ALICE, vec![]);
    }

    // Level 17 enters cycle 2: grace extension, deactivation refresh and the
    // creation of cycle 4 all happen inside the block under test.
    push(
        &mut blocks,
        ALICE,
        vec![
            RawOperation::Transaction {
                hash: op_hash(b"tx/17"),
                source: Address::new(ALICE),
                destination: Address::new(CAROL),
                amount: 1_000,
                fee: 3,
            },
            RawOperation::Attestation {
                hash: op_hash(b"attest/17"),
                source: Address::new(ALICE),
                slots: 4,
            },
            RawOperation::NonceRevelation {
                hash: op_hash(b"nonce/17"),
                source: Address::new(ALICE),
                revealed_level: 12,
                nonce: vec![0x5a; 32],
                reward: 5,
            },
        ],
    );

    for raw in &blocks[..=16] {
        engine.apply(raw);
    }
    let before = snapshot(&engine.store);

    engine.apply(&blocks[17]);
    assert_eq!(engine.store.app_state().unwrap().unwrap().level, 17);
    engine.assert_consistent();

    assert_eq!(engine.revert(), 16);
    engine.assert_consistent();
    assert_eq!(snapshot(&engine.store), before);
}

#[test]
fn full_unwind_and_replay_converge() {
    let mut engine = Engine::new();
    let blocks = linear_chain(3);
    for raw in &blocks {
        engine.apply(raw);
    }

    for expected in [2, 1, 0, -1] {
        assert_eq!(engine.revert(), expected);
    }

    // The store is back before genesis. The baker registration survives by
    // design (a promotion is never undone), drained to zero.
    assert_eq!(engine.store.blocks_len(), 0);
    assert_eq!(engine.store.app_state().unwrap().unwrap().level, -1);
    assert_eq!(engine.store.statistics_at(0).unwrap(), None);
    assert_eq!(engine.store.cycle(0).unwrap(), None);
    assert_eq!(engine.store.rights_at(1).unwrap(), vec![]);
    assert_eq!(engine.store.baker_cycle(0, 1).unwrap(), None);
    assert_eq!(engine.store.voting_period(0).unwrap(), None);
    let alice = engine.account(ALICE);
    assert_eq!(alice.balance, 0);
    assert!(alice.is_baker());

    // Replaying the same branch lands on a fully consistent head again.
    for raw in &blocks {
        engine.apply(raw);
    }
    assert_eq!(engine.store.app_state().unwrap().unwrap().level, 3);
    assert_eq!(engine.account(ALICE).balance, 1_000_000 + 3 * 1_000);
    engine.assert_consistent();
}

proptest! {
    /// Any mix of transfers and an optional origination reverts to the
    /// exact prior state, including the accounts it created along the way.
    #[test]
    fn any_operation_batch_reverts_to_the_prior_state(
        batch in proptest::collection::vec((0_usize..3, 1_i64..1_000, 0_i64..10), 0..8),
        originate in any::<bool>(),
    ) {
        let recipients = [BOB, CAROL, "tz1dave"];
        let mut operations: Vec<RawOperation> = batch
            .iter()
            .enumerate()
            .map(|(index, (recipient, amount, fee))| RawOperation::Transaction {
                hash: op_hash(format!("tx/batch-{index}").as_bytes()),
                source: Address::new(ALICE),
                destination: Address::new(recipients[*recipient]),
                amount: *amount,
                fee: *fee,
            })
            .collect();
        if originate {
            operations.push(RawOperation::Origination {
                hash: op_hash(b"originate/batch"),
                source: Address::new(ALICE),
                contract: Address::new("KT1batch"),
                balance: 2_000,
                fee: 4,
            });
        }

        let mut engine = Engine::new();
        let b0 = genesis();
        let b1 = block(1, b0.header.hash, b"main", ALICE, vec![]);
        engine.apply(&b0);
        engine.apply(&b1);
        let before = snapshot(&engine.store);

        engine.apply(&block(2, b1.header.hash, b"main", ALICE, operations));
        engine.assert_consistent();

        prop_assert_eq!(engine.revert(), 1);
        prop_assert_eq!(snapshot(&engine.store), before);
    }
}

// Voting
// ----------------------------------------------------------------------------

#[test]
fn a_voting_rollover_snapshots_stake() {
    let mut engine = Engine::new();
    // Level 17 opens voting period 1 (16 levels per period).
    for raw in &linear_chain(17) {
        engine.apply(raw);
    }
    let alice = engine.account(ALICE);

    let period = engine
        .store
        .voting_period(1)
        .unwrap()
        .expect("period 1 row");
    assert_eq!(period.first_level, 17);
    assert_eq!(period.epoch, 0);
    assert_eq!(
        period.total_power,
        alice.baker.as_ref().unwrap().staking_balance
    );
    assert_eq!(
        period.voters,
        vec![VoterPower {
            baker: alice.id,
            power: period.total_power,
        }]
    );
    assert_eq!(period.total_voters(), 1);

    let state = engine.store.app_state().unwrap().unwrap();
    assert_eq!(state.voting_period, 1);
    assert_eq!(state.voting_epoch, 0);

    // Period 0 was opened by the first block after genesis.
    assert_eq!(
        engine
            .store
            .voting_period(0)
            .unwrap()
            .expect("period 0 row")
            .first_level,
        1
    );

    // Reverting the opening block drops the snapshot again.
    assert_eq!(engine.revert(), 16);
    assert_eq!(engine.store.voting_period(1).unwrap(), None);
    assert_eq!(engine.store.app_state().unwrap().unwrap().voting_period, 0);
    engine.assert_consistent();
}

// Rights settlement
// ----------------------------------------------------------------------------

#[test]
fn a_completed_cycle_settles_every_right() {
    let mut engine = Engine::new();
    // Through the last level of cycle 1.
    for raw in &linear_chain(16) {
        engine.apply(raw);
    }

    let alice = engine.account(ALICE);
    let row = engine
        .store
        .baker_cycle(1, alice.id)
        .unwrap()
        .expect("cycle 1 aggregate for the only baker");

    // The sole baker realized every round-zero baking right and attested
    // nothing, so the whole committee went missed.
    let params = ProtocolParameters::for_tests();
    assert_eq!(row.blocks, params.blocks_per_cycle);
    assert_eq!(row.future_blocks, 0);
    assert_eq!(row.missed_blocks, 0);
    assert_eq!(row.block_rewards, params.blocks_per_cycle * params.block_reward);
    assert_eq!(row.attestations, 0);
    assert_eq!(row.future_attestations, 0);
    assert_eq!(
        row.missed_attestations,
        params.blocks_per_cycle * params.committee_size as i64
    );

    // No right of the completed cycle is left pending.
    for level in 9..=16 {
        for right in engine.store.rights_at(level).unwrap() {
            assert_ne!(right.status, RightStatus::Future, "right {right:?}");
        }
    }

    // The grace window was extended at the rollover into cycle 1 and the
    // overwritten value parked for the revert.
    let baker = alice.baker.as_ref().unwrap();
    assert_eq!(baker.grace_period, 2);
    assert!(!baker.deactivated);
    assert_eq!(
        engine
            .store
            .baker_cycle(0, alice.id)
            .unwrap()
            .unwrap()
            .prior_grace_period,
        Some(2)
    );
}

#[test]
fn proposing_realizes_the_round_zero_right() {
    let mut engine = Engine::new();
    for raw in &linear_chain(2) {
        engine.apply(raw);
    }

    let alice = engine.account(ALICE);
    let realized: Vec<BakingRight> = engine
        .store
        .rights_at(1)
        .unwrap()
        .into_iter()
        .filter(|right| {
            right.baker == alice.id
                && matches!(right.kind, RightKind::Baking { round: 0 })
        })
        .collect();
    assert_eq!(realized.len(), 1);
    assert_eq!(realized[0].status, RightStatus::Realized);
}
