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

//! Deterministic weighted sampling without replacement over a stake
//! distribution. This reproduces the chain's leader selection offline, so it
//! has zero tolerance for approximation: draws come from a hash-counter
//! generator over the cumulative-stake space, and candidates are ordered by
//! public-key-prefix-then-address-bytes before any draw so that equal stakes
//! break ties identically everywhere.

use quarry_kernel::{AccountId, Address, Hasher, Mutez, Seed};

const DOMAIN_DRAW: &[u8] = b"quarry/sampler/draw";

// Sampler
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Sampler {
    /// Candidates in tie-break order, zero stakes filtered out.
    participants: Vec<(AccountId, Mutez)>,
    total_stake: Mutez,
}

impl Sampler {
    /// Build a sampler from a snapshot. Ordering of the input is
    /// irrelevant; the sampler sorts by the addresses' own ordering (prefix
    /// first, then payload bytes), which is the tie-break the chain uses.
    pub fn new(snapshot: Vec<(Address, AccountId, Mutez)>) -> Self {
        let mut snapshot: Vec<_> = snapshot
            .into_iter()
            .filter(|(_, _, stake)| *stake > 0)
            .collect();
        snapshot.sort_by(|(a, _, _), (b, _, _)| a.cmp(b));

        let total_stake = snapshot.iter().map(|(_, _, stake)| *stake).sum();
        let participants = snapshot
            .into_iter()
            .map(|(_, id, stake)| (id, stake))
            .collect();

        Self {
            participants,
            total_stake,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn total_stake(&self) -> Mutez {
        self.total_stake
    }

    /// An ordered draw of `count` distinct participants, each selected with
    /// probability proportional to its remaining stake. `label` namespaces
    /// the draw (e.g. per level and right kind) so that different draws from
    /// one seed do not correlate.
    pub fn draw(&self, seed: &Seed, label: &[u8], count: usize) -> Vec<AccountId> {
        let mut remaining = self.participants.clone();
        let mut remaining_stake = self.total_stake;
        let mut drawn = Vec::with_capacity(count.min(remaining.len()));

        let mut counter: u64 = 0;
        while drawn.len() < count && !remaining.is_empty() {
            // remaining_stake > 0 holds because zero stakes never enter.
            let point = (next_u64(seed, label, counter) % remaining_stake as u64) as Mutez;
            counter += 1;

            let index = locate(&remaining, point);
            let (id, stake) = remaining.remove(index);
            remaining_stake -= stake;
            drawn.push(id);
        }

        drawn
    }
}

/// Walk the cumulative-stake space and find the participant owning `point`.
/// `point` is in `0..remaining_stake`.
fn locate(remaining: &[(AccountId, Mutez)], point: Mutez) -> usize {
    let mut acc: Mutez = 0;
    for (index, (_, stake)) in remaining.iter().enumerate() {
        acc += stake;
        if point < acc {
            return index;
        }
    }
    // point < sum(stakes) is guaranteed by the caller's modulo.
    remaining.len() - 1
}

fn next_u64(seed: &Seed, label: &[u8], counter: u64) -> u64 {
    let mut hasher = Hasher::new();
    hasher.input(DOMAIN_DRAW);
    hasher.input(seed.as_slice());
    hasher.input(label);
    hasher.input(&counter.to_be_bytes());
    let digest = hasher.finalize();

    let mut word = [0u8; 8];
    word.copy_from_slice(&digest.as_slice()[..8]);
    u64::from_be_bytes(word)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rights::seed::genesis_seed;
    use proptest::prelude::*;
    use quarry_kernel::generators::{any_address, any_amount};
    use std::collections::BTreeSet;

    fn fixed_snapshot() -> Vec<(Address, AccountId, Mutez)> {
        vec![
            (Address::new("tz1ccc"), 3, 5_000),
            (Address::new("tz1aaa"), 1, 1_000),
            (Address::new("tz2aaa"), 4, 2_500),
            (Address::new("tz1bbb"), 2, 0),
        ]
    }

    #[test]
    fn zero_stakes_are_excluded() {
        let sampler = Sampler::new(fixed_snapshot());
        assert_eq!(sampler.len(), 3);
        assert_eq!(sampler.total_stake(), 8_500);
        let drawn = sampler.draw(&genesis_seed(), b"test", 10);
        assert!(!drawn.contains(&2));
    }

    #[test]
    fn draws_are_byte_identical_across_runs() {
        let first = Sampler::new(fixed_snapshot()).draw(&genesis_seed(), b"lvl/1", 3);
        let second = Sampler::new(fixed_snapshot()).draw(&genesis_seed(), b"lvl/1", 3);
        assert_eq!(first, second);
    }

    // Pinned against an independent SHA3-256 computation of the full draw
    // chain. A change here means the derivation itself changed, which shifts
    // every historical right.
    #[test]
    fn golden_vector_is_pinned() {
        let sampler = Sampler::new(fixed_snapshot());
        assert_eq!(sampler.draw(&genesis_seed(), b"lvl/1", 3), vec![3, 4, 1]);
    }

    #[test]
    fn input_order_does_not_matter() {
        let mut reversed = fixed_snapshot();
        reversed.reverse();
        assert_eq!(
            Sampler::new(fixed_snapshot()).draw(&genesis_seed(), b"lvl/1", 3),
            Sampler::new(reversed).draw(&genesis_seed(), b"lvl/1", 3),
        );
    }

    #[test]
    fn labels_decorrelate_draws() {
        let sampler = Sampler::new(fixed_snapshot());
        // Exhaustive draws under two labels are permutations of the same
        // set, not necessarily the same sequence.
        let a = sampler.draw(&genesis_seed(), b"lvl/1", 3);
        let b = sampler.draw(&genesis_seed(), b"lvl/2", 3);
        assert_eq!(
            a.iter().collect::<BTreeSet<_>>(),
            b.iter().collect::<BTreeSet<_>>()
        );
    }

    #[test]
    fn single_participant_takes_every_draw() {
        let sampler = Sampler::new(vec![(Address::new("tz1solo"), 9, 1)]);
        assert_eq!(sampler.draw(&genesis_seed(), b"x", 3), vec![9]);
    }

    #[test]
    fn without_replacement_never_repeats() {
        let sampler = Sampler::new(fixed_snapshot());
        let drawn = sampler.draw(&genesis_seed(), b"lvl/7", 3);
        let unique: BTreeSet<_> = drawn.iter().collect();
        assert_eq!(unique.len(), drawn.len());
    }

    proptest! {
        #[test]
        fn reproducible_for_any_snapshot(
            entries in proptest::collection::vec((any_address(), any_amount()), 1..20),
            label in proptest::collection::vec(any::<u8>(), 1..16),
        ) {
            let snapshot: Vec<_> = entries
                .into_iter()
                .enumerate()
                .map(|(ix, (address, stake))| (address, ix as AccountId, stake))
                .collect();
            let sampler = Sampler::new(snapshot.clone());
            let count = sampler.len();
            prop_assert_eq!(
                sampler.draw(&genesis_seed(), &label, count),
                Sampler::new(snapshot).draw(&genesis_seed(), &label, count)
            );
        }
    }
}
