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

pub mod sampler;
pub mod seed;

pub use sampler::Sampler;

use quarry_kernel::{
    AccountId, Address, BakingRight, CycleIndex, Mutez, ProtocolParameters, RightKind, RightStatus,
    Seed,
};
use std::collections::BTreeMap;

// Cycle rights
// ----------------------------------------------------------------------------

/// Expected workload of one baker over one cycle, accumulated while rights
/// are generated; seeds the `BakerCycle` aggregates.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedRights {
    pub blocks: i64,
    pub attestation_slots: i64,
}

#[derive(Debug)]
pub struct CycleRights {
    pub rights: Vec<BakingRight>,
    pub expected: BTreeMap<AccountId, ExpectedRights>,

    /// Stake of bakers that received at least one right.
    pub selected_stake: Mutez,
}

/// Produce every right of a cycle from its frozen stake snapshot and seed.
/// Fully deterministic: same inputs, byte-identical output.
pub fn compute_cycle_rights(
    params: &ProtocolParameters,
    cycle: CycleIndex,
    seed: &Seed,
    snapshot: &[(Address, AccountId, Mutez)],
) -> CycleRights {
    let sampler = Sampler::new(snapshot.to_vec());
    let mut rights = Vec::new();
    let mut expected: BTreeMap<AccountId, ExpectedRights> = BTreeMap::new();

    let first = params.first_level_of(cycle);
    let last = params.last_level_of(cycle);

    for level in first..=last {
        // Baking priorities: an ordered draw, round 0 first.
        let bakers = sampler.draw(
            seed,
            &baking_label(level),
            params.max_baking_rounds as usize,
        );
        for (round, baker) in bakers.iter().enumerate() {
            rights.push(BakingRight {
                cycle,
                level,
                baker: *baker,
                kind: RightKind::Baking {
                    round: round as u32,
                },
                status: RightStatus::Future,
            });
            if round == 0 {
                expected.entry(*baker).or_default().blocks += 1;
            }
        }

        // Attestation committee: distinct members, committee slots spread
        // over them (earlier draws take the remainder).
        let committee = sampler.draw(seed, &attestation_label(level), sampler.len());
        if committee.is_empty() {
            continue;
        }
        let members = committee.len().min(params.committee_size as usize);
        let base = params.committee_size / members as u32;
        let remainder = params.committee_size as usize % members;
        for (ix, baker) in committee.into_iter().take(members).enumerate() {
            let slots = base + u32::from(ix < remainder);
            rights.push(BakingRight {
                cycle,
                level,
                baker,
                kind: RightKind::Attestation { slots },
                status: RightStatus::Future,
            });
            expected.entry(baker).or_default().attestation_slots += slots as i64;
        }
    }

    let selected_stake = snapshot
        .iter()
        .filter(|(_, id, _)| expected.contains_key(id))
        .map(|(_, _, stake)| *stake)
        .sum();

    CycleRights {
        rights,
        expected,
        selected_stake,
    }
}

fn baking_label(level: i64) -> Vec<u8> {
    let mut label = b"baking/".to_vec();
    label.extend_from_slice(&level.to_be_bytes());
    label
}

fn attestation_label(level: i64) -> Vec<u8> {
    let mut label = b"attestation/".to_vec();
    label.extend_from_slice(&level.to_be_bytes());
    label
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rights::seed::genesis_seed;
    use quarry_kernel::Address;

    fn snapshot() -> Vec<(Address, AccountId, Mutez)> {
        vec![
            (Address::new("tz1aaa"), 1, 4_000),
            (Address::new("tz1bbb"), 2, 3_000),
            (Address::new("tz1ccc"), 3, 3_000),
        ]
    }

    #[test]
    fn covers_every_level_of_the_cycle() {
        let params = ProtocolParameters::for_tests();
        let out = compute_cycle_rights(&params, 1, &genesis_seed(), &snapshot());

        let levels: std::collections::BTreeSet<_> =
            out.rights.iter().map(|right| right.level).collect();
        assert_eq!(
            levels.into_iter().collect::<Vec<_>>(),
            (params.first_level_of(1)..=params.last_level_of(1)).collect::<Vec<_>>()
        );
    }

    #[test]
    fn one_round_zero_baker_per_level() {
        let params = ProtocolParameters::for_tests();
        let out = compute_cycle_rights(&params, 0, &genesis_seed(), &snapshot());
        for level in params.first_level_of(0)..=params.last_level_of(0) {
            let round_zero: Vec<_> = out
                .rights
                .iter()
                .filter(|r| {
                    r.level == level && matches!(r.kind, RightKind::Baking { round: 0 })
                })
                .collect();
            assert_eq!(round_zero.len(), 1, "level {level}");
        }
    }

    #[test]
    fn committee_slots_sum_to_committee_size() {
        let params = ProtocolParameters::for_tests();
        let out = compute_cycle_rights(&params, 0, &genesis_seed(), &snapshot());
        for level in params.first_level_of(0)..=params.last_level_of(0) {
            let slots: u32 = out
                .rights
                .iter()
                .filter(|r| r.level == level)
                .filter_map(|r| match r.kind {
                    RightKind::Attestation { slots } => Some(slots),
                    RightKind::Baking { .. } => None,
                })
                .sum();
            assert_eq!(slots, params.committee_size, "level {level}");
        }
    }

    #[test]
    fn expected_counts_match_emitted_rights() {
        let params = ProtocolParameters::for_tests();
        let out = compute_cycle_rights(&params, 0, &genesis_seed(), &snapshot());

        let mut blocks: BTreeMap<AccountId, i64> = BTreeMap::new();
        let mut slots: BTreeMap<AccountId, i64> = BTreeMap::new();
        for right in &out.rights {
            match right.kind {
                RightKind::Baking { round: 0 } => *blocks.entry(right.baker).or_default() += 1,
                RightKind::Baking { .. } => {}
                RightKind::Attestation { slots: n } => {
                    *slots.entry(right.baker).or_default() += n as i64
                }
            }
        }
        for (baker, exp) in &out.expected {
            assert_eq!(exp.blocks, blocks.get(baker).copied().unwrap_or_default());
            assert_eq!(
                exp.attestation_slots,
                slots.get(baker).copied().unwrap_or_default()
            );
        }
    }

    #[test]
    fn deterministic_end_to_end() {
        let params = ProtocolParameters::for_tests();
        let a = compute_cycle_rights(&params, 2, &genesis_seed(), &snapshot());
        let b = compute_cycle_rights(&params, 2, &genesis_seed(), &snapshot());
        assert_eq!(a.rights, b.rights);
        assert_eq!(a.selected_stake, b.selected_stake);
    }
}
