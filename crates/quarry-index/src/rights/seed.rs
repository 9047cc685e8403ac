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

//! Per-cycle seed derivation. The seed of cycle `n` chains the seed of cycle
//! `n - 1` with every nonce revealed during the latest cycle complete at
//! creation time: cycles are created `preserved_cycles` ahead, so cycle `n`
//! folds the nonces of cycle `n - preserved_cycles - 1`, the same cycle its
//! stake snapshot is taken from. Nonces fold in operation-id order, and
//! (from the protocol epoch that introduces it) a verifiable-delay-function
//! output folds in last. The chaining is byte-for-byte fixed: any deviation
//! silently shifts every right of the cycle.

use quarry_kernel::{CycleIndex, Hasher, Seed};

const DOMAIN_GENESIS: &[u8] = b"quarry/seed/genesis";
const DOMAIN_CHAIN: &[u8] = b"quarry/seed/chain";
const DOMAIN_VDF: &[u8] = b"quarry/seed/vdf";

/// The seed of cycle 0, fixed by convention rather than chain data.
pub fn genesis_seed() -> Seed {
    Hasher::hash(DOMAIN_GENESIS)
}

/// Chain the next cycle's seed. `nonces` must be in operation-id order;
/// order matters and is part of the contract.
pub fn chain_seed(previous: &Seed, cycle: CycleIndex, nonces: &[Vec<u8>]) -> Seed {
    let mut hasher = Hasher::new();
    hasher.input(DOMAIN_CHAIN);
    hasher.input(previous.as_slice());
    hasher.input(&cycle.to_be_bytes());
    for nonce in nonces {
        hasher.input(nonce);
    }
    hasher.finalize()
}

/// Fold a VDF output into an already-chained seed. Separate from
/// [`chain_seed`] because only some protocol epochs carry one.
pub fn fold_vdf(seed: &Seed, vdf: &[u8]) -> Seed {
    let mut hasher = Hasher::new();
    hasher.input(DOMAIN_VDF);
    hasher.input(seed.as_slice());
    hasher.input(vdf);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_seed_is_pinned() {
        assert_eq!(
            genesis_seed().to_string(),
            "9e4e3c9263ab592ba521eb9fe36e82343e6619b36a814978e49df4610bac68ed"
        );
    }

    #[test]
    fn chaining_is_reproducible() {
        let s0 = genesis_seed();
        let nonces = vec![vec![1u8; 32], vec![2u8; 32]];
        assert_eq!(chain_seed(&s0, 1, &nonces), chain_seed(&s0, 1, &nonces));
    }

    #[test]
    fn nonce_order_matters() {
        let s0 = genesis_seed();
        let forward = vec![vec![1u8; 32], vec![2u8; 32]];
        let backward = vec![vec![2u8; 32], vec![1u8; 32]];
        assert_ne!(chain_seed(&s0, 1, &forward), chain_seed(&s0, 1, &backward));
    }

    #[test]
    fn cycle_index_is_bound_into_the_chain() {
        let s0 = genesis_seed();
        assert_ne!(chain_seed(&s0, 1, &[]), chain_seed(&s0, 2, &[]));
    }

    #[test]
    fn vdf_changes_the_seed() {
        let s0 = genesis_seed();
        let chained = chain_seed(&s0, 1, &[]);
        assert_ne!(fold_vdf(&chained, &[9u8; 64]), chained);
        assert_eq!(fold_vdf(&chained, &[9u8; 64]), fold_vdf(&chained, &[9u8; 64]));
    }
}
