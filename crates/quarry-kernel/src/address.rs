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

use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt};

// Address
// ----------------------------------------------------------------------------

/// A chain address, kept in its textual form as reported by the node. The
/// first characters carry the key/contract discriminant (`tz1`, `tz2`, `tz3`,
/// `KT1`, `txr1`); everything after is the encoded payload.
///
/// Ordering is **not** plain lexicographic: addresses order by public-key
/// prefix first, then by payload bytes. The rights sampler relies on this
/// ordering to break ties deterministically, so it is baked into `Ord` rather
/// than left to call sites.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AddressKind {
    /// `tz1`, an Ed25519 public key hash.
    Ed25519,
    /// `tz2`, a Secp256k1 public key hash.
    Secp256k1,
    /// `tz3`, a P-256 public key hash.
    P256,
    /// `KT1`, an originated contract.
    Contract,
    /// `txr1`, a transaction rollup.
    Rollup,
    /// Anything we do not recognize; kept rather than rejected since the
    /// node is the root of truth for address validity.
    Unknown,
}

impl Address {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> AddressKind {
        if self.0.starts_with("tz1") {
            AddressKind::Ed25519
        } else if self.0.starts_with("tz2") {
            AddressKind::Secp256k1
        } else if self.0.starts_with("tz3") {
            AddressKind::P256
        } else if self.0.starts_with("KT1") {
            AddressKind::Contract
        } else if self.0.starts_with("txr1") {
            AddressKind::Rollup
        } else {
            AddressKind::Unknown
        }
    }

    /// Whether this address can hold a baker (only implicit key addresses
    /// can).
    pub fn is_implicit(&self) -> bool {
        matches!(
            self.kind(),
            AddressKind::Ed25519 | AddressKind::Secp256k1 | AddressKind::P256
        )
    }

    fn payload(&self) -> &[u8] {
        let prefix_len = match self.kind() {
            AddressKind::Rollup => 4,
            AddressKind::Ed25519
            | AddressKind::Secp256k1
            | AddressKind::P256
            | AddressKind::Contract => 3,
            AddressKind::Unknown => 0,
        };
        self.0.as_bytes().get(prefix_len..).unwrap_or_default()
    }
}

impl Ord for Address {
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind()
            .cmp(&other.kind())
            .then_with(|| self.payload().cmp(other.payload()))
    }
}

impl PartialOrd for Address {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl From<&str> for Address {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("tz1abc", AddressKind::Ed25519)]
    #[test_case("tz2abc", AddressKind::Secp256k1)]
    #[test_case("tz3abc", AddressKind::P256)]
    #[test_case("KT1abc", AddressKind::Contract)]
    #[test_case("txr1abc", AddressKind::Rollup)]
    #[test_case("mv1abc", AddressKind::Unknown)]
    fn discriminant(raw: &str, kind: AddressKind) {
        assert_eq!(Address::new(raw).kind(), kind);
    }

    #[test]
    fn prefix_orders_before_payload() {
        // 'tz1zzz' < 'tz2aaa' despite 'z' > 'a' lexicographically.
        assert!(Address::new("tz1zzz") < Address::new("tz2aaa"));
        assert!(Address::new("tz2aaa") < Address::new("tz2aab"));
    }
}
