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

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Sha3_256};
use std::{fmt, str::FromStr};
use thiserror::Error;

// Hash
// ----------------------------------------------------------------------------

/// An opaque digest of `N` bytes, rendered as lowercase hex. The chain itself
/// uses base58-check encodings on the wire; we keep the decoded payload only,
/// since every comparison and every seed derivation operates on raw bytes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash<const N: usize>([u8; N]);

pub type BlockHash = Hash<32>;
pub type OperationHash = Hash<32>;
pub type ProtocolHash = Hash<32>;

/// The per-cycle entropy driving the rights sampler.
pub type Seed = Hash<32>;

impl<const N: usize> Hash<N> {
    pub const SIZE: usize = N;

    pub fn new(bytes: [u8; N]) -> Self {
        Self(bytes)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// A hash with all bytes zeroed; stands for "no predecessor" on the
    /// genesis block and for unset protocol references.
    pub fn zero() -> Self {
        Self([0; N])
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl<const N: usize> From<[u8; N]> for Hash<N> {
    fn from(bytes: [u8; N]) -> Self {
        Self(bytes)
    }
}

impl<const N: usize> fmt::Display for Hash<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl<const N: usize> fmt::Debug for Hash<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash<{}>({})", N, hex::encode(self.0))
    }
}

#[derive(Debug, Error)]
pub enum HashParseError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("wrong digest length: expected {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },
}

impl<const N: usize> FromStr for Hash<N> {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let actual = bytes.len();
        let bytes: [u8; N] = bytes
            .try_into()
            .map_err(|_| HashParseError::WrongLength {
                expected: N,
                actual,
            })?;
        Ok(Self(bytes))
    }
}

impl<const N: usize> Serialize for Hash<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de, const N: usize> Deserialize<'de> for Hash<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// Hasher
// ----------------------------------------------------------------------------

/// Incremental SHA3-256, the only digest used for seed chaining and sampler
/// draws. Wrapped so that call sites never depend on the `sha3` types
/// directly.
pub struct Hasher {
    inner: Sha3_256,
}

impl Hasher {
    pub fn new() -> Self {
        Self {
            inner: Sha3_256::new(),
        }
    }

    pub fn input(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    pub fn finalize(self) -> Hash<32> {
        let digest: [u8; 32] = self.inner.finalize().into();
        Hash(digest)
    }

    pub fn hash(bytes: &[u8]) -> Hash<32> {
        let mut hasher = Self::new();
        hasher.input(bytes);
        hasher.finalize()
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_display_roundtrip() {
        let hash = Hasher::hash(b"quarry");
        let parsed: Hash<32> = hash.to_string().parse().unwrap();
        assert_eq!(hash, parsed);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(matches!(
            "deadbeef".parse::<Hash<32>>(),
            Err(HashParseError::WrongLength {
                expected: 32,
                actual: 4
            })
        ));
    }

    #[test]
    fn hashing_is_stable() {
        // SHA3-256 of the empty string, straight from the FIPS-202 vectors.
        assert_eq!(
            Hasher::hash(b"").to_string(),
            "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a"
        );
    }
}
