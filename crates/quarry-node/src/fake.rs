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

//! A scriptable in-memory chain. Tests push blocks, truncate the tip to
//! fake a reorg, or cut the connection; the sync loop sees it all through
//! the same [`ChainClient`] surface as a real node.

use async_trait::async_trait;
use parking_lot::Mutex;
use quarry_index::{ChainClient, ClientError};
use quarry_kernel::{
    BlockHash, Hasher, Level, RawBlock, RawCheckpoint, RawHeader,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Deterministic block identity for scripted chains.
pub fn block_id(level: Level, salt: &[u8]) -> BlockHash {
    let mut hasher = Hasher::new();
    hasher.input(b"fake/block");
    hasher.input(&level.to_be_bytes());
    hasher.input(salt);
    hasher.finalize()
}

#[derive(Default)]
struct Inner {
    blocks: BTreeMap<Level, RawBlock>,
    checkpoints: BTreeMap<Level, RawCheckpoint>,
    offline: bool,
}

/// Cloneable handle; the sync loop owns one clone, the test script another.
#[derive(Clone, Default)]
pub struct FakeChain {
    inner: Arc<Mutex<Inner>>,
}

impl FakeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, block: RawBlock) {
        self.inner.lock().blocks.insert(block.header.level, block);
    }

    pub fn push_all(&self, blocks: impl IntoIterator<Item = RawBlock>) {
        let mut inner = self.inner.lock();
        for block in blocks {
            inner.blocks.insert(block.header.level, block);
        }
    }

    /// Drop every block at or above `level`; the script then pushes the
    /// replacement branch.
    pub fn truncate(&self, level: Level) {
        self.inner.lock().blocks.retain(|l, _| *l < level);
    }

    pub fn head_level(&self) -> Level {
        self.inner
            .lock()
            .blocks
            .keys()
            .next_back()
            .copied()
            .unwrap_or(-1)
    }

    pub fn set_offline(&self, offline: bool) {
        self.inner.lock().offline = offline;
    }

    pub fn set_checkpoint(&self, checkpoint: RawCheckpoint) {
        self.inner
            .lock()
            .checkpoints
            .insert(checkpoint.level, checkpoint);
    }

    fn guard_online(&self) -> Result<(), ClientError> {
        if self.inner.lock().offline {
            Err(ClientError::Unreachable("connection scripted away".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn head(&self) -> Result<RawHeader, ClientError> {
        self.guard_online()?;
        let inner = self.inner.lock();
        inner
            .blocks
            .values()
            .next_back()
            .map(|block| block.header.clone())
            .ok_or(ClientError::NotFound(-1))
    }

    async fn header_at(&self, level: Level) -> Result<RawHeader, ClientError> {
        self.guard_online()?;
        let inner = self.inner.lock();
        inner
            .blocks
            .get(&level)
            .map(|block| block.header.clone())
            .ok_or(ClientError::NotFound(level))
    }

    async fn block_at(&self, level: Level) -> Result<RawBlock, ClientError> {
        self.guard_online()?;
        let inner = self.inner.lock();
        inner
            .blocks
            .get(&level)
            .cloned()
            .ok_or(ClientError::NotFound(level))
    }

    async fn has_updates(&self, since: Level) -> Result<bool, ClientError> {
        self.guard_online()?;
        Ok(self.head_level() > since)
    }

    async fn checkpoint(&self, level: Level) -> Result<RawCheckpoint, ClientError> {
        self.guard_online()?;
        let inner = self.inner.lock();
        inner
            .checkpoints
            .get(&level)
            .cloned()
            .ok_or(ClientError::NotFound(level))
    }
}
