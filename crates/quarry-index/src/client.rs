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

use async_trait::async_trait;
use quarry_kernel::{Level, RawBlock, RawCheckpoint, RawHeader};
use thiserror::Error;

// ChainClient
// ----------------------------------------------------------------------------

/// The narrow interface to the remote node. Implementations live elsewhere
/// (HTTP in `quarry-node`); the engine only ever sees this trait, which keeps
/// single-block processing testable against a scripted fake.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Header of the remote head.
    async fn head(&self) -> Result<RawHeader, ClientError>;

    /// Header at a specific level, used for rebase comparison.
    async fn header_at(&self, level: Level) -> Result<RawHeader, ClientError>;

    /// Full block with operations and balance-update records.
    async fn block_at(&self, level: Level) -> Result<RawBlock, ClientError>;

    /// Whether the node has anything newer than `since`.
    async fn has_updates(&self, since: Level) -> Result<bool, ClientError>;

    /// The node's own view of selected aggregates at a level; consumed by
    /// the consistency diagnostics only.
    async fn checkpoint(&self, level: Level) -> Result<RawCheckpoint, ClientError>;
}

#[derive(Debug, Error)]
pub enum ClientError {
    /// The node does not have this level (yet). Not an error condition for
    /// the loop; it waits and retries.
    #[error("block at level {0} not found on the node")]
    NotFound(Level),

    /// The node is unreachable or timed out. Retried with bounded backoff,
    /// without touching any state.
    #[error("node unreachable: {0}")]
    Unreachable(String),

    /// The node answered with something we cannot decode. Fatal for the
    /// block being fetched; skipping it would corrupt all later accounting.
    #[error("malformed response from node: {0}")]
    Malformed(String),
}
