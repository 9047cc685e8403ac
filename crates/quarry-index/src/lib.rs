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

//! The synchronization engine: pulls raw blocks from a node, materializes
//! them into entity rows through a versioned commit pipeline, and keeps the
//! result convergent with the node across forks by reverting and re-applying
//! blocks. Everything a block changes is flushed in one atomic delta, and
//! every apply has an exact inverse.

pub mod client;
pub mod diagnostics;
pub mod pipeline;
pub mod protocols;
pub mod rights;
pub mod staging;
pub mod store;
pub mod sync;

pub use client::{ChainClient, ClientError};
pub use pipeline::{Commit, CommitError, WorkUnit};
pub use protocols::Pipeline;
pub use staging::StagingCache;
pub use store::{BlockDelta, Store, StoreError};
pub use sync::{ChainHead, SyncConfig, SyncError, SyncLoop, SyncStatus};
