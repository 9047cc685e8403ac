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

//! The synchronization loop: a small state machine that pulls blocks from
//! the node, pushes them through the commit pipeline, and walks the chain
//! backwards when the node is found to be on a different branch. Errors are
//! classified by value: transient ones back off and retry, fork signals
//! rebase, everything else aborts the loop.
//!
//! Cancellation is honored between units of work only; a block is never left
//! half-applied.

use crate::client::{ChainClient, ClientError};
use crate::diagnostics;
use crate::pipeline::CommitError;
use crate::protocols::Pipeline;
use crate::staging::StagingCache;
use crate::store::Store;
use quarry_kernel::{BlockHash, Level};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

const EVENT_TARGET: &str = "quarry::index::sync";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Initializing,
    Syncing,
    Waiting,
    Rebasing,
    Resetting,
}

/// The indexer's current head, published through a watch channel after every
/// applied or reverted block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainHead {
    pub level: Level,
    pub hash: BlockHash,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("synchronization aborted: {0}")]
    Fatal(String),
    /// Local aggregates disagree with the node's own view of the same level.
    /// Applying further blocks would compound the damage, so the loop stops.
    #[error("local state diverged from the node: {0}")]
    Diverged(String),
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Idle delay between head polls once caught up.
    pub poll_interval: Duration,
    /// First retry delay after a transient failure; doubles up to the cap.
    pub backoff_floor: Duration,
    pub backoff_ceiling: Duration,
    /// Compare local aggregates against the node's checkpoint every this
    /// many levels. Zero disables the check.
    pub checkpoint_every: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            backoff_floor: Duration::from_millis(250),
            backoff_ceiling: Duration::from_secs(30),
            checkpoint_every: 0,
        }
    }
}

/// How a failed unit of work should be handled.
enum Disposition {
    Retry,
    Rebase,
    Fatal(String),
}

fn classify_client(error: &ClientError) -> Disposition {
    match error {
        ClientError::Unreachable(_) => Disposition::Retry,
        // A missing level proves nothing about branches: the node may be
        // lagging behind us or still bootstrapping. Forks are detected by
        // hash comparison, never inferred from absence.
        ClientError::NotFound(_) => Disposition::Retry,
        ClientError::Malformed(reason) => Disposition::Fatal(reason.clone()),
    }
}

fn classify_commit(error: &CommitError) -> Disposition {
    match error {
        CommitError::PredecessorMismatch { .. } => Disposition::Rebase,
        other => Disposition::Fatal(other.to_string()),
    }
}

// SyncLoop
// ----------------------------------------------------------------------------

pub struct SyncLoop<C, S> {
    client: C,
    store: S,
    pipeline: Pipeline,
    cache: StagingCache,
    config: SyncConfig,
    head_tx: watch::Sender<Option<ChainHead>>,
    cancel: CancellationToken,
    backoff: Duration,
}

impl<C: ChainClient, S: Store> SyncLoop<C, S> {
    pub fn new(
        client: C,
        store: S,
        pipeline: Pipeline,
        cache: StagingCache,
        config: SyncConfig,
        cancel: CancellationToken,
    ) -> (Self, watch::Receiver<Option<ChainHead>>) {
        let (head_tx, head_rx) = watch::channel(None);
        let backoff = config.backoff_floor;
        (
            Self {
                client,
                store,
                pipeline,
                cache,
                config,
                head_tx,
                cancel,
                backoff,
            },
            head_rx,
        )
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Drive the state machine until cancellation or a fatal error.
    #[instrument(target = "quarry::index::sync", skip_all)]
    pub async fn run(mut self) -> Result<(), SyncError> {
        let mut status = SyncStatus::Initializing;
        loop {
            if self.cancel.is_cancelled() {
                info!(target: EVENT_TARGET, "sync.cancelled");
                return Ok(());
            }
            status = match status {
                SyncStatus::Initializing => self.initialize()?,
                SyncStatus::Syncing => self.sync_once().await?,
                SyncStatus::Waiting => self.wait().await?,
                SyncStatus::Rebasing => self.rebase().await?,
                SyncStatus::Resetting => self.reset().await?,
            };
        }
    }

    fn initialize(&mut self) -> Result<SyncStatus, SyncError> {
        self.cache.clear();
        let state = self
            .store
            .app_state()
            .map_err(|err| SyncError::Fatal(err.to_string()))?;
        let head = state.filter(|state| state.level >= 0).map(|state| {
            info!(target: EVENT_TARGET, level = state.level, "sync.resuming");
            ChainHead {
                level: state.level,
                hash: state.hash,
            }
        });
        if head.is_none() {
            info!(target: EVENT_TARGET, "sync.starting_from_genesis");
        }
        let _ = self.head_tx.send(head);
        Ok(SyncStatus::Syncing)
    }

    /// Apply one block if the node is ahead, otherwise go idle.
    async fn sync_once(&mut self) -> Result<SyncStatus, SyncError> {
        let local = self.local_level();
        let remote = match self.client.head().await {
            Ok(header) => header,
            Err(err) => return self.handle_client_error(err).await,
        };
        if remote.level == local {
            // Equal height is not equal branch: an equal-length replacement
            // is only visible through the head hash.
            if local >= 0 && self.local_hash() != Some(remote.hash) {
                warn!(target: EVENT_TARGET, %local, "sync.fork_detected");
                return Ok(SyncStatus::Rebasing);
            }
            return Ok(SyncStatus::Waiting);
        }
        if remote.level < local {
            return Ok(SyncStatus::Waiting);
        }

        let next = local + 1;
        let raw = match self.client.block_at(next).await {
            Ok(raw) => raw,
            Err(err) => return self.handle_client_error(err).await,
        };

        match self
            .pipeline
            .commit_block(&self.store, &mut self.cache, &raw)
        {
            Ok(level) => {
                self.backoff = self.config.backoff_floor;
                debug!(target: EVENT_TARGET, %level, "sync.applied");
                self.publish_head();
                self.verify_checkpoint(level).await?;
                Ok(SyncStatus::Syncing)
            }
            Err(err) => match classify_commit(&err) {
                Disposition::Rebase => {
                    warn!(target: EVENT_TARGET, %next, %err, "sync.fork_detected");
                    Ok(SyncStatus::Rebasing)
                }
                Disposition::Retry => {
                    self.pause().await;
                    Ok(SyncStatus::Syncing)
                }
                Disposition::Fatal(reason) => {
                    error!(target: EVENT_TARGET, %reason, "sync.fatal");
                    Err(SyncError::Fatal(reason))
                }
            },
        }
    }

    async fn wait(&mut self) -> Result<SyncStatus, SyncError> {
        let local = self.local_level();
        let updated = tokio::select! {
            () = self.cancel.cancelled() => return Ok(SyncStatus::Waiting),
            updated = self.client.has_updates(local) => updated,
        };
        match updated {
            Ok(true) => Ok(SyncStatus::Syncing),
            Ok(false) => {
                tokio::select! {
                    () = self.cancel.cancelled() => {}
                    () = tokio::time::sleep(self.config.poll_interval) => {}
                }
                // Back through sync_once so the head hash is re-compared
                // every poll; a same-height branch switch does not change
                // the level.
                Ok(SyncStatus::Syncing)
            }
            Err(err) => {
                if let Disposition::Fatal(reason) = classify_client(&err) {
                    return Err(SyncError::Fatal(reason));
                }
                self.pause().await;
                Ok(SyncStatus::Waiting)
            }
        }
    }

    /// Walk backwards until the local head matches the remote branch, then
    /// resume applying. A block is reverted only once the node demonstrably
    /// carries a *different* block at our head level; a node that merely
    /// lacks the level (lagging, pruned, restarting) makes us wait, not
    /// unwind. Bounded by genesis; running out of blocks to revert means
    /// local state is unusable.
    async fn rebase(&mut self) -> Result<SyncStatus, SyncError> {
        let level = self.local_level();
        if level < 0 {
            warn!(target: EVENT_TARGET, "rebase.exhausted");
            return Ok(SyncStatus::Resetting);
        }

        match self.client.header_at(level).await {
            Ok(header) => {
                if self.local_hash() == Some(header.hash) {
                    // Reconverged; anything above this level is new work.
                    return Ok(SyncStatus::Syncing);
                }
            }
            Err(ClientError::NotFound(_)) | Err(ClientError::Unreachable(_)) => {
                self.pause().await;
                return Ok(SyncStatus::Rebasing);
            }
            Err(ClientError::Malformed(reason)) => return Err(SyncError::Fatal(reason)),
        }

        match self
            .pipeline
            .revert_last_block(&self.store, &mut self.cache)
        {
            Ok(new_level) => {
                info!(target: EVENT_TARGET, level = new_level, "rebase.reverted");
                self.publish_head();
                Ok(SyncStatus::Rebasing)
            }
            Err(err) => Err(SyncError::Fatal(err.to_string())),
        }
    }

    /// Cross-check local aggregates against the node's checkpoint for
    /// `level`. A node without the endpoint, or temporarily unreachable, is
    /// skipped; a node that answers and disagrees stops the loop.
    async fn verify_checkpoint(&mut self, level: Level) -> Result<(), SyncError> {
        let every = self.config.checkpoint_every;
        if every == 0 || level <= 0 || level % every as Level != 0 {
            return Ok(());
        }
        let checkpoint = match self.client.checkpoint(level).await {
            Ok(checkpoint) => checkpoint,
            Err(ClientError::NotFound(_)) | Err(ClientError::Unreachable(_)) => return Ok(()),
            Err(ClientError::Malformed(reason)) => return Err(SyncError::Fatal(reason)),
        };
        let findings = diagnostics::verify_checkpoint(&self.store, &checkpoint)
            .map_err(|err| SyncError::Fatal(err.to_string()))?;
        if let Some(finding) = findings.first() {
            error!(target: EVENT_TARGET, %level, %finding, "sync.diverged");
            return Err(SyncError::Diverged(finding.to_string()));
        }
        Ok(())
    }

    /// In-memory state is treated as poisoned; drop it and start over from
    /// whatever the store holds.
    async fn reset(&mut self) -> Result<SyncStatus, SyncError> {
        warn!(target: EVENT_TARGET, "sync.resetting");
        self.cache.clear();
        self.pause().await;
        Ok(SyncStatus::Initializing)
    }

    fn local_level(&self) -> Level {
        match self.head_tx.borrow().as_ref() {
            Some(head) => head.level,
            None => -1,
        }
    }

    fn local_hash(&self) -> Option<BlockHash> {
        self.head_tx.borrow().as_ref().map(|head| head.hash)
    }

    fn publish_head(&mut self) {
        let head = self
            .cache
            .app_state()
            .filter(|state| state.level >= 0)
            .map(|state| ChainHead {
                level: state.level,
                hash: state.hash,
            });
        let _ = self.head_tx.send(head);
    }

    async fn handle_client_error(&mut self, err: ClientError) -> Result<SyncStatus, SyncError> {
        match classify_client(&err) {
            Disposition::Retry => {
                debug!(target: EVENT_TARGET, %err, "sync.retrying");
                self.pause().await;
                Ok(SyncStatus::Syncing)
            }
            Disposition::Rebase => {
                warn!(target: EVENT_TARGET, %err, "sync.fork_detected");
                Ok(SyncStatus::Rebasing)
            }
            Disposition::Fatal(reason) => Err(SyncError::Fatal(reason)),
        }
    }

    /// Bounded exponential backoff, reset whenever a block lands.
    async fn pause(&mut self) {
        let delay = self.backoff;
        self.backoff = (self.backoff * 2).min(self.config.backoff_ceiling);
        tokio::select! {
            () = self.cancel.cancelled() => {}
            () = tokio::time::sleep(delay) => {}
        }
    }
}
