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

use anyhow::Context;
use clap::Parser;
use quarry_index::{
    diagnostics, ChainClient, ClientError, Pipeline, StagingCache, Store, SyncConfig, SyncLoop,
};
use quarry_kernel::ProtocolParameters;
use quarry_node::HttpClient;
use quarry_stores::MemoryStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const EVENT_TARGET: &str = "quarry";

#[derive(Debug, Parser)]
#[command(name = "quarry", about, version)]
struct Args {
    /// Base URL of the node to follow.
    #[arg(long, env = "QUARRY_NODE_URL", default_value = "http://127.0.0.1:8732")]
    node_url: String,

    /// Bounded size of the hot accounts cache.
    #[arg(long, env = "QUARRY_ACCOUNTS_CACHE", default_value_t = 32_768)]
    accounts_cache: u32,

    /// Idle delay between head polls, in milliseconds.
    #[arg(long, env = "QUARRY_POLL_INTERVAL_MS", default_value_t = 1_000)]
    poll_interval_ms: u64,

    /// How often to run the consistency diagnostics, in seconds. Zero
    /// disables them.
    #[arg(long, env = "QUARRY_DIAGNOSTICS_INTERVAL_S", default_value_t = 300)]
    diagnostics_interval_s: u64,

    /// Verify the node's checkpoint every this many applied levels. Zero
    /// disables the check.
    #[arg(long, env = "QUARRY_CHECKPOINT_EVERY", default_value_t = 4_096)]
    checkpoint_every: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    info!(target: EVENT_TARGET, node_url = %args.node_url, "starting");

    let client = HttpClient::new(&args.node_url)
        .with_context(|| format!("cannot build a client for {}", args.node_url))?;
    let store = Arc::new(MemoryStore::new());
    let pipeline = Pipeline::new(ProtocolParameters::default());
    let cache = StagingCache::new(args.accounts_cache);

    let cancel = CancellationToken::new();
    let config = SyncConfig {
        poll_interval: Duration::from_millis(args.poll_interval_ms),
        checkpoint_every: args.checkpoint_every,
        ..SyncConfig::default()
    };
    let diagnostics_client = client.clone();
    let (sync, mut head_rx) =
        SyncLoop::new(client, store.clone(), pipeline, cache, config, cancel.clone());

    // Progress reporter: one line per head change.
    let reporter = tokio::spawn(async move {
        while head_rx.changed().await.is_ok() {
            if let Some(head) = head_rx.borrow_and_update().clone() {
                info!(target: EVENT_TARGET, level = head.level, hash = %head.hash, "head");
            }
        }
    });

    // Periodic consistency sweep over the materialized rows, cross-checked
    // against the node's checkpoint. A finding means the materialized state
    // can no longer be trusted, so the sweep stops the whole process rather
    // than let the divergence grow.
    let diagnostics_store = store.clone();
    let diagnostics_cancel = cancel.clone();
    let interval = args.diagnostics_interval_s;
    let sweeper = tokio::spawn(async move {
        if interval == 0 {
            return;
        }
        let mut ticker = tokio::time::interval(Duration::from_secs(interval));
        loop {
            tokio::select! {
                () = diagnostics_cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }
            match sweep(diagnostics_store.as_ref(), &diagnostics_client).await {
                Ok(findings) if findings.is_empty() => {
                    info!(target: EVENT_TARGET, "diagnostics.clean");
                }
                Ok(findings) => {
                    for finding in &findings {
                        error!(target: EVENT_TARGET, %finding, "diagnostics.finding");
                    }
                    error!(target: EVENT_TARGET, count = findings.len(), "diagnostics.halting");
                    diagnostics_cancel.cancel();
                    return;
                }
                Err(err) => error!(target: EVENT_TARGET, %err, "diagnostics.failed"),
            }
        }
    });

    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(target: EVENT_TARGET, "interrupt received, shutting down");
            shutdown_cancel.cancel();
        }
    });

    let result = sync.run().await;
    cancel.cancel();
    reporter.abort();
    sweeper.abort();

    result.context("synchronization loop failed")
}

/// One diagnostics pass: internal reconciliation plus, when the node answers,
/// a cross-check against its checkpoint for our head level.
async fn sweep(
    store: &MemoryStore,
    client: &HttpClient,
) -> anyhow::Result<Vec<diagnostics::Finding>> {
    let mut findings = diagnostics::reconcile(store)?;
    findings.extend(diagnostics::verify_chain(store)?);

    if let Some(state) = store.app_state()?.filter(|state| state.level >= 0) {
        match client.checkpoint(state.level).await {
            Ok(checkpoint) => {
                // The head may advance between the fetch and the comparison;
                // a level skew here is staleness, not divergence.
                findings.extend(
                    diagnostics::verify_checkpoint(store, &checkpoint)?
                        .into_iter()
                        .filter(|finding| {
                            !matches!(finding, diagnostics::Finding::CheckpointLevelSkew { .. })
                        }),
                );
            }
            Err(ClientError::NotFound(_)) | Err(ClientError::Unreachable(_)) => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(findings)
}
