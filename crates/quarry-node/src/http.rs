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

//! HTTP access to a node. Response classification matters more than
//! transport details here: 404 means the level does not exist on the node's
//! branch, transport failures are retried by the caller, and an undecodable
//! body must never be treated as retryable.

use async_trait::async_trait;
use quarry_index::{ChainClient, ClientError};
use quarry_kernel::{Level, RawBlock, RawCheckpoint, RawHeader};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::trace;

const EVENT_TARGET: &str = "quarry::node::http";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct HttpClient {
    base: String,
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(base: impl Into<String>) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|err| ClientError::Unreachable(err.to_string()))?;
        Ok(Self {
            base: base.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        level: Option<Level>,
    ) -> Result<T, ClientError> {
        let url = format!("{}/{}", self.base, path);
        trace!(target: EVENT_TARGET, %url, "request");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| ClientError::Unreachable(err.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(level.unwrap_or(-1)));
        }
        if !response.status().is_success() {
            return Err(ClientError::Unreachable(format!(
                "{url}: status {}",
                response.status()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|err| ClientError::Malformed(format!("{url}: {err}")))
    }
}

#[async_trait]
impl ChainClient for HttpClient {
    async fn head(&self) -> Result<RawHeader, ClientError> {
        self.get("chains/main/blocks/head/header", None).await
    }

    async fn header_at(&self, level: Level) -> Result<RawHeader, ClientError> {
        self.get(&format!("chains/main/blocks/{level}/header"), Some(level))
            .await
    }

    async fn block_at(&self, level: Level) -> Result<RawBlock, ClientError> {
        self.get(&format!("chains/main/blocks/{level}"), Some(level))
            .await
    }

    async fn has_updates(&self, since: Level) -> Result<bool, ClientError> {
        Ok(self.head().await?.level > since)
    }

    async fn checkpoint(&self, level: Level) -> Result<RawCheckpoint, ClientError> {
        self.get(&format!("chains/main/checkpoints/{level}"), Some(level))
            .await
    }
}
