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

//! Implementations of the engine's [`quarry_index::ChainClient`]: an HTTP
//! client for real nodes, and (behind `test-utils`) a scriptable in-memory
//! chain for exercising the sync loop.

pub mod http;

#[cfg(any(test, feature = "test-utils"))]
pub mod fake;

pub use http::HttpClient;
