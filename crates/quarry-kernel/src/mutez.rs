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

/// Amounts, in the chain's smallest unit. Deliberately signed: balance
/// *changes* can legitimately be negative (slashing, reverts), and keeping a
/// single numeric type for balances and deltas avoids conversion traps. The
/// non-negativity of materialized balances is enforced where balances are
/// mutated, not by the type.
pub type Mutez = i64;

pub const ONE_COIN: Mutez = 1_000_000;
