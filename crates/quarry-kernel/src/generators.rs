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

//! Proptest generators shared across the workspace's property tests.

use crate::{Address, Hash, Mutez};
use proptest::prelude::*;

pub fn any_hash32() -> impl Strategy<Value = Hash<32>> {
    any::<[u8; 32]>().prop_map(Hash::new)
}

pub fn any_address() -> impl Strategy<Value = Address> {
    ("(tz1|tz2|tz3)", "[a-zA-Z0-9]{12}")
        .prop_map(|(prefix, payload)| Address::new(format!("{prefix}{payload}")))
}

pub fn any_contract_address() -> impl Strategy<Value = Address> {
    "[a-zA-Z0-9]{12}".prop_map(|payload| Address::new(format!("KT1{payload}")))
}

pub fn any_amount() -> impl Strategy<Value = Mutez> {
    0_i64..1_000_000_000
}
