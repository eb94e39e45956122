// Copyright 2025 repocache Project Authors
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

//! This crate provides a concurrent in-memory repository cache component for repocache.
//!
//! Entries are looked up by the identity of their keys within a unit context. An entry is either soft, reclaimable
//! by capacity eviction and by a sweep, or pinned, kept until it is removed or replaced.
//!
//! The in-memory cache is sharded. Each shard owns an indexer and an eviction container behind a reader-writer lock.
//! Soft records live in both, pinned records only in the indexer.

mod cache;
mod eviction;
mod indexer;
mod prelude;
mod raw;
mod record;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use prelude::*;
