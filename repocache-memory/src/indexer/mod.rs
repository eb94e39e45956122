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

use std::sync::Arc;

use repocache_common::code::{Key, Persistent, UnitId};

use crate::record::Record;

/// Index of the records of a shard.
///
/// Lookups take the context unit id the key identity is evaluated in. Stored records are compared in their own
/// context, see [`Record::context`].
pub trait Indexer: Send + Sync + 'static + Default {
    /// Cache key.
    type Key: Key;
    /// Cache value.
    type Value: Persistent;

    /// Insert a record, returning the record it replaced, if any.
    fn insert(&mut self, record: Arc<Record<Self::Key, Self::Value>>) -> Option<Arc<Record<Self::Key, Self::Value>>>;
    /// Find the record of `key` evaluated in `context`.
    fn get(&self, hash: u64, key: &Self::Key, context: UnitId) -> Option<&Arc<Record<Self::Key, Self::Value>>>;
    /// Remove the record of `key` evaluated in `context`.
    fn remove(&mut self, hash: u64, key: &Self::Key, context: UnitId) -> Option<Arc<Record<Self::Key, Self::Value>>>;
    /// Remove all records.
    fn drain(&mut self) -> impl Iterator<Item = Arc<Record<Self::Key, Self::Value>>>;
    /// Count of records.
    fn len(&self) -> usize;
    /// Check if there is no record.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub mod hash_table;
pub mod sentry;
