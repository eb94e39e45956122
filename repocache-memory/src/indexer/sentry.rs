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

use repocache_common::{code::UnitId, strict_assert};

use super::Indexer;
use crate::record::Record;

/// [`Sentry`] is a guard for all [`Indexer`] implementations to set `IN_INDEXER` flag properly.
pub struct Sentry<I>
where
    I: Indexer,
{
    indexer: I,
}

impl<I> Default for Sentry<I>
where
    I: Indexer,
{
    fn default() -> Self {
        Self { indexer: I::default() }
    }
}

impl<I> Indexer for Sentry<I>
where
    I: Indexer,
{
    type Key = I::Key;
    type Value = I::Value;

    fn insert(&mut self, record: Arc<Record<Self::Key, Self::Value>>) -> Option<Arc<Record<Self::Key, Self::Value>>> {
        strict_assert!(!record.is_in_indexer());
        record.set_in_indexer(true);
        self.indexer.insert(record).inspect(|old| {
            strict_assert!(old.is_in_indexer());
            old.set_in_indexer(false);
        })
    }

    fn get(&self, hash: u64, key: &Self::Key, context: UnitId) -> Option<&Arc<Record<Self::Key, Self::Value>>> {
        self.indexer.get(hash, key, context).inspect(|r| {
            strict_assert!(r.is_in_indexer());
        })
    }

    fn remove(&mut self, hash: u64, key: &Self::Key, context: UnitId) -> Option<Arc<Record<Self::Key, Self::Value>>> {
        self.indexer.remove(hash, key, context).inspect(|r| {
            strict_assert!(r.is_in_indexer());
            r.set_in_indexer(false)
        })
    }

    fn drain(&mut self) -> impl Iterator<Item = Arc<Record<Self::Key, Self::Value>>> {
        self.indexer.drain().inspect(|r| {
            strict_assert!(r.is_in_indexer());
            r.set_in_indexer(false)
        })
    }

    fn len(&self) -> usize {
        self.indexer.len()
    }
}
