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

use hashbrown::hash_table::{Entry as HashTableEntry, HashTable};
use repocache_common::code::{Key, Persistent, UnitId};

use super::Indexer;
use crate::record::Record;

pub struct HashTableIndexer<K, V>
where
    K: Key,
    V: Persistent,
{
    table: HashTable<Arc<Record<K, V>>>,
}

impl<K, V> Default for HashTableIndexer<K, V>
where
    K: Key,
    V: Persistent,
{
    fn default() -> Self {
        Self {
            table: Default::default(),
        }
    }
}

impl<K, V> Indexer for HashTableIndexer<K, V>
where
    K: Key,
    V: Persistent,
{
    type Key = K;
    type Value = V;

    fn insert(&mut self, mut record: Arc<Record<K, V>>) -> Option<Arc<Record<K, V>>> {
        match self.table.entry(
            record.hash(),
            |r| r.key().equals_in(r.context(), record.key(), record.context()),
            |r| r.hash(),
        ) {
            HashTableEntry::Occupied(mut o) => {
                std::mem::swap(o.get_mut(), &mut record);
                Some(record)
            }
            HashTableEntry::Vacant(v) => {
                v.insert(record);
                None
            }
        }
    }

    fn get(&self, hash: u64, key: &K, context: UnitId) -> Option<&Arc<Record<K, V>>> {
        self.table.find(hash, |r| r.key().equals_in(r.context(), key, context))
    }

    fn remove(&mut self, hash: u64, key: &K, context: UnitId) -> Option<Arc<Record<K, V>>> {
        match self
            .table
            .entry(hash, |r| r.key().equals_in(r.context(), key, context), |r| r.hash())
        {
            HashTableEntry::Occupied(o) => {
                let (r, _) = o.remove();
                Some(r)
            }
            HashTableEntry::Vacant(_) => None,
        }
    }

    fn drain(&mut self) -> impl Iterator<Item = Arc<Record<K, V>>> {
        self.table.drain()
    }

    fn len(&self) -> usize {
        self.table.len()
    }
}

#[cfg(test)]
mod tests {
    use repocache_common::{
        code::{HashBuilderExt, Key},
        key::PathKey,
    };

    use super::*;
    use crate::record::{Data, ReferenceMode};

    fn record(key: PathKey, context: UnitId, value: u64) -> Arc<Record<PathKey, u64>> {
        let hash = ahash::RandomState::with_seeds(1, 2, 3, 4).hash_key_in(&key, context);
        Arc::new(Record::new(Data {
            key,
            value,
            mode: ReferenceMode::Soft,
            context,
            hash,
            weight: 1,
        }))
    }

    #[test]
    fn test_lookup_in_context() {
        let mut indexer = HashTableIndexer::default();

        let a = PathKey::new(1, ["ns", "a"]);
        let r1 = record(a.clone(), a.unit_id(), 1);
        assert!(indexer.insert(r1.clone()).is_none());

        // Same paths from another unit are another identity in their own context.
        let b = a.in_unit(2);
        let r2 = record(b.clone(), b.unit_id(), 2);
        assert!(indexer.insert(r2.clone()).is_none());
        assert_eq!(indexer.len(), 2);

        assert!(Arc::ptr_eq(indexer.get(r1.hash(), &a, 1).unwrap(), &r1));
        assert!(Arc::ptr_eq(indexer.get(r2.hash(), &b, 2).unwrap(), &r2));
        assert!(indexer.get(r1.hash(), &b, 2).is_none());

        // Replace in the same context.
        let r3 = record(a.clone(), 1, 3);
        let old = indexer.insert(r3.clone()).unwrap();
        assert!(Arc::ptr_eq(&old, &r1));
        assert_eq!(indexer.len(), 2);

        let removed = indexer.remove(r3.hash(), &a, 1).unwrap();
        assert!(Arc::ptr_eq(&removed, &r3));
        assert!(indexer.remove(r3.hash(), &a, 1).is_none());

        assert_eq!(indexer.drain().count(), 1);
        assert!(indexer.is_empty());
    }
}
