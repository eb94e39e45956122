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

use intrusive_collections::LinkedList;
use repocache_common::{
    code::{Key, Persistent},
    strict_assert,
};
use serde::{Deserialize, Serialize};

use super::{Eviction, Op};
use crate::record::{Record, RecordAdapter};

/// Lru eviction algorithm config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LruConfig {}

/// Least-recently-used order of soft records.
///
/// A lookup hit moves the record to the most-recently-used end, so lookups take the shard write lock.
pub struct Lru<K, V>
where
    K: Key,
    V: Persistent,
{
    list: LinkedList<RecordAdapter<K, V>>,
    len: usize,
}

impl<K, V> Eviction for Lru<K, V>
where
    K: Key,
    V: Persistent,
{
    type Config = LruConfig;
    type Key = K;
    type Value = V;

    fn new(_: &Self::Config) -> Self {
        Self {
            list: LinkedList::new(RecordAdapter::new()),
            len: 0,
        }
    }

    fn push(&mut self, record: Arc<Record<K, V>>) {
        strict_assert!(!record.link.is_linked());
        strict_assert!(!record.is_pinned());

        record.set_in_eviction(true);
        self.list.push_back(record);
        self.len += 1;
    }

    fn pop(&mut self) -> Option<Arc<Record<K, V>>> {
        let record = self.list.pop_front()?;
        strict_assert!(!record.link.is_linked());

        record.set_in_eviction(false);
        self.len -= 1;

        Some(record)
    }

    fn remove(&mut self, record: &Arc<Record<K, V>>) {
        strict_assert!(record.link.is_linked());

        // SAFETY: the record is linked, and only the lists of this shard link records.
        let r = unsafe { self.list.cursor_mut_from_ptr(Arc::as_ptr(record)).remove() };
        strict_assert!(r.is_some());

        record.set_in_eviction(false);
        self.len -= 1;
    }

    fn len(&self) -> usize {
        self.len
    }

    fn acquire() -> Op<Self> {
        Op::mutable(|this: &mut Self, record| {
            if !record.is_in_eviction() {
                return;
            }

            strict_assert!(record.link.is_linked());

            // Move the record to the most-recently-used end.
            // SAFETY: the record is in the eviction container of this shard.
            if let Some(r) = unsafe { this.list.cursor_mut_from_ptr(Arc::as_ptr(record)).remove() } {
                this.list.push_back(r);
            }
        })
    }
}

#[cfg(test)]
pub mod tests {
    use itertools::Itertools;
    use repocache_common::key::PathKey;

    use super::*;
    use crate::{
        eviction::test_utils::{assert_ptr_eq, assert_ptr_vec_eq, dump_list, TestEviction},
        record::{Data, ReferenceMode},
    };

    impl<K, V> TestEviction for Lru<K, V>
    where
        K: Key,
        V: Persistent,
    {
        fn dump(&self) -> Vec<Arc<Record<K, V>>> {
            dump_list(&self.list)
        }
    }

    type TestLru = Lru<PathKey, u64>;

    fn record(i: u64) -> Arc<Record<PathKey, u64>> {
        Arc::new(Record::new(Data {
            key: PathKey::new(0, [format!("r{i}")]),
            value: i,
            mode: ReferenceMode::Soft,
            context: 0,
            hash: i,
            weight: 1,
        }))
    }

    fn access(lru: &mut TestLru, record: &Arc<Record<PathKey, u64>>) {
        match TestLru::acquire() {
            Op::Mutable(mut f) => f(lru, record),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_lru() {
        let rs = (0..8).map(record).collect_vec();
        let r = |i: usize| rs[i].clone();

        let mut lru = TestLru::new(&LruConfig::default());

        // [0, 1, 2, 3]
        lru.push(r(0));
        lru.push(r(1));
        lru.push(r(2));
        lru.push(r(3));
        assert_eq!(lru.len(), 4);
        assert_ptr_vec_eq(lru.dump(), vec![r(0), r(1), r(2), r(3)]);

        // [2, 3, 0]
        let p = lru.pop().unwrap();
        assert_ptr_eq(&p, &r(0));
        assert!(!p.is_in_eviction());
        lru.push(p);
        let p = lru.pop().unwrap();
        assert_ptr_eq(&p, &r(1));
        assert_ptr_vec_eq(lru.dump(), vec![r(2), r(3), r(0)]);

        // [3, 0, 2]
        access(&mut lru, &r(2));
        assert_ptr_vec_eq(lru.dump(), vec![r(3), r(0), r(2)]);

        // [3, 2]
        lru.remove(&r(0));
        assert!(!r(0).is_in_eviction());
        assert_eq!(lru.len(), 2);
        assert_ptr_vec_eq(lru.dump(), vec![r(3), r(2)]);

        // Access on a record out of the container is ignored.
        access(&mut lru, &r(5));
        assert_ptr_vec_eq(lru.dump(), vec![r(3), r(2)]);

        lru.clear();
        assert!(lru.is_empty());
        assert!(lru.dump().is_empty());
        assert!(rs.iter().all(|r| !r.is_in_eviction()));
    }
}
