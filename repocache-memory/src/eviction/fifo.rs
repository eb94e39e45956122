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

/// Fifo eviction algorithm config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FifoConfig {}

/// Insertion order of soft records. Lookups do not reorder.
pub struct Fifo<K, V>
where
    K: Key,
    V: Persistent,
{
    queue: LinkedList<RecordAdapter<K, V>>,
    len: usize,
}

impl<K, V> Eviction for Fifo<K, V>
where
    K: Key,
    V: Persistent,
{
    type Config = FifoConfig;
    type Key = K;
    type Value = V;

    fn new(_: &Self::Config) -> Self {
        Self {
            queue: LinkedList::new(RecordAdapter::new()),
            len: 0,
        }
    }

    fn push(&mut self, record: Arc<Record<K, V>>) {
        strict_assert!(!record.link.is_linked());
        strict_assert!(!record.is_pinned());

        record.set_in_eviction(true);
        self.queue.push_back(record);
        self.len += 1;
    }

    fn pop(&mut self) -> Option<Arc<Record<K, V>>> {
        let record = self.queue.pop_front()?;
        record.set_in_eviction(false);
        self.len -= 1;
        Some(record)
    }

    fn remove(&mut self, record: &Arc<Record<K, V>>) {
        strict_assert!(record.link.is_linked());

        // SAFETY: the record is linked, and only the queue of this shard links records.
        let r = unsafe { self.queue.cursor_mut_from_ptr(Arc::as_ptr(record)).remove() };
        strict_assert!(r.is_some());

        record.set_in_eviction(false);
        self.len -= 1;
    }

    fn len(&self) -> usize {
        self.len
    }

    fn acquire() -> Op<Self> {
        Op::noop()
    }
}

#[cfg(test)]
pub mod tests {
    use itertools::Itertools;
    use repocache_common::key::PathKey;

    use super::*;
    use crate::{
        eviction::test_utils::{assert_ptr_vec_eq, dump_list, TestEviction},
        record::{Data, ReferenceMode},
    };

    impl<K, V> TestEviction for Fifo<K, V>
    where
        K: Key,
        V: Persistent,
    {
        fn dump(&self) -> Vec<Arc<Record<K, V>>> {
            dump_list(&self.queue)
        }
    }

    type TestFifo = Fifo<PathKey, u64>;

    #[test]
    fn test_fifo() {
        let rs = (0..8)
            .map(|i| {
                Arc::new(Record::new(Data {
                    key: PathKey::new(0, [format!("r{i}")]),
                    value: i,
                    mode: ReferenceMode::Soft,
                    context: 0,
                    hash: i,
                    weight: 1,
                }))
            })
            .collect_vec();
        let r = |i: usize| rs[i].clone();

        let mut fifo = TestFifo::new(&FifoConfig::default());
        assert!(matches!(TestFifo::acquire(), Op::Noop));

        // [0, 1, 2, 3]
        fifo.push(r(0));
        fifo.push(r(1));
        fifo.push(r(2));
        fifo.push(r(3));
        assert_ptr_vec_eq(fifo.dump(), vec![r(0), r(1), r(2), r(3)]);

        // [1, 3]
        let p = fifo.pop().unwrap();
        assert!(Arc::ptr_eq(&p, &r(0)));
        fifo.remove(&r(2));
        assert_eq!(fifo.len(), 2);
        assert_ptr_vec_eq(fifo.dump(), vec![r(1), r(3)]);

        // [1, 3, 4, 0]
        fifo.push(r(4));
        fifo.push(r(0));
        assert_ptr_vec_eq(fifo.dump(), vec![r(1), r(3), r(4), r(0)]);

        fifo.clear();
        assert!(fifo.is_empty());
        assert!(rs.iter().all(|r| !r.is_in_eviction()));
    }
}
