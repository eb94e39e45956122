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
use itertools::Itertools;

use super::Eviction;
use crate::record::{Record, RecordAdapter};

pub trait TestEviction: Eviction {
    /// Records in the container, from the next victim to the last one.
    fn dump(&self) -> Vec<Arc<Record<Self::Key, Self::Value>>>;
}

pub fn dump_list<K, V>(list: &LinkedList<RecordAdapter<K, V>>) -> Vec<Arc<Record<K, V>>>
where
    K: repocache_common::code::Key,
    V: repocache_common::code::Persistent,
{
    let mut records = vec![];
    let mut cursor = list.cursor();
    loop {
        cursor.move_next();
        match cursor.clone_pointer() {
            Some(record) => records.push(record),
            None => break,
        }
    }
    records
}

pub fn assert_ptr_eq<T>(a: &Arc<T>, b: &Arc<T>) {
    assert_eq!(Arc::as_ptr(a), Arc::as_ptr(b));
}

pub fn assert_ptr_vec_eq<T>(va: Vec<Arc<T>>, vb: Vec<Arc<T>>) {
    let trans = |v: Vec<Arc<T>>| v.iter().map(Arc::as_ptr).collect_vec();
    assert_eq!(trans(va), trans(vb));
}
