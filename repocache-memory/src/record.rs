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

use std::{
    fmt::Debug,
    sync::atomic::{AtomicU64, Ordering},
};

use bitflags::bitflags;
use intrusive_collections::{intrusive_adapter, LinkedListAtomicLink};
use repocache_common::code::{Key, Persistent, UnitId};
use serde::{Deserialize, Serialize};

/// How strongly the cache holds an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceMode {
    /// The entry can be evicted for capacity and is dropped by a sweep.
    Soft,
    /// The entry is never evicted automatically. Only an explicit `put`, `remove` or `clear` lets it go.
    Pinned,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct Flags: u64 {
        const IN_INDEXER = 0b00000001;
        const IN_EVICTION = 0b00000010;
    }
}

pub struct Data<K, V> {
    pub key: K,
    pub value: V,
    pub mode: ReferenceMode,
    pub context: UnitId,
    pub hash: u64,
    pub weight: usize,
}

/// [`Record`] holds the information of the cached entry.
///
/// `context` is the unit id the table evaluated the key identity in when the record was created. It is kept so that
/// the record can be found again without consulting the unit scope.
pub struct Record<K, V> {
    data: Data<K, V>,
    pub(crate) link: LinkedListAtomicLink,
    flags: AtomicU64,
}

intrusive_adapter! { pub RecordAdapter<K, V> = std::sync::Arc<Record<K, V>>: Record<K, V> { link: LinkedListAtomicLink } where K: Key, V: Persistent }

impl<K, V> Debug for Record<K, V>
where
    K: Key,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("key", &self.data.key)
            .field("mode", &self.data.mode)
            .field("context", &self.data.context)
            .field("hash", &self.data.hash)
            .finish()
    }
}

impl<K, V> Record<K, V>
where
    K: Key,
    V: Persistent,
{
    /// Create a record with data.
    pub fn new(data: Data<K, V>) -> Self {
        Record {
            data,
            link: LinkedListAtomicLink::new(),
            flags: AtomicU64::new(0),
        }
    }

    /// Get the immutable reference of the record key.
    pub fn key(&self) -> &K {
        &self.data.key
    }

    /// Get the immutable reference of the record value.
    pub fn value(&self) -> &V {
        &self.data.value
    }

    pub fn mode(&self) -> ReferenceMode {
        self.data.mode
    }

    pub fn is_pinned(&self) -> bool {
        self.data.mode == ReferenceMode::Pinned
    }

    /// Get the context unit id the key identity is evaluated in.
    pub fn context(&self) -> UnitId {
        self.data.context
    }

    /// Get the record hash.
    pub fn hash(&self) -> u64 {
        self.data.hash
    }

    /// Get the record weight.
    pub fn weight(&self) -> usize {
        self.data.weight
    }

    /// Set in eviction flag with release memory order.
    pub fn set_in_eviction(&self, val: bool) {
        self.set_flags(Flags::IN_EVICTION, val, Ordering::Release);
    }

    /// Get in eviction flag with acquire memory order.
    pub fn is_in_eviction(&self) -> bool {
        self.get_flags(Flags::IN_EVICTION, Ordering::Acquire)
    }

    /// Set in indexer flag with release memory order.
    pub fn set_in_indexer(&self, val: bool) {
        self.set_flags(Flags::IN_INDEXER, val, Ordering::Release);
    }

    /// Get in indexer flag with acquire memory order.
    pub fn is_in_indexer(&self) -> bool {
        self.get_flags(Flags::IN_INDEXER, Ordering::Acquire)
    }

    /// Set the record atomic flags.
    pub fn set_flags(&self, flags: Flags, val: bool, order: Ordering) {
        match val {
            true => self.flags.fetch_or(flags.bits(), order),
            false => self.flags.fetch_and(!flags.bits(), order),
        };
    }

    /// Get the record atomic flags.
    pub fn get_flags(&self, flags: Flags, order: Ordering) -> bool {
        self.flags.load(order) & flags.bits() == flags.bits()
    }
}
