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

use std::{fmt::Debug, ops::Deref, sync::Arc};

use itertools::Itertools;
use parking_lot::RwLock;
use repocache_common::{
    code::{HashBuilder, HashBuilderExt, Key, Persistent, UnitId},
    event::{Event, EventListener},
    metrics::model::Metrics,
    scope::Scope,
    strict_assert,
};

use crate::{
    eviction::{Eviction, Op},
    indexer::{sentry::Sentry, Indexer},
    record::{Data, Record, ReferenceMode},
};

/// The weighter for the in-memory cache.
///
/// The weighter is used to calculate the weight of the cache entry. Only soft entries count towards the usage.
pub trait Weighter<K, V>: Fn(&K, &V) -> usize + Send + Sync + 'static {}
impl<K, V, T> Weighter<K, V> for T where T: Fn(&K, &V) -> usize + Send + Sync + 'static {}

/// The unit scope of the in-memory cache.
///
/// Maps the unit id a key was created in to the context unit id the key identity is evaluated in. A cache applies
/// the same unit scope for its whole lifetime.
///
/// e.g. `|_| 0` makes keys from all units with equal paths collide, the identity `|unit| unit` keeps units apart.
pub trait UnitScope: Fn(UnitId) -> UnitId + Send + Sync + 'static {}
impl<T> UnitScope for T where T: Fn(UnitId) -> UnitId + Send + Sync + 'static {}

type Garbage<K, V> = (Event, Arc<Record<K, V>>);
type RecordRef<E> = Arc<Record<<E as Eviction>::Key, <E as Eviction>::Value>>;

pub struct RawCacheConfig<E, S>
where
    E: Eviction,
    S: HashBuilder,
{
    pub capacity: usize,
    pub shards: usize,
    pub eviction_config: E::Config,
    pub hash_builder: S,
    pub weighter: Arc<dyn Weighter<E::Key, E::Value>>,
    pub unit_scope: Arc<dyn UnitScope>,
    pub event_listener: Option<Arc<dyn EventListener<Key = E::Key, Value = E::Value>>>,
    pub metrics: Arc<Metrics>,
}

struct RawCacheShard<E, I>
where
    E: Eviction,
    I: Indexer<Key = E::Key, Value = E::Value>,
{
    eviction: E,
    indexer: Sentry<I>,

    /// Weight of the soft records.
    usage: usize,
    capacity: usize,
    /// Count of the pinned records.
    pinned: usize,

    metrics: Arc<Metrics>,
}

impl<E, I> RawCacheShard<E, I>
where
    E: Eviction,
    I: Indexer<Key = E::Key, Value = E::Value>,
{
    /// Evict soft records to fit the target usage.
    fn evict(&mut self, target: usize, garbages: &mut Vec<Garbage<E::Key, E::Value>>) {
        while self.usage > target {
            let evicted = match self.eviction.pop() {
                Some(evicted) => evicted,
                None => break,
            };
            self.metrics.memory_evict.increase(1);
            self.unindex(evicted, Event::Evict, garbages);
        }
    }

    /// Drop all soft records.
    fn sweep(&mut self, garbages: &mut Vec<Garbage<E::Key, E::Value>>) {
        while let Some(swept) = self.eviction.pop() {
            self.metrics.memory_sweep.increase(1);
            self.unindex(swept, Event::Sweep, garbages);
        }
        strict_assert!(self.usage == 0);
    }

    /// Remove a soft record that has just left the eviction container from the indexer.
    fn unindex(
        &mut self,
        record: Arc<Record<E::Key, E::Value>>,
        event: Event,
        garbages: &mut Vec<Garbage<E::Key, E::Value>>,
    ) {
        let removed = self.indexer.remove(record.hash(), record.key(), record.context());
        strict_assert!(removed.is_some_and(|r| Arc::ptr_eq(&r, &record)));

        strict_assert!(!record.is_in_indexer());
        strict_assert!(!record.is_in_eviction());

        self.usage -= record.weight();
        self.metrics.memory_usage.decrease(record.weight() as _);

        garbages.push((event, record));
    }

    /// Account a record that has just entered the indexer.
    fn attach(&mut self, record: Arc<Record<E::Key, E::Value>>) {
        strict_assert!(record.is_in_indexer());
        strict_assert!(!record.is_in_eviction());

        match record.mode() {
            ReferenceMode::Pinned => {
                self.pinned += 1;
                self.metrics.memory_hang.increase(1);
                self.metrics.memory_pinned.increase(1);
            }
            ReferenceMode::Soft => {
                self.usage += record.weight();
                self.metrics.memory_usage.increase(record.weight() as _);
                self.eviction.push(record);
            }
        }
    }

    /// Release the accounting of a record that has just left the indexer.
    fn detach(&mut self, record: &Arc<Record<E::Key, E::Value>>) {
        strict_assert!(!record.is_in_indexer());

        match record.mode() {
            ReferenceMode::Pinned => {
                strict_assert!(!record.is_in_eviction());
                self.pinned -= 1;
                self.metrics.memory_pinned.decrease(1);
            }
            ReferenceMode::Soft => {
                strict_assert!(record.is_in_eviction());
                self.eviction.remove(record);
                self.usage -= record.weight();
                self.metrics.memory_usage.decrease(record.weight() as _);
            }
        }

        strict_assert!(!record.is_in_eviction());
    }

    fn emplace(&mut self, record: Arc<Record<E::Key, E::Value>>, garbages: &mut Vec<Garbage<E::Key, E::Value>>) {
        if let Some(old) = self.indexer.insert(record.clone()) {
            self.metrics.memory_replace.increase(1);
            self.detach(&old);
            garbages.push((Event::Replace, old));
        } else {
            self.metrics.memory_insert.increase(1);
        }

        let soft = !record.is_pinned();
        self.attach(record);

        // Pinned records never change the soft usage.
        if soft {
            self.evict(self.capacity, garbages);
        }
    }

    /// Emplace the record if there is no live record with the same identity.
    ///
    /// Returns the live record on conflict.
    fn emplace_if_absent(
        &mut self,
        record: Arc<Record<E::Key, E::Value>>,
        garbages: &mut Vec<Garbage<E::Key, E::Value>>,
    ) -> Option<Arc<Record<E::Key, E::Value>>> {
        if let Some(live) = self.indexer.get(record.hash(), record.key(), record.context()) {
            self.metrics.memory_reject.increase(1);
            return Some(live.clone());
        }
        self.emplace(record, garbages);
        None
    }

    #[cfg_attr(feature = "tracing", fastrace::trace(name = "repocache::memory::raw::shard::remove"))]
    fn remove(&mut self, hash: u64, key: &E::Key, context: UnitId) -> Option<Arc<Record<E::Key, E::Value>>> {
        let record = self.indexer.remove(hash, key, context)?;

        self.detach(&record);
        self.metrics.memory_remove.increase(1);

        Some(record)
    }

    #[cfg_attr(feature = "tracing", fastrace::trace(name = "repocache::memory::raw::shard::get_noop"))]
    fn get_noop(&self, hash: u64, key: &E::Key, context: UnitId) -> Option<Arc<Record<E::Key, E::Value>>> {
        self.get_inner(hash, key, context)
    }

    #[cfg_attr(
        feature = "tracing",
        fastrace::trace(name = "repocache::memory::raw::shard::get_immutable")
    )]
    fn get_immutable(&self, hash: u64, key: &E::Key, context: UnitId) -> Option<Arc<Record<E::Key, E::Value>>> {
        self.get_inner(hash, key, context)
            .inspect(|record| self.acquire_immutable(record))
    }

    #[cfg_attr(
        feature = "tracing",
        fastrace::trace(name = "repocache::memory::raw::shard::get_mutable")
    )]
    fn get_mutable(&mut self, hash: u64, key: &E::Key, context: UnitId) -> Option<Arc<Record<E::Key, E::Value>>> {
        self.get_inner(hash, key, context)
            .inspect(|record| self.acquire_mutable(record))
    }

    fn get_inner(&self, hash: u64, key: &E::Key, context: UnitId) -> Option<Arc<Record<E::Key, E::Value>>> {
        let record = match self.indexer.get(hash, key, context).cloned() {
            Some(record) => {
                self.metrics.memory_hit.increase(1);
                record
            }
            None => {
                self.metrics.memory_miss.increase(1);
                return None;
            }
        };

        strict_assert!(record.is_in_indexer());

        Some(record)
    }

    #[cfg_attr(feature = "tracing", fastrace::trace(name = "repocache::memory::raw::shard::clear"))]
    fn clear(&mut self, garbages: &mut Vec<Garbage<E::Key, E::Value>>) {
        let records = self.indexer.drain().collect_vec();
        self.eviction.clear();

        self.metrics.memory_usage.decrease(self.usage as _);
        self.metrics.memory_pinned.decrease(self.pinned as _);
        self.metrics.memory_remove.increase(records.len() as _);
        self.usage = 0;
        self.pinned = 0;

        for record in records {
            strict_assert!(!record.is_in_indexer());
            strict_assert!(!record.is_in_eviction());
            garbages.push((Event::Clear, record));
        }
    }

    fn acquire_immutable(&self, record: &Arc<Record<E::Key, E::Value>>) {
        match E::acquire() {
            Op::Immutable(f) => f(&self.eviction, record),
            _ => unreachable!(),
        }
    }

    fn acquire_mutable(&mut self, record: &Arc<Record<E::Key, E::Value>>) {
        match E::acquire() {
            Op::Mutable(mut f) => f(&mut self.eviction, record),
            _ => unreachable!(),
        }
    }
}

struct RawCacheInner<E, S, I>
where
    E: Eviction,
    S: HashBuilder,
    I: Indexer<Key = E::Key, Value = E::Value>,
{
    shards: Vec<RwLock<RawCacheShard<E, I>>>,

    capacity: usize,

    hash_builder: Arc<S>,
    weighter: Arc<dyn Weighter<E::Key, E::Value>>,
    unit_scope: Arc<dyn UnitScope>,

    metrics: Arc<Metrics>,
    event_listener: Option<Arc<dyn EventListener<Key = E::Key, Value = E::Value>>>,
}

impl<E, S, I> RawCacheInner<E, S, I>
where
    E: Eviction,
    S: HashBuilder,
    I: Indexer<Key = E::Key, Value = E::Value>,
{
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "repocache::memory::raw::inner::clear"))]
    fn clear(&self) {
        let mut garbages = vec![];

        self.shards
            .iter()
            .for_each(|shard| shard.write().with(|mut shard| shard.clear(&mut garbages)));

        self.notify(garbages);
    }

    /// Notify the event listener and drop the records.
    ///
    /// Must be called out of the shard lock critical section.
    fn notify(&self, garbages: Vec<Garbage<E::Key, E::Value>>) {
        if let Some(listener) = self.event_listener.as_ref() {
            for (event, record) in garbages {
                listener.on_leave(event, record.key(), record.value());
            }
        }
    }
}

impl<E, S, I> Drop for RawCacheInner<E, S, I>
where
    E: Eviction,
    S: HashBuilder,
    I: Indexer<Key = E::Key, Value = E::Value>,
{
    fn drop(&mut self) {
        self.clear();
    }
}

/// The sharded table of cache entries.
///
/// Every operation on a key locks the one shard the key maps to, so operations on the same key are linearizable and
/// operations on keys of different shards never contend.
pub struct RawCache<E, S, I>
where
    E: Eviction,
    S: HashBuilder,
    I: Indexer<Key = E::Key, Value = E::Value>,
{
    inner: Arc<RawCacheInner<E, S, I>>,
}

impl<E, S, I> Clone for RawCache<E, S, I>
where
    E: Eviction,
    S: HashBuilder,
    I: Indexer<Key = E::Key, Value = E::Value>,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E, S, I> RawCache<E, S, I>
where
    E: Eviction,
    S: HashBuilder,
    I: Indexer<Key = E::Key, Value = E::Value>,
{
    pub fn new(config: RawCacheConfig<E, S>) -> Self {
        assert!(config.shards > 0, "shards must be greater than zero.");

        let shards = (0..config.shards)
            .map(|index| Self::shard_capacity_for(config.capacity, config.shards, index))
            .map(|capacity| RawCacheShard {
                eviction: E::new(&config.eviction_config),
                indexer: Sentry::default(),
                usage: 0,
                capacity,
                pinned: 0,
                metrics: config.metrics.clone(),
            })
            .map(RwLock::new)
            .collect_vec();

        let inner = RawCacheInner {
            shards,
            capacity: config.capacity,
            hash_builder: Arc::new(config.hash_builder),
            weighter: config.weighter,
            unit_scope: config.unit_scope,
            metrics: config.metrics,
            event_listener: config.event_listener,
        };

        Self { inner: Arc::new(inner) }
    }

    /// Install a soft entry, replacing any live entry of the key.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "repocache::memory::raw::put"))]
    pub fn put(&self, key: E::Key, value: E::Value) {
        self.emplace(self.record(key, value, ReferenceMode::Soft));
    }

    /// Install a pinned entry, replacing any live entry of the key.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "repocache::memory::raw::hang"))]
    pub fn hang(&self, key: E::Key, value: E::Value) {
        self.emplace(self.record(key, value, ReferenceMode::Pinned));
    }

    /// Install a soft entry only if the key has no live entry.
    ///
    /// Returns `true` if the entry is installed. Among racing callers on the same key, exactly one wins.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "repocache::memory::raw::put_if_absent"))]
    pub fn put_if_absent(&self, key: E::Key, value: E::Value) -> bool {
        self.emplace_if_absent(self.record(key, value, ReferenceMode::Soft))
            .is_ok()
    }

    /// Install a soft entry if the key has no live entry, and return the entry that wins.
    ///
    /// The returned entry keeps its value alive even if it has been evicted right after the installation.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "repocache::memory::raw::get_or_put"))]
    pub fn get_or_put(&self, key: E::Key, value: E::Value) -> RawCacheEntry<E::Key, E::Value> {
        let record = match self.emplace_if_absent(self.record(key, value, ReferenceMode::Soft)) {
            Ok(record) | Err(record) => record,
        };
        RawCacheEntry { record }
    }

    #[cfg_attr(feature = "tracing", fastrace::trace(name = "repocache::memory::raw::remove"))]
    pub fn remove(&self, key: &E::Key) -> Option<RawCacheEntry<E::Key, E::Value>> {
        let (context, hash) = self.locate(key);

        self.inner.shards[self.shard(hash)]
            .write()
            .with(|mut shard| shard.remove(hash, key, context))
            .map(|record| {
                // Notify out of the lock critical section.
                if let Some(listener) = self.inner.event_listener.as_ref() {
                    listener.on_leave(Event::Remove, record.key(), record.value());
                }
                RawCacheEntry { record }
            })
    }

    #[cfg_attr(feature = "tracing", fastrace::trace(name = "repocache::memory::raw::get"))]
    pub fn get(&self, key: &E::Key) -> Option<RawCacheEntry<E::Key, E::Value>> {
        let (context, hash) = self.locate(key);

        let record = match E::acquire() {
            Op::Noop => self.inner.shards[self.shard(hash)]
                .read()
                .get_noop(hash, key, context),
            Op::Immutable(_) => self.inner.shards[self.shard(hash)]
                .read()
                .with(|shard| shard.get_immutable(hash, key, context)),
            Op::Mutable(_) => self.inner.shards[self.shard(hash)]
                .write()
                .with(|mut shard| shard.get_mutable(hash, key, context)),
        }?;

        Some(RawCacheEntry { record })
    }

    /// Check if the key has a live entry, without touching the eviction order.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "repocache::memory::raw::contains"))]
    pub fn contains(&self, key: &E::Key) -> bool {
        let (context, hash) = self.locate(key);

        self.inner.shards[self.shard(hash)]
            .read()
            .with(|shard| shard.indexer.get(hash, key, context).is_some())
    }

    /// Drop every soft entry and keep the pinned ones.
    ///
    /// Shards are swept one at a time, each under its own lock only.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "repocache::memory::raw::clear_soft_refs"))]
    pub fn clear_soft_refs(&self) {
        let mut swept = 0;
        for shard in self.inner.shards.iter() {
            let mut garbages = vec![];
            shard.write().with(|mut shard| shard.sweep(&mut garbages));
            swept += garbages.len();
            self.inner.notify(garbages);
        }
        tracing::debug!(swept, "[memory]: soft entries cleared");
    }

    /// Drop every entry, pinned ones included.
    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Total weight of the soft entries.
    pub fn usage(&self) -> usize {
        self.inner.shards.iter().map(|shard| shard.read().usage).sum()
    }

    /// Count of the pinned entries.
    pub fn pinned(&self) -> usize {
        self.inner.shards.iter().map(|shard| shard.read().pinned).sum()
    }

    /// Count of the live entries.
    pub fn len(&self) -> usize {
        self.inner.shards.iter().map(|shard| shard.read().indexer.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    pub fn hash_builder(&self) -> &Arc<S> {
        &self.inner.hash_builder
    }

    pub fn shards(&self) -> usize {
        self.inner.shards.len()
    }

    /// Hash of the key in its scoped unit. Keys that the cache treats as the same entry hash the same.
    pub fn hash(&self, key: &E::Key) -> u64 {
        self.locate(key).1
    }

    /// Evaluate the context and the hash of the key.
    fn locate(&self, key: &E::Key) -> (UnitId, u64) {
        let context = (self.inner.unit_scope)(key.unit_id());
        let hash = self.inner.hash_builder.hash_key_in(key, context);
        (context, hash)
    }

    fn record(&self, key: E::Key, value: E::Value, mode: ReferenceMode) -> Arc<Record<E::Key, E::Value>> {
        let (context, hash) = self.locate(&key);
        let weight = (self.inner.weighter)(&key, &value);
        Arc::new(Record::new(Data {
            key,
            value,
            mode,
            context,
            hash,
            weight,
        }))
    }

    fn emplace(&self, record: Arc<Record<E::Key, E::Value>>) {
        let mut garbages = vec![];

        self.inner.shards[self.shard(record.hash())]
            .write()
            .with(|mut shard| shard.emplace(record, &mut garbages));

        // Deallocate data out of the lock critical section.
        self.inner.notify(garbages);
    }

    /// Returns `Ok` with the installed record, or `Err` with the live record that prevented the installation.
    fn emplace_if_absent(&self, record: RecordRef<E>) -> Result<RecordRef<E>, RecordRef<E>> {
        let mut garbages = vec![];

        let live = self.inner.shards[self.shard(record.hash())]
            .write()
            .with(|mut shard| shard.emplace_if_absent(record.clone(), &mut garbages));

        self.inner.notify(garbages);

        match live {
            Some(live) => Err(live),
            None => Ok(record),
        }
    }

    fn shard(&self, hash: u64) -> usize {
        hash as usize % self.inner.shards.len()
    }

    fn shard_capacity_for(total: usize, shards: usize, index: usize) -> usize {
        let base = total / shards;
        let remainder = total % shards;
        base + usize::from(index < remainder)
    }
}

/// A handle of a cache entry. Dereferences to the value.
///
/// The handle keeps the value alive after the entry leaves the cache.
pub struct RawCacheEntry<K, V> {
    record: Arc<Record<K, V>>,
}

impl<K, V> Debug for RawCacheEntry<K, V>
where
    K: Key,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawCacheEntry").field("record", &self.record).finish()
    }
}

impl<K, V> Clone for RawCacheEntry<K, V> {
    fn clone(&self) -> Self {
        Self {
            record: self.record.clone(),
        }
    }
}

impl<K, V> Deref for RawCacheEntry<K, V>
where
    K: Key,
    V: Persistent,
{
    type Target = V;

    fn deref(&self) -> &Self::Target {
        self.value()
    }
}

impl<K, V> RawCacheEntry<K, V>
where
    K: Key,
    V: Persistent,
{
    pub fn hash(&self) -> u64 {
        self.record.hash()
    }

    pub fn key(&self) -> &K {
        self.record.key()
    }

    pub fn value(&self) -> &V {
        self.record.value()
    }

    pub fn mode(&self) -> ReferenceMode {
        self.record.mode()
    }

    pub fn is_pinned(&self) -> bool {
        self.record.is_pinned()
    }

    pub fn context(&self) -> UnitId {
        self.record.context()
    }

    pub fn weight(&self) -> usize {
        self.record.weight()
    }

    /// The entry has left the cache.
    pub fn is_outdated(&self) -> bool {
        !self.record.is_in_indexer()
    }
}
