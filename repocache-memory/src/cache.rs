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

use std::{borrow::Cow, fmt::Debug, sync::Arc};

use ahash::RandomState;
use repocache_common::{
    code::{HashBuilder, Key, Persistent},
    error::{Error, Result},
    event::EventListener,
    metrics::{model::Metrics, registry::noop::NoopMetricsRegistry, BoxedRegistry, Boxer, RegistryOps},
};
use serde::{Deserialize, Serialize};

use crate::{
    eviction::{
        fifo::{Fifo, FifoConfig},
        lru::{Lru, LruConfig},
    },
    indexer::hash_table::HashTableIndexer,
    raw::{RawCache, RawCacheConfig, RawCacheEntry, UnitScope, Weighter},
};

/// Default hash builder of the cache.
pub type DefaultHasher = RandomState;

pub type LruCache<K, V, S = DefaultHasher> = RawCache<Lru<K, V>, S, HashTableIndexer<K, V>>;
pub type FifoCache<K, V, S = DefaultHasher> = RawCache<Fifo<K, V>, S, HashTableIndexer<K, V>>;

/// A cached entry holder of the in-memory cache. Dereferences to the value.
pub type CacheEntry<K, V> = RawCacheEntry<K, V>;

/// Eviction algorithm config of the soft entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EvictionConfig {
    /// Least-recently-used. Lookups refresh the entry.
    Lru(LruConfig),
    /// First-in-first-out. Lookups only take the shard read lock.
    Fifo(FifoConfig),
}

impl Default for EvictionConfig {
    fn default() -> Self {
        LruConfig::default().into()
    }
}

impl From<LruConfig> for EvictionConfig {
    fn from(value: LruConfig) -> EvictionConfig {
        EvictionConfig::Lru(value)
    }
}

impl From<FifoConfig> for EvictionConfig {
    fn from(value: FifoConfig) -> EvictionConfig {
        EvictionConfig::Fifo(value)
    }
}

/// In-memory cache builder.
pub struct CacheBuilder<K, V, S>
where
    K: Key,
    V: Persistent,
    S: HashBuilder,
{
    name: Cow<'static, str>,

    capacity: usize,
    shards: usize,
    eviction_config: EvictionConfig,

    hash_builder: S,
    weighter: Arc<dyn Weighter<K, V>>,
    unit_scope: Arc<dyn UnitScope>,

    event_listener: Option<Arc<dyn EventListener<Key = K, Value = V>>>,

    registry: BoxedRegistry,
}

impl<K, V> CacheBuilder<K, V, DefaultHasher>
where
    K: Key,
    V: Persistent,
{
    /// Create a new in-memory cache builder with the soft entry capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            name: "repocache".into(),

            capacity,
            shards: 8,
            eviction_config: EvictionConfig::default(),

            hash_builder: RandomState::default(),
            weighter: Arc::new(|_, _| 1),
            unit_scope: Arc::new(|unit| unit),

            event_listener: None,

            registry: NoopMetricsRegistry.boxed(),
        }
    }
}

impl<K, V, S> CacheBuilder<K, V, S>
where
    K: Key,
    V: Persistent,
    S: HashBuilder,
{
    /// Set the name of the in-memory cache.
    ///
    /// The name is used as the `name` label of the metrics.
    ///
    /// Default: `repocache`.
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Set in-memory cache sharding count. Entries will be distributed to different shards based on their hash.
    /// Operations on different shard can be parallelized.
    ///
    /// The soft capacity is split evenly among the shards.
    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    /// Set in-memory cache eviction algorithm of the soft entries.
    ///
    /// The default value is LRU.
    pub fn with_eviction_config(mut self, eviction_config: impl Into<EvictionConfig>) -> Self {
        self.eviction_config = eviction_config.into();
        self
    }

    /// Set in-memory cache hash builder.
    pub fn with_hash_builder<OS>(self, hash_builder: OS) -> CacheBuilder<K, V, OS>
    where
        OS: HashBuilder,
    {
        CacheBuilder {
            name: self.name,
            capacity: self.capacity,
            shards: self.shards,
            eviction_config: self.eviction_config,
            hash_builder,
            weighter: self.weighter,
            unit_scope: self.unit_scope,
            event_listener: self.event_listener,
            registry: self.registry,
        }
    }

    /// Set in-memory cache weighter. Only soft entries count towards the capacity.
    pub fn with_weighter(mut self, weighter: impl Weighter<K, V>) -> Self {
        self.weighter = Arc::new(weighter);
        self
    }

    /// Set the unit scope that maps the unit id of a key to the context its identity is evaluated in.
    ///
    /// Default: identity, keys of different units never collide.
    pub fn with_unit_scope(mut self, unit_scope: impl UnitScope) -> Self {
        self.unit_scope = Arc::new(unit_scope);
        self
    }

    /// Set event listener.
    pub fn with_event_listener(mut self, event_listener: Arc<dyn EventListener<Key = K, Value = V>>) -> Self {
        self.event_listener = Some(event_listener);
        self
    }

    /// Set metrics registry.
    ///
    /// Default: [`NoopMetricsRegistry`].
    pub fn with_metrics_registry(mut self, registry: impl RegistryOps) -> Self {
        self.registry = registry.boxed();
        self
    }

    /// Build in-memory cache with the given configuration.
    pub fn build(self) -> Result<Cache<K, V, S>> {
        if self.shards == 0 {
            return Err(Error::invalid_config(
                "shards",
                self.shards,
                "shards must be greater than zero",
            ));
        }

        tracing::debug!(
            name = %self.name,
            capacity = self.capacity,
            shards = self.shards,
            eviction = ?self.eviction_config,
            "[memory]: build cache"
        );

        let metrics = Arc::new(Metrics::new(self.name, &*self.registry));

        let cache = match self.eviction_config {
            EvictionConfig::Lru(eviction_config) => Cache::Lru(RawCache::new(RawCacheConfig {
                capacity: self.capacity,
                shards: self.shards,
                eviction_config,
                hash_builder: self.hash_builder,
                weighter: self.weighter,
                unit_scope: self.unit_scope,
                event_listener: self.event_listener,
                metrics,
            })),
            EvictionConfig::Fifo(eviction_config) => Cache::Fifo(RawCache::new(RawCacheConfig {
                capacity: self.capacity,
                shards: self.shards,
                eviction_config,
                hash_builder: self.hash_builder,
                weighter: self.weighter,
                unit_scope: self.unit_scope,
                event_listener: self.event_listener,
                metrics,
            })),
        };

        Ok(cache)
    }
}

/// The in-memory repository cache.
///
/// Entries are either soft, reclaimable by capacity eviction and by [`Cache::clear_soft_refs`], or pinned, kept
/// until they are removed or replaced. All operations are thread-safe and operations on the same key are
/// linearizable.
///
/// Clones share the same cache.
pub enum Cache<K, V, S = DefaultHasher>
where
    K: Key,
    V: Persistent,
    S: HashBuilder,
{
    /// In-memory cache with LRU eviction of the soft entries.
    Lru(LruCache<K, V, S>),
    /// In-memory cache with FIFO eviction of the soft entries.
    Fifo(FifoCache<K, V, S>),
}

impl<K, V, S> Debug for Cache<K, V, S>
where
    K: Key,
    V: Persistent,
    S: HashBuilder,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lru(_) => f.debug_tuple("Cache::LruCache").finish(),
            Self::Fifo(_) => f.debug_tuple("Cache::FifoCache").finish(),
        }
    }
}

impl<K, V, S> Clone for Cache<K, V, S>
where
    K: Key,
    V: Persistent,
    S: HashBuilder,
{
    fn clone(&self) -> Self {
        match self {
            Self::Lru(cache) => Self::Lru(cache.clone()),
            Self::Fifo(cache) => Self::Fifo(cache.clone()),
        }
    }
}

impl<K, V, S> Cache<K, V, S>
where
    K: Key,
    V: Persistent,
    S: HashBuilder,
{
    /// Get the live entry of the key. Never performs I/O.
    pub fn get(&self, key: &K) -> Option<CacheEntry<K, V>> {
        match self {
            Cache::Lru(cache) => cache.get(key),
            Cache::Fifo(cache) => cache.get(key),
        }
    }

    /// Install a soft entry, replacing any live entry of the key, pinned or not.
    pub fn put(&self, key: K, value: V) {
        match self {
            Cache::Lru(cache) => cache.put(key, value),
            Cache::Fifo(cache) => cache.put(key, value),
        }
    }

    /// Install a soft entry only if the key has no live entry.
    ///
    /// Returns `true` if the entry is installed.
    pub fn put_if_absent(&self, key: K, value: V) -> bool {
        match self {
            Cache::Lru(cache) => cache.put_if_absent(key, value),
            Cache::Fifo(cache) => cache.put_if_absent(key, value),
        }
    }

    /// Install a soft entry if the key has no live entry, and return the entry that wins.
    pub fn get_or_put(&self, key: K, value: V) -> CacheEntry<K, V> {
        match self {
            Cache::Lru(cache) => cache.get_or_put(key, value),
            Cache::Fifo(cache) => cache.get_or_put(key, value),
        }
    }

    /// Install a pinned entry, replacing any live entry of the key.
    ///
    /// A pinned entry survives capacity eviction and [`Cache::clear_soft_refs`].
    pub fn hang(&self, key: K, value: V) {
        match self {
            Cache::Lru(cache) => cache.hang(key, value),
            Cache::Fifo(cache) => cache.hang(key, value),
        }
    }

    /// Remove the live entry of the key, if any.
    pub fn remove(&self, key: &K) -> Option<CacheEntry<K, V>> {
        match self {
            Cache::Lru(cache) => cache.remove(key),
            Cache::Fifo(cache) => cache.remove(key),
        }
    }

    /// Check if the key has a live entry.
    pub fn contains(&self, key: &K) -> bool {
        match self {
            Cache::Lru(cache) => cache.contains(key),
            Cache::Fifo(cache) => cache.contains(key),
        }
    }

    /// Drop every soft entry and keep the pinned ones.
    pub fn clear_soft_refs(&self) {
        match self {
            Cache::Lru(cache) => cache.clear_soft_refs(),
            Cache::Fifo(cache) => cache.clear_soft_refs(),
        }
    }

    /// Drop every entry.
    pub fn clear(&self) {
        match self {
            Cache::Lru(cache) => cache.clear(),
            Cache::Fifo(cache) => cache.clear(),
        }
    }

    /// Get the soft capacity of the in-memory cache.
    pub fn capacity(&self) -> usize {
        match self {
            Cache::Lru(cache) => cache.capacity(),
            Cache::Fifo(cache) => cache.capacity(),
        }
    }

    /// Get the weight of the soft entries.
    pub fn usage(&self) -> usize {
        match self {
            Cache::Lru(cache) => cache.usage(),
            Cache::Fifo(cache) => cache.usage(),
        }
    }

    /// Get the count of the pinned entries.
    pub fn pinned(&self) -> usize {
        match self {
            Cache::Lru(cache) => cache.pinned(),
            Cache::Fifo(cache) => cache.pinned(),
        }
    }

    /// Get the count of the live entries.
    pub fn len(&self) -> usize {
        match self {
            Cache::Lru(cache) => cache.len(),
            Cache::Fifo(cache) => cache.len(),
        }
    }

    /// Check if the in-memory cache has no live entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the shard count of the in-memory cache.
    pub fn shards(&self) -> usize {
        match self {
            Cache::Lru(cache) => cache.shards(),
            Cache::Fifo(cache) => cache.shards(),
        }
    }

    /// Hash of the key in its scoped unit.
    pub fn hash(&self, key: &K) -> u64 {
        match self {
            Cache::Lru(cache) => cache.hash(key),
            Cache::Fifo(cache) => cache.hash(key),
        }
    }

    /// Get the metrics of the in-memory cache.
    #[doc(hidden)]
    pub fn metrics(&self) -> &Metrics {
        match self {
            Cache::Lru(cache) => cache.metrics(),
            Cache::Fifo(cache) => cache.metrics(),
        }
    }

    /// Get the hash builder of the in-memory cache.
    pub fn hash_builder(&self) -> &Arc<S> {
        match self {
            Cache::Lru(cache) => cache.hash_builder(),
            Cache::Fifo(cache) => cache.hash_builder(),
        }
    }
}

#[cfg(test)]
mod tests {
    use repocache_common::{
        code::{Behavior, UnitId},
        error::ErrorKind,
        event::Event,
        key::PathKey,
    };

    use super::*;
    use crate::test_utils::Recorder;

    fn key(unit: UnitId, name: &str) -> PathKey {
        PathKey::new(unit, ["model", name])
    }

    fn is_send_sync_static<T: Send + Sync + 'static>() {}

    #[test]
    fn test_send_sync_static() {
        is_send_sync_static::<Cache<PathKey, String>>();
        is_send_sync_static::<CacheEntry<PathKey, String>>();
    }

    #[test]
    fn test_builder_defaults() {
        let cache: Cache<PathKey, u64> = CacheBuilder::new(100).build().unwrap();
        assert!(matches!(cache, Cache::Lru(_)));
        assert_eq!(cache.capacity(), 100);
        assert_eq!(cache.shards(), 8);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_shards_is_config_error() {
        let e = CacheBuilder::<PathKey, u64, _>::new(100)
            .with_shards(0)
            .build()
            .unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Config);
        assert!(e.context().iter().any(|(k, v)| *k == "option" && v == "shards"));
    }

    #[test]
    fn test_eviction_config_serde() {
        let json = serde_json::to_string(&EvictionConfig::from(FifoConfig::default())).unwrap();
        assert_eq!(json, r#"{"Fifo":{}}"#);
        let config: EvictionConfig = serde_json::from_str(r#"{"Lru":{}}"#).unwrap();
        assert!(matches!(config, EvictionConfig::Lru(_)));
    }

    fn case(cache: Cache<PathKey, u64>) {
        cache.put(key(1, "a"), 1);
        assert!(!cache.put_if_absent(key(1, "a"), 2));
        assert!(cache.put_if_absent(key(1, "b"), 3));
        cache.hang(key(1, "c"), 4);
        assert_eq!(*cache.get(&key(1, "a")).unwrap(), 1);
        assert_eq!(*cache.get_or_put(key(1, "b"), 5), 3);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.usage(), 2);
        assert_eq!(cache.pinned(), 1);

        cache.clear_soft_refs();
        assert!(!cache.contains(&key(1, "a")));
        assert!(!cache.contains(&key(1, "b")));
        assert_eq!(*cache.get(&key(1, "c")).unwrap(), 4);

        assert_eq!(*cache.remove(&key(1, "c")).unwrap(), 4);
        assert!(cache.get(&key(1, "c")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lru_cache() {
        case(
            CacheBuilder::new(16)
                .with_shards(2)
                .with_hash_builder(RandomState::with_seeds(1, 2, 3, 4))
                .build()
                .unwrap(),
        );
    }

    #[test]
    fn test_fifo_cache() {
        case(
            CacheBuilder::new(16)
                .with_shards(2)
                .with_eviction_config(FifoConfig::default())
                .with_hash_builder(RandomState::with_seeds(1, 2, 3, 4))
                .build()
                .unwrap(),
        );
    }

    #[test]
    fn test_builder_options() {
        let recorder = Recorder::default();
        let cache: Cache<PathKey, u64> = CacheBuilder::new(3)
            .with_name("files")
            .with_shards(1)
            .with_weighter(|k: &PathKey, _: &u64| match k.behavior() {
                Behavior::LargeAndMutable => 3,
                Behavior::Default => 1,
            })
            .with_unit_scope(|_| 0)
            .with_event_listener(Arc::new(recorder.clone()))
            .build()
            .unwrap();

        cache.put(key(1, "a"), 1);
        cache.put(key(2, "b"), 2);
        // Same paths in another unit collide under the flat scope.
        cache.put(key(3, "a"), 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.usage(), 2);

        // A large entry takes the whole capacity.
        cache.put(key(1, "file").with_behavior(Behavior::LargeAndMutable), 4);
        assert_eq!(cache.usage(), 3);
        assert_eq!(cache.len(), 1);

        let events = recorder.take().into_iter().map(|(e, _, v)| (e, v)).collect::<Vec<_>>();
        assert_eq!(events, vec![(Event::Replace, 1), (Event::Evict, 2), (Event::Evict, 3)]);
    }

    #[test]
    fn test_hash_follows_unit_scope() {
        let cache: Cache<PathKey, u64> = CacheBuilder::new(16)
            .with_unit_scope(|unit| unit / 10)
            .build()
            .unwrap();
        assert_eq!(cache.hash(&key(11, "a")), cache.hash(&key(12, "a")));
        assert_ne!(cache.hash(&key(11, "a")), cache.hash(&key(21, "a")));

        cache.put(key(11, "a"), 1);
        let entry = cache.get(&key(12, "a")).unwrap();
        assert_eq!(entry.hash(), cache.hash(&key(12, "a")));
    }
}
