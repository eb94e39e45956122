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

use std::{fmt::Debug, sync::Arc};

use parking_lot::Mutex;
use repocache_common::{
    code::{HashBuilder, Key, Persistent},
    error::{Error, Result},
};
use repocache_memory::{Cache, CacheEntry, DefaultHasher};

/// The persistent tier behind the in-memory cache.
///
/// Implementations are called out of any cache lock and may block on I/O. They are called under the key's lock of
/// the repository, so they must not call back into the same repository.
pub trait Storage: Send + Sync + 'static {
    /// Key type of the storage.
    type Key: Key;
    /// Value type of the storage.
    type Value: Persistent;

    /// Load the value of the key, or `None` if the storage does not hold it.
    fn read(&self, key: &Self::Key) -> anyhow::Result<Option<Self::Value>>;

    /// Persist the value of the key.
    fn write(&self, key: &Self::Key, value: &Self::Value) -> anyhow::Result<()>;

    /// Delete the value of the key. Deleting a missing key is not an error.
    fn delete(&self, key: &Self::Key) -> anyhow::Result<()>;
}

/// Read-through repository over the in-memory cache and a [`Storage`].
///
/// Clones share the same cache and storage.
///
/// Storage access and the cache update that follows it are serialized per key over a fixed set of lock stripes, so
/// the cache never holds a value that the storage has already replaced or deleted.
pub struct Repository<K, V, ST, S = DefaultHasher>
where
    K: Key + Clone,
    V: Persistent,
    ST: Storage<Key = K, Value = V>,
    S: HashBuilder,
{
    cache: Cache<K, V, S>,
    storage: Arc<ST>,
    locks: Arc<[Mutex<()>]>,
}

const LOCK_STRIPES: usize = 64;

impl<K, V, ST, S> Debug for Repository<K, V, ST, S>
where
    K: Key + Clone,
    V: Persistent,
    ST: Storage<Key = K, Value = V>,
    S: HashBuilder,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository").field("cache", &self.cache).finish()
    }
}

impl<K, V, ST, S> Clone for Repository<K, V, ST, S>
where
    K: Key + Clone,
    V: Persistent,
    ST: Storage<Key = K, Value = V>,
    S: HashBuilder,
{
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            storage: self.storage.clone(),
            locks: self.locks.clone(),
        }
    }
}

impl<K, V, ST, S> Repository<K, V, ST, S>
where
    K: Key + Clone,
    V: Persistent,
    ST: Storage<Key = K, Value = V>,
    S: HashBuilder,
{
    /// Create a repository with the in-memory cache and the storage.
    pub fn new(cache: Cache<K, V, S>, storage: ST) -> Self {
        Self {
            cache,
            storage: Arc::new(storage),
            locks: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    fn lock(&self, key: &K) -> &Mutex<()> {
        &self.locks[self.cache.hash(key) as usize % self.locks.len()]
    }

    /// Get the entry of the key from the in-memory cache, loading it from the storage on miss.
    ///
    /// A loaded value is installed as a soft entry only if no other entry is installed meanwhile. The entry that is
    /// live afterwards is returned, so racing loaders observe the same value.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "repocache::repository::get"))]
    pub fn get(&self, key: &K) -> Result<Option<CacheEntry<K, V>>> {
        if let Some(entry) = self.cache.get(key) {
            return Ok(Some(entry));
        }

        let _guard = self.lock(key).lock();
        if let Some(entry) = self.cache.get(key) {
            return Ok(Some(entry));
        }
        let value = match self.storage.read(key).map_err(|e| storage_error("read", key, e))? {
            Some(value) => value,
            None => return Ok(None),
        };
        tracing::trace!(?key, "[repository]: loaded from storage");

        Ok(Some(self.cache.get_or_put(key.clone(), value)))
    }

    /// Write the value of the key through to the storage, then install it as a soft entry.
    ///
    /// The in-memory cache is left untouched if the storage write fails.
    pub fn put(&self, key: K, value: V) -> Result<()> {
        let _guard = self.lock(&key).lock();
        self.storage
            .write(&key, &value)
            .map_err(|e| storage_error("write", &key, e))?;
        self.cache.put(key, value);
        Ok(())
    }

    /// Write the value of the key through to the storage, then install it as a pinned entry.
    pub fn hang(&self, key: K, value: V) -> Result<()> {
        let _guard = self.lock(&key).lock();
        self.storage
            .write(&key, &value)
            .map_err(|e| storage_error("write", &key, e))?;
        self.cache.hang(key, value);
        Ok(())
    }

    /// Delete the key from the storage, then remove it from the in-memory cache.
    ///
    /// The cached entry stays if the storage delete fails.
    pub fn remove(&self, key: &K) -> Result<()> {
        let _guard = self.lock(key).lock();
        self.storage
            .delete(key)
            .map_err(|e| storage_error("delete", key, e))?;
        self.cache.remove(key);
        Ok(())
    }

    /// Drop every soft entry of the in-memory cache. The storage is not touched.
    pub fn clear_soft_refs(&self) {
        self.cache.clear_soft_refs()
    }

    /// Get the in-memory cache of the repository.
    pub fn cache(&self) -> &Cache<K, V, S> {
        &self.cache
    }

    /// Get the storage of the repository.
    pub fn storage(&self) -> &ST {
        &self.storage
    }
}

fn storage_error<K: Key>(op: &'static str, key: &K, e: anyhow::Error) -> Error {
    let e = Error::storage(format!("storage {op} failed"), e)
        .with_context("op", op)
        .with_context("key", format!("{key:?}"));
    tracing::warn!(%e, "[repository]: storage failure");
    e
}
