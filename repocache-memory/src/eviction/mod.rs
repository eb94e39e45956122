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

use repocache_common::code::{Key, Persistent};
use serde::{de::DeserializeOwned, Serialize};

use crate::record::Record;

/// Operator for record access and release.
pub enum Op<E>
where
    E: Eviction,
{
    /// No operation.
    Noop,
    /// Operation that only requires the immutable reference of the eviction container.
    ///
    /// The shard read lock is taken.
    Immutable(Box<dyn Fn(&E, &Arc<Record<E::Key, E::Value>>) + Send + Sync + 'static>),
    /// Operation that requires the mutable reference of the eviction container.
    ///
    /// The shard write lock is taken.
    Mutable(Box<dyn FnMut(&mut E, &Arc<Record<E::Key, E::Value>>) + Send + Sync + 'static>),
}

impl<E> Op<E>
where
    E: Eviction,
{
    /// Build a noop operation.
    pub fn noop() -> Self {
        Self::Noop
    }

    /// Build an immutable operation.
    pub fn immutable<F>(f: F) -> Self
    where
        F: Fn(&E, &Arc<Record<E::Key, E::Value>>) + Send + Sync + 'static,
    {
        Self::Immutable(Box::new(f))
    }

    /// Build a mutable operation.
    pub fn mutable<F>(f: F) -> Self
    where
        F: FnMut(&mut E, &Arc<Record<E::Key, E::Value>>) + Send + Sync + 'static,
    {
        Self::Mutable(Box::new(f))
    }
}

/// Eviction order of the soft entries of a shard.
///
/// Only soft records are pushed into the eviction container. Pinned records are tracked by the indexer alone.
///
/// The shard owns the capacity accounting. The container only decides which soft record leaves first.
pub trait Eviction: Send + Sync + 'static + Sized {
    /// Eviction algorithm config.
    type Config: Debug + Clone + Default + Send + Sync + 'static + Serialize + DeserializeOwned;
    /// Cache key.
    type Key: Key;
    /// Cache value.
    type Value: Persistent;

    /// Create a new empty eviction container.
    fn new(config: &Self::Config) -> Self;

    /// Push a record into the eviction container.
    ///
    /// The record must be soft and not in the container.
    fn push(&mut self, record: Arc<Record<Self::Key, Self::Value>>);

    /// Pop the next victim.
    fn pop(&mut self) -> Option<Arc<Record<Self::Key, Self::Value>>>;

    /// Remove a record from the eviction container.
    ///
    /// The record must be in the container.
    fn remove(&mut self, record: &Arc<Record<Self::Key, Self::Value>>);

    /// Remove all records from the eviction container.
    fn clear(&mut self) {
        while self.pop().is_some() {}
    }

    /// Count of records in the eviction container.
    fn len(&self) -> usize;

    /// Check if the eviction container is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Determine if the immutable version or the mutable version to use for the `acquire` operation.
    ///
    /// The operation is applied to a record found by a lookup.
    fn acquire() -> Op<Self>;
}

pub mod fifo;
pub mod lru;

#[cfg(test)]
pub mod test_utils;
