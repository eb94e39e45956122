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

//! Utilities for testing.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use repocache_common::{
    code::{Key, Persistent},
    event::{Event, EventListener},
};

/// An event listener that records all entries leaving the cache.
#[derive(Debug)]
pub struct Recorder<K, V> {
    events: Arc<Mutex<Vec<(Event, K, V)>>>,
}

impl<K, V> Clone for Recorder<K, V> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
        }
    }
}

impl<K, V> Default for Recorder<K, V> {
    fn default() -> Self {
        Self {
            events: Default::default(),
        }
    }
}

impl<K, V> EventListener for Recorder<K, V>
where
    K: Key + Clone,
    V: Persistent + Clone,
{
    type Key = K;
    type Value = V;

    fn on_leave(&self, reason: Event, key: &Self::Key, value: &Self::Value)
    where
        Self::Key: Key,
        Self::Value: Persistent,
    {
        self.events.lock().push((reason, key.clone(), value.clone()));
    }
}

impl<K, V> Recorder<K, V> {
    /// Get all recorded events.
    pub fn events(&self) -> MutexGuard<'_, Vec<(Event, K, V)>> {
        self.events.lock()
    }

    /// Take all recorded events.
    pub fn take(&self) -> Vec<(Event, K, V)> {
        std::mem::take(&mut *self.events.lock())
    }
}
