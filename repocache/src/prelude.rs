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

pub use repocache_common::{
    code::{Behavior, HashBuilder, HashBuilderExt, Key, Persistent, UnitId},
    error::{Error, ErrorKind, Result},
    event::{Event, EventListener},
    key::PathKey,
    metrics::{registry::noop::NoopMetricsRegistry, RegistryOps},
    scope::Scope,
};
#[cfg(feature = "prometheus")]
pub use repocache_common::metrics::registry::prometheus::PrometheusMetricsRegistry;
pub use repocache_memory::{
    Cache, CacheBuilder, CacheEntry, DefaultHasher, EvictionConfig, FifoConfig, LruConfig, ReferenceMode, UnitScope,
    Weighter,
};

pub use crate::repository::{Repository, Storage};
