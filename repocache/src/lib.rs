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

//! repocache is a concurrent repository cache for the entities of source models.
//!
//! Entities are looked up by keys whose identity is evaluated in a unit context. Each entry is either soft, reclaimable
//! by capacity eviction and by [`Cache::clear_soft_refs`], or pinned (hung), kept until it is removed or replaced.
//!
//! [`Repository`] layers the in-memory cache over a caller supplied [`Storage`].
//!
//! # Example
//!
//! ```
//! use repocache::{Cache, CacheBuilder, PathKey};
//!
//! let cache: Cache<PathKey, String> = CacheBuilder::new(1024).build().unwrap();
//!
//! let key = PathKey::new(1, ["ns", "Widget"]);
//! cache.hang(key.clone(), "widget".to_string());
//! cache.clear_soft_refs();
//! assert_eq!(cache.get(&key).unwrap().value(), "widget");
//! ```

mod prelude;
mod repository;

pub use prelude::*;
