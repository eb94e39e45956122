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
    hash::{BuildHasher, Hasher},
};

use serde::{Deserialize, Serialize};

/// Identifier of a unit (a translation unit, a file or a project) that owns keys.
pub type UnitId = i32;

/// Caching policy tag of a key.
///
/// The in-memory cache does not interpret the tag. It is consumed by the persistent repository behind the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Behavior {
    /// Regular entity.
    #[default]
    Default,
    /// Entity that is large and frequently rewritten, e.g. a file model.
    LargeAndMutable,
}

/// Identity descriptor of a cached entity.
///
/// A key belongs to the unit it was created in, but its identity is always evaluated against a *context* unit id that
/// is supplied by the caller. A table that stores keys picks the context for every key it touches and keeps that
/// convention for its whole lifetime.
///
/// # Contract
///
/// For any context `c`, if `a.equals_in(c, &b, c)` holds, then `a.hash_in(c, ..)` and `b.hash_in(c, ..)` must feed
/// the same bytes into the hasher. Equality is not required to be reflexive across different contexts.
///
/// Violations of the contract are not detected by the cache. They lead to duplicated or unreachable entries, never to
/// memory unsafety.
pub trait Key: Send + Sync + 'static + Debug {
    /// The unit the key was created in.
    fn unit_id(&self) -> UnitId;

    /// Length of the primary name path.
    fn depth(&self) -> usize;

    /// Primary name path component at `level`.
    ///
    /// # Panics
    ///
    /// Implementations may panic if `level >= self.depth()`.
    fn at(&self, level: usize) -> &str;

    /// Length of the secondary discriminator path.
    fn secondary_depth(&self) -> usize;

    /// Secondary discriminator at `level`.
    ///
    /// # Panics
    ///
    /// Implementations may panic if `level >= self.secondary_depth()`.
    fn secondary_at(&self, level: usize) -> i32;

    /// Caching policy tag.
    fn behavior(&self) -> Behavior {
        Behavior::Default
    }

    /// Hint that a live cache entry is believed to exist for the key.
    fn has_cache(&self) -> bool {
        false
    }

    /// Feed the identity of the key evaluated in context `unit` into `state`.
    fn hash_in<H: Hasher>(&self, unit: UnitId, state: &mut H);

    /// Compare the key evaluated in context `unit` with `other` evaluated in context `other_unit`.
    fn equals_in(&self, unit: UnitId, other: &Self, other_unit: UnitId) -> bool;
}

/// Value type stored in the cache.
///
/// The cache never inspects a value, it only holds references to it.
pub trait Persistent: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Persistent for T {}

/// Hash builder used to finish key hashes.
pub trait HashBuilder: BuildHasher + Send + Sync + 'static {}
impl<T> HashBuilder for T where T: BuildHasher + Send + Sync + 'static {}

/// Extension of [`BuildHasher`] for context-scoped key hashing.
pub trait HashBuilderExt: HashBuilder {
    /// Hash `key` evaluated in context `unit`.
    fn hash_key_in<K: Key>(&self, key: &K, unit: UnitId) -> u64 {
        let mut hasher = self.build_hasher();
        key.hash_in(unit, &mut hasher);
        hasher.finish()
    }
}
impl<T: HashBuilder> HashBuilderExt for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Offset {
        unit: UnitId,
        offset: i32,
    }

    impl Key for Offset {
        fn unit_id(&self) -> UnitId {
            self.unit
        }

        fn depth(&self) -> usize {
            0
        }

        fn at(&self, level: usize) -> &str {
            panic!("no primary path, level: {level}")
        }

        fn secondary_depth(&self) -> usize {
            1
        }

        fn secondary_at(&self, _: usize) -> i32 {
            self.offset
        }

        fn hash_in<H: Hasher>(&self, unit: UnitId, state: &mut H) {
            state.write_i32(unit);
            state.write_i32(self.offset);
        }

        fn equals_in(&self, unit: UnitId, other: &Self, other_unit: UnitId) -> bool {
            unit == other_unit && self.offset == other.offset
        }
    }

    #[test]
    fn test_hash_follows_context() {
        let a = Offset { unit: 1, offset: 42 };
        let b = Offset { unit: 2, offset: 42 };
        let s = ahash::RandomState::with_seeds(1, 2, 3, 4);

        // Different stored units, same context: same identity.
        assert!(a.equals_in(7, &b, 7));
        assert_eq!(s.hash_key_in(&a, 7), s.hash_key_in(&b, 7));

        // Stored units used as contexts: different identities.
        assert!(!a.equals_in(a.unit_id(), &b, b.unit_id()));
        assert_ne!(s.hash_key_in(&a, a.unit_id()), s.hash_key_in(&b, b.unit_id()));
    }

    #[test]
    fn test_default_tags() {
        let a = Offset { unit: 1, offset: 0 };
        assert_eq!(a.behavior(), Behavior::Default);
        assert!(!a.has_cache());
    }

    #[test]
    fn test_behavior_serde() {
        let json = serde_json::to_string(&Behavior::LargeAndMutable).unwrap();
        assert_eq!(json, r#""LargeAndMutable""#);
        let behavior: Behavior = serde_json::from_str(r#""Default""#).unwrap();
        assert_eq!(behavior, Behavior::default());
    }
}
