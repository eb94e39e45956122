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

use std::{fmt::Debug, hash::Hasher, sync::Arc};

use itertools::Itertools;

use crate::code::{Behavior, Key, UnitId};

/// A general-purpose [`Key`] built from a primary name path and secondary discriminators.
///
/// e.g. a member function `ns::Widget::resize(int)` of unit 3 may be keyed as primary path `["ns", "Widget", "resize"]`
/// with secondary discriminators `[kind, signature hash]`.
///
/// The identity of a [`PathKey`] is its behavior and both paths, evaluated in the context unit. The stored unit id only
/// takes part in the identity when the table uses it as the context.
#[derive(Clone, PartialEq, Eq)]
pub struct PathKey {
    unit: UnitId,
    behavior: Behavior,
    has_cache: bool,
    primary: Arc<[Arc<str>]>,
    secondary: Arc<[i32]>,
}

impl Debug for PathKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PathKey({}:{}", self.unit, self.primary.iter().join("::"))?;
        if !self.secondary.is_empty() {
            write!(f, "#{}", self.secondary.iter().join(","))?;
        }
        write!(f, ")")
    }
}

impl PathKey {
    /// Create a key of `unit` with the given primary path.
    pub fn new<I, S>(unit: UnitId, primary: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Self {
            unit,
            behavior: Behavior::Default,
            has_cache: false,
            primary: primary.into_iter().map(Into::into).collect(),
            secondary: Arc::from([]),
        }
    }

    /// Set the secondary discriminators.
    pub fn with_secondary(mut self, secondary: impl IntoIterator<Item = i32>) -> Self {
        self.secondary = secondary.into_iter().collect();
        self
    }

    /// Set the caching policy tag.
    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Set the cache hint.
    pub fn with_cache_hint(mut self, has_cache: bool) -> Self {
        self.has_cache = has_cache;
        self
    }

    /// Re-home the key to another unit, keeping its paths.
    pub fn in_unit(&self, unit: UnitId) -> Self {
        Self { unit, ..self.clone() }
    }
}

impl Key for PathKey {
    fn unit_id(&self) -> UnitId {
        self.unit
    }

    fn depth(&self) -> usize {
        self.primary.len()
    }

    fn at(&self, level: usize) -> &str {
        &self.primary[level]
    }

    fn secondary_depth(&self) -> usize {
        self.secondary.len()
    }

    fn secondary_at(&self, level: usize) -> i32 {
        self.secondary[level]
    }

    fn behavior(&self) -> Behavior {
        self.behavior
    }

    fn has_cache(&self) -> bool {
        self.has_cache
    }

    fn hash_in<H: Hasher>(&self, unit: UnitId, state: &mut H) {
        // Components are length-prefixed so that ["ab", "c"] and ["a", "bc"] hash differently.
        for component in self.primary.iter() {
            state.write_usize(component.len());
            state.write(component.as_bytes());
        }
        for discriminator in self.secondary.iter() {
            state.write_i32(*discriminator);
        }
        state.write_u8(self.behavior as u8);
        state.write_i32(unit);
    }

    fn equals_in(&self, unit: UnitId, other: &Self, other_unit: UnitId) -> bool {
        unit == other_unit
            && self.behavior == other.behavior
            && self.secondary == other.secondary
            && self.primary == other.primary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::HashBuilderExt;

    fn widget(unit: UnitId) -> PathKey {
        PathKey::new(unit, ["ns", "Widget", "resize"]).with_secondary([1, 0x5eed])
    }

    #[test]
    fn test_path_accessors() {
        let key = widget(3).with_behavior(Behavior::LargeAndMutable).with_cache_hint(true);
        assert_eq!(key.unit_id(), 3);
        assert_eq!(key.depth(), 3);
        assert_eq!(key.at(1), "Widget");
        assert_eq!(key.secondary_depth(), 2);
        assert_eq!(key.secondary_at(1), 0x5eed);
        assert_eq!(key.behavior(), Behavior::LargeAndMutable);
        assert!(key.has_cache());
        assert_eq!(format!("{key:?}"), "PathKey(3:ns::Widget::resize#1,24301)");
    }

    #[test]
    fn test_identity_is_scoped_by_context() {
        let a = widget(3);
        let b = widget(4);

        assert!(a.equals_in(3, &a, 3));
        assert!(!a.equals_in(3, &a, 4));
        assert!(!a.equals_in(a.unit_id(), &b, b.unit_id()));
        assert!(a.equals_in(9, &b, 9));

        let s = ahash::RandomState::new();
        assert_eq!(s.hash_key_in(&a, 9), s.hash_key_in(&b, 9));
        assert_eq!(s.hash_key_in(&a, 3), s.hash_key_in(&a.in_unit(8), 3));
    }

    #[test]
    fn test_paths_are_length_prefixed() {
        let a = PathKey::new(1, ["ab", "c"]);
        let b = PathKey::new(1, ["a", "bc"]);
        assert!(!a.equals_in(1, &b, 1));

        let s = ahash::RandomState::new();
        assert_ne!(s.hash_key_in(&a, 1), s.hash_key_in(&b, 1));
    }

    #[test]
    fn test_context_takes_part_in_hash() {
        let s = ahash::RandomState::with_seeds(1, 2, 3, 4);
        let key = widget(3);
        assert_ne!(s.hash_key_in(&key, 3), s.hash_key_in(&key, 4));
        assert_eq!(s.hash_key_in(&key, 4), s.hash_key_in(&key.in_unit(4), 4));
    }
}
