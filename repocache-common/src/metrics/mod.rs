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

//! Backend-agnostic metric handles of the repository cache.
//!
//! The cache only needs monotonic counters and up-down gauges, both grouped in labeled families. A backend implements
//! [`RegistryOps`] to hand out the families, and the cache resolves its labeled handles once at build time.

use std::{borrow::Cow, fmt::Debug};

/// A monotonic counter.
pub trait CounterOps: Send + Sync + 'static + Debug {
    /// Add `val` to the counter.
    fn increase(&self, val: u64);
}

/// A gauge that goes up and down.
pub trait GaugeOps: Send + Sync + 'static + Debug {
    /// Add `val` to the gauge.
    fn increase(&self, val: u64);
    /// Subtract `val` from the gauge.
    fn decrease(&self, val: u64);
    /// Overwrite the gauge with `val`.
    fn absolute(&self, val: u64);
}

/// A family of counters that share a name and differ by label values.
pub trait CounterVecOps: Send + Sync + 'static + Debug {
    /// Resolve the counter of the label values, in the order of the registered label names.
    fn counter(&self, labels: &[Cow<'static, str>]) -> BoxedCounter;
}

/// A family of gauges that share a name and differ by label values.
pub trait GaugeVecOps: Send + Sync + 'static + Debug {
    /// Resolve the gauge of the label values, in the order of the registered label names.
    fn gauge(&self, labels: &[Cow<'static, str>]) -> BoxedGauge;
}

/// A metrics backend.
pub trait RegistryOps: Send + Sync + 'static + Debug {
    /// Register, or look up, a counter family.
    fn register_counter_vec(
        &self,
        name: Cow<'static, str>,
        desc: Cow<'static, str>,
        label_names: &'static [&'static str],
    ) -> BoxedCounterVec;

    /// Register, or look up, a gauge family.
    fn register_gauge_vec(
        &self,
        name: Cow<'static, str>,
        desc: Cow<'static, str>,
        label_names: &'static [&'static str],
    ) -> BoxedGaugeVec;
}

/// Type-erased counter.
pub type BoxedCounter = Box<dyn CounterOps>;
/// Type-erased gauge.
pub type BoxedGauge = Box<dyn GaugeOps>;
/// Type-erased counter family.
pub type BoxedCounterVec = Box<dyn CounterVecOps>;
/// Type-erased gauge family.
pub type BoxedGaugeVec = Box<dyn GaugeVecOps>;
/// Type-erased metrics backend.
pub type BoxedRegistry = Box<dyn RegistryOps>;

/// `value.boxed()` shorthand for `Box::new(value)`, used to erase metric handle types.
pub trait Boxer {
    /// Move `self` into a box.
    fn boxed(self) -> Box<Self>
    where
        Self: Sized,
    {
        Box::new(self)
    }
}
impl<T> Boxer for T {}

/// Metrics of the in-memory cache.
pub mod model;
/// Metrics backends.
pub mod registry;
