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

use std::borrow::Cow;

use super::{BoxedCounter, BoxedGauge, RegistryOps};

/// Metrics of a repository cache, labeled with the cache name.
#[derive(Debug)]
pub struct Metrics {
    /// Entries installed on an absent key.
    pub memory_insert: BoxedCounter,
    /// Entries that replaced a live entry.
    pub memory_replace: BoxedCounter,
    /// Lookups that found a live entry.
    pub memory_hit: BoxedCounter,
    /// Lookups that found nothing.
    pub memory_miss: BoxedCounter,
    /// Entries removed explicitly.
    pub memory_remove: BoxedCounter,
    /// Soft entries evicted for capacity.
    pub memory_evict: BoxedCounter,
    /// Soft entries dropped by a sweep.
    pub memory_sweep: BoxedCounter,
    /// Pinned entries installed.
    pub memory_hang: BoxedCounter,
    /// `put_if_absent` calls that lost to a live entry.
    pub memory_reject: BoxedCounter,

    /// Total weight of soft entries.
    pub memory_usage: BoxedGauge,
    /// Count of pinned entries.
    pub memory_pinned: BoxedGauge,
}

impl Metrics {
    /// Create a new metric with the given name.
    pub fn new<R>(name: impl Into<Cow<'static, str>>, registry: &R) -> Self
    where
        R: RegistryOps + ?Sized,
    {
        let name: Cow<'static, str> = name.into();

        let op_total = registry.register_counter_vec(
            "repocache_memory_op_total".into(),
            "repocache in-memory cache operations".into(),
            &["name", "op"],
        );
        let usage = registry.register_gauge_vec(
            "repocache_memory_usage".into(),
            "repocache in-memory soft entry usage".into(),
            &["name"],
        );
        let pinned = registry.register_gauge_vec(
            "repocache_memory_pinned".into(),
            "repocache in-memory pinned entries".into(),
            &["name"],
        );

        let op = |op: &'static str| op_total.counter(&[name.clone(), op.into()]);

        Self {
            memory_insert: op("insert"),
            memory_replace: op("replace"),
            memory_hit: op("hit"),
            memory_miss: op("miss"),
            memory_remove: op("remove"),
            memory_evict: op("evict"),
            memory_sweep: op("sweep"),
            memory_hang: op("hang"),
            memory_reject: op("reject"),
            memory_usage: usage.gauge(&[name.clone()]),
            memory_pinned: pinned.gauge(&[name]),
        }
    }

    /// Build noop metrics.
    ///
    /// Note: `noop` is only supposed to be called by other repocache components.
    #[doc(hidden)]
    pub fn noop() -> Self {
        use super::registry::noop::NoopMetricsRegistry;

        Self::new("test", &NoopMetricsRegistry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::registry::noop::NoopMetricsRegistry;

    fn case(registry: &impl RegistryOps) {
        let m = Metrics::new("test", registry);
        m.memory_insert.increase(1);
        m.memory_usage.increase(3);
        m.memory_usage.decrease(1);
        m.memory_pinned.absolute(2);
    }

    #[test]
    fn test_metrics_noop() {
        case(&NoopMetricsRegistry);
    }

    #[cfg(feature = "prometheus")]
    #[test]
    fn test_metrics_prometheus() {
        use prometheus::{Registry, TextEncoder};

        use crate::metrics::registry::prometheus::PrometheusMetricsRegistry;

        let registry = Registry::new();
        let p8s = PrometheusMetricsRegistry::new(registry.clone());
        case(&p8s);
        // A second cache with another name shares the vectors.
        Metrics::new(String::from("other"), &p8s).memory_insert.increase(5);

        let text = TextEncoder::new().encode_to_string(&registry.gather()).unwrap();
        assert!(text.contains(r#"repocache_memory_op_total{name="test",op="insert"} 1"#));
        assert!(text.contains(r#"repocache_memory_op_total{name="other",op="insert"} 5"#));
        assert!(text.contains(r#"repocache_memory_usage{name="test"} 2"#));
        assert!(text.contains(r#"repocache_memory_pinned{name="test"} 2"#));
    }
}
