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

use std::{borrow::Cow, collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use prometheus::{IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};

use crate::metrics::{
    registry::noop::NoopMetricsRegistry, BoxedCounter, BoxedCounterVec, BoxedGauge, BoxedGaugeVec, Boxer, CounterOps,
    CounterVecOps, GaugeOps, GaugeVecOps, RegistryOps,
};

/// A registered family, keyed by its name.
#[derive(Debug, Clone)]
enum Family {
    Counter(IntCounterVec),
    Gauge(IntGaugeVec),
}

impl CounterOps for IntCounter {
    fn increase(&self, val: u64) {
        self.inc_by(val);
    }
}

impl GaugeOps for IntGauge {
    fn increase(&self, val: u64) {
        self.add(val as _);
    }

    fn decrease(&self, val: u64) {
        self.sub(val as _);
    }

    fn absolute(&self, val: u64) {
        self.set(val as _);
    }
}

impl CounterVecOps for IntCounterVec {
    fn counter(&self, labels: &[Cow<'static, str>]) -> BoxedCounter {
        self.with_label_values(labels).boxed()
    }
}

impl GaugeVecOps for IntGaugeVec {
    fn gauge(&self, labels: &[Cow<'static, str>]) -> BoxedGauge {
        self.with_label_values(labels).boxed()
    }
}

/// Metrics backend over a [`prometheus::Registry`].
///
/// Clones share their families, so several caches can report through one registry, told apart by the `name` label.
/// A family that the registry rejects, e.g. because a foreign collector owns the name, is logged and replaced by a
/// noop one.
#[derive(Debug, Clone)]
pub struct PrometheusMetricsRegistry {
    registry: Registry,
    families: Arc<Mutex<HashMap<Cow<'static, str>, Family>>>,
}

impl PrometheusMetricsRegistry {
    /// Report into `registry`.
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            families: Arc::default(),
        }
    }

    /// The registry reported into.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Return the family registered under `name`, creating and registering it with `create` on first use.
    fn family(&self, name: Cow<'static, str>, create: impl FnOnce() -> prometheus::Result<Family>) -> Option<Family> {
        let mut families = self.families.lock();
        if let Some(family) = families.get(&name) {
            return Some(family.clone());
        }

        let registered = create().and_then(|family| {
            match &family {
                Family::Counter(vec) => self.registry.register(Box::new(vec.clone()))?,
                Family::Gauge(vec) => self.registry.register(Box::new(vec.clone()))?,
            }
            Ok(family)
        });
        match registered {
            Ok(family) => {
                families.insert(name, family.clone());
                Some(family)
            }
            Err(e) => {
                tracing::warn!(%name, "[prometheus]: register metric family failed: {e}");
                None
            }
        }
    }
}

impl RegistryOps for PrometheusMetricsRegistry {
    fn register_counter_vec(
        &self,
        name: Cow<'static, str>,
        desc: Cow<'static, str>,
        label_names: &'static [&'static str],
    ) -> BoxedCounterVec {
        let opts = Opts::new(name.as_ref(), desc.as_ref());
        match self.family(name, || IntCounterVec::new(opts, label_names).map(Family::Counter)) {
            Some(Family::Counter(vec)) => vec.boxed(),
            _ => NoopMetricsRegistry.boxed(),
        }
    }

    fn register_gauge_vec(
        &self,
        name: Cow<'static, str>,
        desc: Cow<'static, str>,
        label_names: &'static [&'static str],
    ) -> BoxedGaugeVec {
        let opts = Opts::new(name.as_ref(), desc.as_ref());
        match self.family(name, || IntGaugeVec::new(opts, label_names).map(Family::Gauge)) {
            Some(Family::Gauge(vec)) => vec.boxed(),
            _ => NoopMetricsRegistry.boxed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use prometheus::TextEncoder;

    use super::*;

    fn report(registry: &PrometheusMetricsRegistry, cache: &'static str) {
        registry
            .register_counter_vec("ops_total".into(), "ops".into(), &["name", "op"])
            .counter(&[cache.into(), "hit".into()])
            .increase(3);
        registry
            .register_gauge_vec("usage".into(), "usage".into(), &["name"])
            .gauge(&[cache.into()])
            .absolute(7);
    }

    fn text(registry: &Registry) -> String {
        TextEncoder::new().encode_to_string(&registry.gather()).unwrap()
    }

    #[test]
    fn test_clones_share_families() {
        let p8s = PrometheusMetricsRegistry::new(Registry::new());
        report(&p8s, "a");
        report(&p8s.clone(), "a");
        report(&p8s, "b");

        let text = text(p8s.registry());
        assert!(text.contains(r#"ops_total{name="a",op="hit"} 6"#));
        assert!(text.contains(r#"ops_total{name="b",op="hit"} 3"#));
        assert!(text.contains(r#"usage{name="b"} 7"#));
    }

    #[test]
    fn test_rejected_family_falls_back_to_noop() {
        let registry = Registry::new();
        report(&PrometheusMetricsRegistry::new(registry.clone()), "a");
        // Another instance does not know the families and the registry rejects the duplicates.
        report(&PrometheusMetricsRegistry::new(registry.clone()), "a");

        assert!(text(&registry).contains(r#"ops_total{name="a",op="hit"} 3"#));
    }
}
