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

use crate::metrics::{
    BoxedCounter, BoxedCounterVec, BoxedGauge, BoxedGaugeVec, Boxer, CounterOps, CounterVecOps, GaugeOps, GaugeVecOps,
    RegistryOps,
};

/// Metrics backend that drops every record. The default of a cache built without a registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetricsRegistry;

impl CounterOps for NoopMetricsRegistry {
    fn increase(&self, _: u64) {}
}

impl GaugeOps for NoopMetricsRegistry {
    fn increase(&self, _: u64) {}
    fn decrease(&self, _: u64) {}
    fn absolute(&self, _: u64) {}
}

impl CounterVecOps for NoopMetricsRegistry {
    fn counter(&self, _: &[Cow<'static, str>]) -> BoxedCounter {
        NoopMetricsRegistry.boxed()
    }
}

impl GaugeVecOps for NoopMetricsRegistry {
    fn gauge(&self, _: &[Cow<'static, str>]) -> BoxedGauge {
        NoopMetricsRegistry.boxed()
    }
}

impl RegistryOps for NoopMetricsRegistry {
    fn register_counter_vec(&self, _: Cow<'static, str>, _: Cow<'static, str>, _: &'static [&'static str]) -> BoxedCounterVec {
        NoopMetricsRegistry.boxed()
    }

    fn register_gauge_vec(&self, _: Cow<'static, str>, _: Cow<'static, str>, _: &'static [&'static str]) -> BoxedGaugeVec {
        NoopMetricsRegistry.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_accepts_any_labels() {
        let registry = NoopMetricsRegistry;

        let ops = registry.register_counter_vec("ops".into(), "ops".into(), &["name", "op"]);
        ops.counter(&["cache".into(), "hit".into()]).increase(1);
        // Label arity is not checked.
        ops.counter(&[]).increase(1);

        let usage = registry.register_gauge_vec("usage".into(), "usage".into(), &["name"]);
        let g = usage.gauge(&["cache".into()]);
        g.increase(8);
        g.decrease(3);
        g.absolute(0);
    }
}
