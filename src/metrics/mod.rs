// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Process wide metrics registry. Subsystems register their metrics lazily
//! through [`register`]; [`encode_metrics`] renders whatever exists so far.

use parking_lot::RwLock;
use prometheus_client::{
    encoding::{EncodeLabelSet, EncodeLabelValue},
    metrics::{counter::Counter, family::Family, histogram::Histogram},
    registry::{Metric, Registry},
};
use std::sync::LazyLock;
use std::time::Instant;

static REGISTRY: LazyLock<RwLock<Registry>> =
    LazyLock::new(|| RwLock::new(Registry::with_prefix("forest_chain_sync")));

/// Adds `metric` to the process registry and returns it.
pub fn register<M: Metric + Clone>(name: &str, help: &str, metric: M) -> M {
    REGISTRY.write().register(name, help, metric.clone());
    metric
}

/// Renders every registered metric in the OpenMetrics text format.
pub fn encode_metrics() -> anyhow::Result<String> {
    let mut metrics = String::new();
    prometheus_client::encoding::text::encode(&mut metrics, &REGISTRY.read())?;
    Ok(metrics)
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Cache {
    /// Tipsets loaded by key.
    Tipset,
    /// Computed state and receipt roots per tipset.
    TipsetState,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Lookup {
    Hit,
    Miss,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct CacheLabel {
    cache: Cache,
    lookup: Lookup,
}

static CACHE_LOOKUP_TOTAL: LazyLock<Family<CacheLabel, Counter>> = LazyLock::new(|| {
    register(
        "cache_lookup",
        "Cache lookups by cache and result",
        Family::default(),
    )
});

pub fn record_cache_lookup(cache: Cache, hit: bool) {
    let lookup = if hit { Lookup::Hit } else { Lookup::Miss };
    CACHE_LOOKUP_TOTAL
        .get_or_create(&CacheLabel { cache, lookup })
        .inc();
}

/// Buckets in seconds, from a cached block check up to a cold state
/// computation over a long chain.
pub fn duration_histogram() -> Histogram {
    Histogram::new([0.001, 0.005, 0.025, 0.1, 0.5, 1.0, 2.5, 10.0, 30.0, 120.0])
}

/// Observes the time until it is dropped.
pub struct HistogramTimer<'a> {
    histogram: &'a Histogram,
    start: Instant,
}

impl Drop for HistogramTimer<'_> {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

pub trait HistogramTimerExt {
    fn start_timer(&self) -> HistogramTimer<'_>;
}

impl HistogramTimerExt for Histogram {
    fn start_timer(&self) -> HistogramTimer<'_> {
        HistogramTimer {
            histogram: self,
            start: Instant::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_lookups_are_exported() {
        record_cache_lookup(Cache::Tipset, true);
        record_cache_lookup(Cache::TipsetState, false);
        let text = encode_metrics().unwrap();
        assert!(text.contains("forest_chain_sync_cache_lookup_total"), "{text}");
        assert!(text.contains("cache=\"Tipset\",lookup=\"Hit\""), "{text}");
        assert!(text.contains("cache=\"TipsetState\",lookup=\"Miss\""), "{text}");
    }

    #[test]
    fn timer_observes_on_drop() {
        let histogram = duration_histogram();
        drop(histogram.start_timer());
        let mut registry = Registry::default();
        registry.register("timed", "", histogram);
        let mut text = String::new();
        prometheus_client::encoding::text::encode(&mut text, &registry).unwrap();
        assert!(text.contains("timed_count 1"), "{text}");
    }
}
