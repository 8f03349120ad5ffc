use crate::config::MetricsConfig;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

#[derive(Debug, Default)]
struct Counters {
    registrations: u64,
    unregistrations: u64,
    lookups: u64,
    errors: u64,
    entity_count: usize,
    active_count: usize,
    latencies: BTreeMap<String, VecDeque<Duration>>,
}

/// Operational counters, gauges, and a bounded latency window per operation.
///
/// All state is mutated through the methods below; [`Metrics::stats`] hands
/// out owned snapshots only.
pub struct Metrics {
    window: usize,
    inner: RwLock<Counters>,
}

/// A point-in-time copy of the [`Metrics`] state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub registrations: u64,
    pub unregistrations: u64,
    pub lookups: u64,
    pub errors: u64,
    pub entity_count: usize,
    pub active_count: usize,
    /// Most recent samples per operation, oldest first.
    pub latencies: BTreeMap<String, Vec<Duration>>,
}

impl MetricsSnapshot {
    pub fn average_latency(&self, operation: &str) -> Option<Duration> {
        let samples = self.latencies.get(operation)?;
        if samples.is_empty() {
            return None;
        }
        let total: Duration = samples.iter().sum();
        Some(total / samples.len() as u32)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new(MetricsConfig::default())
    }
}

impl Metrics {
    pub fn new(config: MetricsConfig) -> Self {
        Self {
            window: config.latency_window.max(1),
            inner: RwLock::default(),
        }
    }

    fn with_counters<T>(&self, f: impl FnOnce(&mut Counters) -> T) -> T {
        let mut counters = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut counters)
    }

    pub fn record_registration(&self) {
        self.with_counters(|c| c.registrations += 1);
    }

    pub fn record_unregistration(&self) {
        self.with_counters(|c| c.unregistrations += 1);
    }

    pub fn record_lookup(&self) {
        self.with_counters(|c| c.lookups += 1);
    }

    pub fn record_error(&self) {
        self.with_counters(|c| c.errors += 1);
    }

    pub fn set_entity_counts(&self, total: usize, active: usize) {
        self.with_counters(|c| {
            c.entity_count = total;
            c.active_count = active;
        });
    }

    /// Appends a sample, dropping the oldest once the window is full.
    pub fn observe_latency(&self, operation: &str, elapsed: Duration) {
        let window = self.window;
        self.with_counters(|c| {
            let samples = c.latencies.entry(operation.to_string()).or_default();
            if samples.len() == window {
                samples.pop_front();
            }
            samples.push_back(elapsed);
        });
    }

    pub fn stats(&self) -> MetricsSnapshot {
        let counters = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        MetricsSnapshot {
            registrations: counters.registrations,
            unregistrations: counters.unregistrations,
            lookups: counters.lookups,
            errors: counters.errors,
            entity_count: counters.entity_count,
            active_count: counters.active_count,
            latencies: counters
                .latencies
                .iter()
                .map(|(op, samples)| (op.clone(), samples.iter().copied().collect()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_gauges() {
        let metrics = Metrics::default();
        metrics.record_registration();
        metrics.record_registration();
        metrics.record_unregistration();
        metrics.record_lookup();
        metrics.record_error();
        metrics.set_entity_counts(3, 2);

        let stats = metrics.stats();
        assert_eq!(stats.registrations, 2);
        assert_eq!(stats.unregistrations, 1);
        assert_eq!(stats.lookups, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.entity_count, 3);
        assert_eq!(stats.active_count, 2);
    }

    #[test]
    fn test_latency_window_keeps_most_recent() {
        let metrics = Metrics::default();
        for ms in 0..150u64 {
            metrics.observe_latency("get", Duration::from_millis(ms));
        }

        let samples = &metrics.stats().latencies["get"];
        assert_eq!(samples.len(), 100);
        assert_eq!(samples[0], Duration::from_millis(50));
        assert_eq!(samples[99], Duration::from_millis(149));
    }

    #[test]
    fn test_average_latency() {
        let metrics = Metrics::new(MetricsConfig { latency_window: 2 });
        metrics.observe_latency("register", Duration::from_millis(10));
        metrics.observe_latency("register", Duration::from_millis(20));
        metrics.observe_latency("register", Duration::from_millis(30));

        let stats = metrics.stats();
        assert_eq!(stats.average_latency("register"), Some(Duration::from_millis(25)));
        assert_eq!(stats.average_latency("get"), None);
    }

    #[test]
    fn test_snapshots_are_independent() {
        let metrics = Metrics::default();
        metrics.record_lookup();
        metrics.observe_latency("get", Duration::from_micros(5));

        let mut first = metrics.stats();
        let second = metrics.stats();
        assert_eq!(first, second);

        first.lookups = 99;
        first.latencies.get_mut("get").unwrap().clear();

        assert_ne!(first, second);
        assert_eq!(metrics.stats(), second);
    }
}
