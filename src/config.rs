//! Tunables shared by the cache backends and the metrics collector.

use std::time::Duration;

/// TTL applied when a cache is built without an explicit one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// How often the in-process cache sweeps expired entries.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// Shortest sweep period the in-process cache will run with.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);
/// Namespace prepended to every key written to a remote store.
pub const DEFAULT_KEY_PREFIX: &str = "registry:";
/// Number of latency samples retained per operation.
pub const DEFAULT_LATENCY_WINDOW: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Entry lifetime. `None` falls back to [`DEFAULT_TTL`].
    pub ttl: Option<Duration>,
    pub sweep_interval: Duration,
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: None,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl CacheConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Sets the sweep period, raised to at least [`MIN_SWEEP_INTERVAL`].
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval.max(MIN_SWEEP_INTERVAL);
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// The TTL actually applied to new entries.
    pub fn effective_ttl(&self) -> Duration {
        self.ttl.unwrap_or(DEFAULT_TTL)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsConfig {
    pub latency_window: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            latency_window: DEFAULT_LATENCY_WINDOW,
        }
    }
}
