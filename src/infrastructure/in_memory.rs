use crate::config::{CacheConfig, MIN_SWEEP_INTERVAL};
use crate::domain::context::Context;
use crate::domain::entity::Entity;
use crate::domain::ports::{CacheBackend, KeyValueStore};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

struct CacheEntry {
    entity: Entity,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

type EntryMap = Arc<RwLock<HashMap<String, CacheEntry>>>;

/// A thread-safe in-process cache with per-entry expiry.
///
/// Uses `Arc<RwLock<HashMap<String, CacheEntry>>>` for shared concurrent access.
/// Expired entries are evicted lazily on read and proactively by a background
/// sweeper that the constructor spawns once. The sweeper stops on
/// [`InMemoryCache::shutdown`] or when the cache is dropped.
pub struct InMemoryCache {
    entries: EntryMap,
    ttl: Duration,
    shutdown: watch::Sender<bool>,
}

impl InMemoryCache {
    /// Creates a cache and starts its sweeper on the current Tokio runtime.
    ///
    /// Outside a runtime no sweeper is started and expiry is enforced on read only.
    pub fn new(config: &CacheConfig) -> Self {
        let entries: EntryMap = Arc::default();
        // The field is public, so the builder's clamp can be bypassed.
        let period = config.sweep_interval.max(MIN_SWEEP_INTERVAL);
        let (shutdown, shutdown_rx) = watch::channel(false);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(sweep_loop(
                    entries.clone(),
                    period,
                    shutdown_rx,
                ));
            }
            Err(_) => {
                warn!("no Tokio runtime available, cache sweeper not started");
            }
        }

        Self {
            entries,
            ttl: config.effective_ttl(),
            shutdown,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Stops the background sweeper. Lazy eviction keeps working.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Removes every expired entry, returning how many were evicted.
    pub async fn sweep(&self) -> usize {
        sweep_expired(&self.entries).await
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

async fn sweep_expired(entries: &RwLock<HashMap<String, CacheEntry>>) -> usize {
    let now = Instant::now();
    let mut entries = entries.write().await;
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired(now));
    before - entries.len()
}

async fn sweep_loop(entries: EntryMap, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let evicted = sweep_expired(&entries).await;
                if evicted > 0 {
                    debug!(evicted, "swept expired cache entries");
                }
            }
            changed = shutdown.changed() => {
                // Err means the owning cache was dropped.
                if changed.is_err() || *shutdown.borrow() {
                    debug!("cache sweeper stopped");
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, _ctx: &Context, id: &str) -> Result<Option<Entity>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(id) {
                None => {
                    debug!(id, "cache miss");
                    return Ok(None);
                }
                Some(entry) if !entry.is_expired(now) => {
                    debug!(id, "cache hit");
                    return Ok(Some(entry.entity.clone()));
                }
                Some(_) => {}
            }
        }

        // Re-check under the write lock: a concurrent set may have refreshed it.
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(id) {
            if !entry.is_expired(Instant::now()) {
                return Ok(Some(entry.entity.clone()));
            }
            entries.remove(id);
            debug!(id, "cache miss (expired)");
        }
        Ok(None)
    }

    async fn set(&self, _ctx: &Context, entity: &Entity) -> Result<()> {
        let entry = CacheEntry {
            entity: entity.clone(),
            expires_at: Instant::now() + self.ttl,
        };
        let mut entries = self.entries.write().await;
        entries.insert(entity.id().to_string(), entry);
        Ok(())
    }

    async fn delete(&self, _ctx: &Context, id: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.remove(id);
        Ok(())
    }

    async fn clear(&self, _ctx: &Context) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.clear();
        Ok(())
    }

    async fn size(&self, _ctx: &Context) -> Result<usize> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries.values().filter(|e| !e.is_expired(now)).count())
    }
}

struct StoredValue {
    value: String,
    expires_at: Instant,
}

/// A process-local [`KeyValueStore`] with native per-key expiry.
///
/// Stands in for a remote store when none is reachable. Key patterns support
/// a single trailing `*` wildcard.
#[derive(Default, Clone)]
pub struct InMemoryKeyValueStore {
    values: Arc<RwLock<HashMap<String, StoredValue>>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_pattern(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.read().await;
        Ok(values
            .get(key)
            .filter(|stored| Instant::now() <= stored.expires_at)
            .map(|stored| stored.value.clone()))
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let mut values = self.values.write().await;
        values.insert(
            key.to_string(),
            StoredValue {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64> {
        let now = Instant::now();
        let mut values = self.values.write().await;
        let mut deleted = 0;
        for key in keys {
            if let Some(stored) = values.remove(key)
                && now <= stored.expires_at
            {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let now = Instant::now();
        let mut values = self.values.write().await;
        values.retain(|_, stored| now <= stored.expires_at);
        Ok(values
            .keys()
            .filter(|key| matches_pattern(pattern, key))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_lived() -> CacheConfig {
        CacheConfig::default()
            .with_ttl(Duration::from_secs(10))
            .with_sweep_interval(Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_in_memory_cache_set_get() {
        let ctx = Context::background();
        let cache = InMemoryCache::new(&short_lived());
        let entity = Entity::new("usd", "US Dollar");

        cache.set(&ctx, &entity).await.unwrap();
        let retrieved = cache.get(&ctx, "usd").await.unwrap().unwrap();
        assert_eq!(retrieved, entity);

        assert!(cache.get(&ctx, "eur").await.unwrap().is_none());
        assert_eq!(cache.size(&ctx).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let ctx = Context::background();
        let cache = InMemoryCache::new(&short_lived());
        cache.set(&ctx, &Entity::new("usd", "US Dollar")).await.unwrap();

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(cache.get(&ctx, "usd").await.unwrap().is_some());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(cache.get(&ctx, "usd").await.unwrap().is_none());
        assert_eq!(cache.size(&ctx).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_unread_entries() {
        let ctx = Context::background();
        let cache = InMemoryCache::new(&short_lived());
        cache.set(&ctx, &Entity::new("usd", "US Dollar")).await.unwrap();

        // Past the TTL and one sweep interval.
        tokio::time::sleep(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;

        assert!(cache.entries.read().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_sweep_counts_evictions() {
        let ctx = Context::background();
        let cache = InMemoryCache::new(&short_lived());
        cache.shutdown();
        cache.set(&ctx, &Entity::new("usd", "US Dollar")).await.unwrap();
        cache.set(&ctx, &Entity::new("eur", "Euro")).await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.sweep().await, 2);
        assert_eq!(cache.sweep().await, 0);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let ctx = Context::background();
        let cache = InMemoryCache::default();
        assert_eq!(cache.ttl(), crate::config::DEFAULT_TTL);

        cache.set(&ctx, &Entity::new("usd", "US Dollar")).await.unwrap();
        cache.set(&ctx, &Entity::new("eur", "Euro")).await.unwrap();

        cache.delete(&ctx, "usd").await.unwrap();
        assert!(cache.get(&ctx, "usd").await.unwrap().is_none());
        assert_eq!(cache.size(&ctx).await.unwrap(), 1);

        cache.clear(&ctx).await.unwrap();
        assert_eq!(cache.size(&ctx).await.unwrap(), 0);
    }

    #[test]
    fn test_cache_outside_runtime_still_evicts_lazily() {
        let config = CacheConfig::default().with_ttl(Duration::from_millis(20));
        let cache = InMemoryCache::new(&config);
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async {
            let ctx = Context::background();
            cache.set(&ctx, &Entity::new("usd", "US Dollar")).await.unwrap();
            assert!(cache.get(&ctx, "usd").await.unwrap().is_some());

            tokio::time::sleep(Duration::from_millis(40)).await;
            assert!(cache.get(&ctx, "usd").await.unwrap().is_none());
            // No sweeper ran; the read itself removed the entry.
            assert!(cache.entries.read().await.is_empty());
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_sweep_interval_still_sweeps() {
        let ctx = Context::background();
        let config = CacheConfig {
            ttl: Some(Duration::from_secs(1)),
            sweep_interval: Duration::ZERO,
            ..CacheConfig::default()
        };
        let cache = InMemoryCache::new(&config);
        cache.set(&ctx, &Entity::new("usd", "US Dollar")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1100)).await;
        tokio::task::yield_now().await;

        assert!(cache.entries.read().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_value_store_expiry_and_patterns() {
        let store = InMemoryKeyValueStore::new();
        store
            .set_ex("registry:usd", "a".into(), Duration::from_secs(5))
            .await
            .unwrap();
        store
            .set_ex("other:usd", "b".into(), Duration::from_secs(50))
            .await
            .unwrap();

        assert_eq!(store.keys("registry:*").await.unwrap(), vec!["registry:usd"]);
        assert_eq!(store.get("registry:usd").await.unwrap().as_deref(), Some("a"));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(store.get("registry:usd").await.unwrap().is_none());
        assert!(store.keys("registry:*").await.unwrap().is_empty());
        assert_eq!(store.del(&["other:usd".to_string()]).await.unwrap(), 1);
    }
}
