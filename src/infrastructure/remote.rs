use crate::config::CacheConfig;
use crate::domain::context::Context;
use crate::domain::entity::Entity;
use crate::domain::ports::{CacheBackend, KeyValueStore};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A cache backed by a remote key-value store.
///
/// Entries are stored as JSON under `{prefix}{id}` and expire through the
/// store's own per-key TTL, so there is no local sweeper. `clear` and `size`
/// enumerate every key under the prefix and cost time proportional to the
/// store's size.
pub struct RemoteCache {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
    ttl: Duration,
}

impl RemoteCache {
    pub fn new(store: Arc<dyn KeyValueStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            prefix: config.key_prefix.clone(),
            ttl: config.effective_ttl(),
        }
    }

    /// Build a full key with prefix.
    fn key(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }

    fn pattern(&self) -> String {
        format!("{}*", self.prefix)
    }
}

#[async_trait]
impl CacheBackend for RemoteCache {
    async fn get(&self, ctx: &Context, id: &str) -> Result<Option<Entity>> {
        let key = self.key(id);
        let raw = ctx.run(self.store.get(&key)).await?;
        match raw {
            Some(json) => {
                debug!(key = %key, "remote cache hit");
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => {
                debug!(key = %key, "remote cache miss");
                Ok(None)
            }
        }
    }

    async fn set(&self, ctx: &Context, entity: &Entity) -> Result<()> {
        let key = self.key(entity.id());
        let json = serde_json::to_string(entity)?;
        ctx.run(self.store.set_ex(&key, json, self.ttl)).await?;
        debug!(key = %key, ttl_secs = self.ttl.as_secs(), "remote cache set");
        Ok(())
    }

    async fn delete(&self, ctx: &Context, id: &str) -> Result<()> {
        let key = self.key(id);
        ctx.run(self.store.del(std::slice::from_ref(&key))).await?;
        Ok(())
    }

    async fn clear(&self, ctx: &Context) -> Result<()> {
        let keys = ctx.run(self.store.keys(&self.pattern())).await?;
        if keys.is_empty() {
            return Ok(());
        }
        let deleted = ctx.run(self.store.del(&keys)).await?;
        debug!(prefix = %self.prefix, deleted, "remote cache cleared");
        Ok(())
    }

    async fn size(&self, ctx: &Context) -> Result<usize> {
        let keys = ctx.run(self.store.keys(&self.pattern())).await?;
        Ok(keys.len())
    }
}
