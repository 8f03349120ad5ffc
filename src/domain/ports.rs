use super::context::Context;
use super::entity::Entity;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Short-lived storage with expiry. A miss, expired or absent, is `Ok(None)`.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, ctx: &Context, id: &str) -> Result<Option<Entity>>;
    async fn set(&self, ctx: &Context, entity: &Entity) -> Result<()>;
    async fn delete(&self, ctx: &Context, id: &str) -> Result<()>;
    async fn clear(&self, ctx: &Context) -> Result<()>;
    async fn size(&self, ctx: &Context) -> Result<usize>;
}

/// Optional durable storage, written as whole snapshots.
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Replaces the stored set with `entities`.
    async fn save(&self, ctx: &Context, entities: &[Entity]) -> Result<()>;
    /// Returns the stored set, or an empty one when nothing was saved yet.
    async fn load(&self, ctx: &Context) -> Result<Vec<Entity>>;
    async fn delete(&self, ctx: &Context, id: &str) -> Result<()>;
    async fn clear(&self, ctx: &Context) -> Result<()>;
}

/// The client contract a remote cache is built on: a string store with native
/// per-key expiry and glob key enumeration.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<()>;
    /// Deletes `keys`, returning how many existed.
    async fn del(&self, keys: &[String]) -> Result<u64>;
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;
}

pub type CacheBackendBox = Box<dyn CacheBackend>;
pub type PersistenceBackendBox = Box<dyn PersistenceBackend>;
