use crate::application::events::EventBus;
use crate::application::health::{Health, HealthStatus};
use crate::application::metrics::{Metrics, MetricsSnapshot};
use crate::application::validator::Validator;
use crate::config::MetricsConfig;
use crate::domain::context::Context;
use crate::domain::entity::{Entity, Metadata};
use crate::domain::event::RegistryEvent;
use crate::domain::ports::{CacheBackendBox, PersistenceBackendBox};
use crate::error::{RegistryError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// The registry facade other subsystems call.
///
/// `RegistryProvider` owns the authoritative index of entities and sequences
/// every write as validate -> persist -> cache -> notify -> metrics. A failing
/// step aborts the ones after it and nothing is rolled back, so persistence and
/// cache may briefly disagree after a partial failure.
///
/// Writes are serialized so each persisted snapshot matches the index; reads
/// run concurrently and never wait on a write's backend I/O.
///
/// With persistence configured, the index is loaded from the snapshot before
/// the first operation that needs it, so an existing snapshot is never
/// overwritten by a partial index.
pub struct RegistryProvider {
    cache: CacheBackendBox,
    persistence: Option<PersistenceBackendBox>,
    validator: Validator,
    events: EventBus,
    metrics: Metrics,
    health: Health,
    index: RwLock<HashMap<String, Entity>>,
    loaded: AtomicBool,
    writes: Mutex<()>,
}

impl RegistryProvider {
    /// Creates a cache-only provider with no validation rules.
    ///
    /// # Arguments
    ///
    /// * `cache` - The cache tier every write goes through.
    pub fn new(cache: CacheBackendBox) -> Self {
        Self {
            cache,
            persistence: None,
            validator: Validator::new(),
            events: EventBus::new(),
            metrics: Metrics::default(),
            health: Health::new(),
            index: RwLock::default(),
            loaded: AtomicBool::new(false),
            writes: Mutex::new(()),
        }
    }

    pub fn with_persistence(mut self, persistence: PersistenceBackendBox) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_metrics_config(mut self, config: MetricsConfig) -> Self {
        self.metrics = Metrics::new(config);
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn health(&self) -> &Health {
        &self.health
    }

    pub fn stats(&self) -> MetricsSnapshot {
        self.metrics.stats()
    }

    pub fn health_status(&self) -> HealthStatus {
        self.health.status()
    }

    /// Replaces the index with the persisted snapshot and warms the cache.
    ///
    /// Returns the number of entities restored; zero without persistence.
    pub async fn restore(&self, ctx: &Context) -> Result<usize> {
        let started = Instant::now();
        let result = self.restore_inner(ctx).await;
        self.finish("restore", started, result)
    }

    async fn restore_inner(&self, ctx: &Context) -> Result<usize> {
        ctx.check()?;
        if self.persistence.is_none() {
            return Ok(0);
        }

        let _write = self.writes.lock().await;
        let entities = self.load_index(ctx).await?;

        for entity in &entities {
            self.cache.set(ctx, entity).await?;
        }
        info!(count = entities.len(), "registry restored from persistence");
        Ok(entities.len())
    }

    /// Inserts `entity`, or replaces the entity with the same id.
    ///
    /// A replacement keeps the original `created_at`. Emits `Registered` for a
    /// new id and `Updated` otherwise, and returns the entity as stored.
    pub async fn register(&self, ctx: &Context, entity: Entity) -> Result<Entity> {
        let started = Instant::now();
        let result = self.register_inner(ctx, entity).await;
        self.finish("register", started, result)
    }

    async fn register_inner(&self, ctx: &Context, mut entity: Entity) -> Result<Entity> {
        ctx.check()?;
        self.validator.validate(&entity)?;
        self.ensure_loaded(ctx).await?;

        let _write = self.writes.lock().await;
        let previous = self.index.read().await.get(entity.id()).cloned();
        if let Some(previous) = &previous {
            entity.supersede(previous);
        }

        self.persist_with(ctx, &entity).await?;
        self.commit(&entity).await;
        self.cache.set(ctx, &entity).await?;

        let event = match previous {
            Some(_) => RegistryEvent::updated(entity.clone()),
            None => RegistryEvent::registered(entity.clone()),
        };
        self.publish(&event);
        self.metrics.record_registration();
        debug!(id = entity.id(), event = %event.event_type(), "entity stored");
        Ok(entity)
    }

    /// Looks `id` up in the cache, then in persistence (or the index when there
    /// is none), repopulating the cache on a hit.
    pub async fn get(&self, ctx: &Context, id: &str) -> Result<Option<Entity>> {
        let started = Instant::now();
        let result = self.get_inner(ctx, id).await;
        self.finish("get", started, result)
    }

    async fn get_inner(&self, ctx: &Context, id: &str) -> Result<Option<Entity>> {
        ctx.check()?;
        self.metrics.record_lookup();
        self.ensure_loaded(ctx).await?;

        if let Some(entity) = self.cache.get(ctx, id).await? {
            return Ok(Some(entity));
        }

        // Hold the write lock so a concurrent unregister cannot be undone by
        // repopulating the cache with what it just removed.
        let _write = self.writes.lock().await;
        let found = match &self.persistence {
            Some(persistence) => persistence
                .load(ctx)
                .await?
                .into_iter()
                .find(|entity| entity.id() == id),
            None => None,
        };
        let found = match found {
            Some(entity) => Some(entity),
            None => self.index.read().await.get(id).cloned(),
        };

        if let Some(entity) = &found {
            self.cache.set(ctx, entity).await?;
            debug!(id, "cache repopulated");
        }
        Ok(found)
    }

    /// Removes `id`. Returns `false` when no such entity is registered, however
    /// many times it is called.
    pub async fn unregister(&self, ctx: &Context, id: &str) -> Result<bool> {
        let started = Instant::now();
        let result = self.unregister_inner(ctx, id).await;
        self.finish("unregister", started, result)
    }

    async fn unregister_inner(&self, ctx: &Context, id: &str) -> Result<bool> {
        ctx.check()?;
        self.ensure_loaded(ctx).await?;
        let _write = self.writes.lock().await;
        if !self.index.read().await.contains_key(id) {
            debug!(id, "unregister of unknown entity");
            return Ok(false);
        }

        if let Some(persistence) = &self.persistence {
            persistence.delete(ctx, id).await?;
        }
        self.index.write().await.remove(id);
        self.refresh_gauges().await;
        self.cache.delete(ctx, id).await?;

        self.publish(&RegistryEvent::unregistered(id));
        self.metrics.record_unregistration();
        Ok(true)
    }

    pub async fn activate(&self, ctx: &Context, id: &str) -> Result<Entity> {
        let started = Instant::now();
        let result = self.set_active(ctx, id, true).await;
        self.finish("activate", started, result)
    }

    pub async fn deactivate(&self, ctx: &Context, id: &str) -> Result<Entity> {
        let started = Instant::now();
        let result = self.set_active(ctx, id, false).await;
        self.finish("deactivate", started, result)
    }

    async fn set_active(&self, ctx: &Context, id: &str, active: bool) -> Result<Entity> {
        ctx.check()?;
        self.ensure_loaded(ctx).await?;
        let _write = self.writes.lock().await;
        let mut entity = self
            .index
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        entity.set_active(active);

        self.persist_with(ctx, &entity).await?;
        self.commit(&entity).await;
        self.cache.set(ctx, &entity).await?;

        let event = if active {
            RegistryEvent::activated(entity.clone())
        } else {
            RegistryEvent::deactivated(entity.clone())
        };
        self.publish(&event);
        Ok(entity)
    }

    /// All entities, ordered by id.
    pub async fn list(&self, ctx: &Context) -> Result<Vec<Entity>> {
        self.collect(ctx, |_| true).await
    }

    pub async fn list_active(&self, ctx: &Context) -> Result<Vec<Entity>> {
        self.collect(ctx, Entity::is_active).await
    }

    /// Case-insensitive substring match on id, name, or any metadata value.
    /// An empty query matches everything.
    pub async fn search(&self, ctx: &Context, query: &str) -> Result<Vec<Entity>> {
        let needle = query.to_lowercase();
        self.collect(ctx, |entity| {
            entity.id().to_lowercase().contains(&needle)
                || entity.name().to_lowercase().contains(&needle)
                || entity
                    .metadata()
                    .values()
                    .any(|value| value.to_lowercase().contains(&needle))
        })
        .await
    }

    /// Entities whose metadata contains every pair in `filter`.
    pub async fn search_by_metadata(&self, ctx: &Context, filter: &Metadata) -> Result<Vec<Entity>> {
        self.collect(ctx, |entity| {
            filter
                .iter()
                .all(|(key, value)| entity.metadata_value(key) == Some(value.as_str()))
        })
        .await
    }

    pub async fn count(&self, ctx: &Context) -> Result<usize> {
        ctx.check()?;
        self.ensure_loaded(ctx).await?;
        Ok(self.index.read().await.len())
    }

    pub async fn count_active(&self, ctx: &Context) -> Result<usize> {
        ctx.check()?;
        self.ensure_loaded(ctx).await?;
        Ok(self
            .index
            .read()
            .await
            .values()
            .filter(|entity| entity.is_active())
            .count())
    }

    async fn collect(&self, ctx: &Context, keep: impl Fn(&Entity) -> bool) -> Result<Vec<Entity>> {
        ctx.check()?;
        self.ensure_loaded(ctx).await?;
        let mut entities: Vec<Entity> = self
            .index
            .read()
            .await
            .values()
            .filter(|&entity| keep(entity))
            .cloned()
            .collect();
        entities.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(entities)
    }

    /// Loads the snapshot into the index once. Must not be called while holding `writes`.
    async fn ensure_loaded(&self, ctx: &Context) -> Result<()> {
        if self.persistence.is_none() || self.loaded.load(Ordering::Acquire) {
            return Ok(());
        }
        let _write = self.writes.lock().await;
        if self.loaded.load(Ordering::Acquire) {
            return Ok(());
        }
        let entities = self.load_index(ctx).await?;
        debug!(count = entities.len(), "index loaded from persistence");
        Ok(())
    }

    /// Replaces the index with the persisted snapshot. Callers hold `writes`.
    async fn load_index(&self, ctx: &Context) -> Result<Vec<Entity>> {
        let Some(persistence) = &self.persistence else {
            return Ok(Vec::new());
        };
        let entities = persistence.load(ctx).await?;
        {
            let mut index = self.index.write().await;
            index.clear();
            for entity in &entities {
                index.insert(entity.id().to_string(), entity.clone());
            }
        }
        self.loaded.store(true, Ordering::Release);
        self.refresh_gauges().await;
        Ok(entities)
    }

    /// Saves the current index with `entity` applied, if persistence is configured.
    async fn persist_with(&self, ctx: &Context, entity: &Entity) -> Result<()> {
        let Some(persistence) = &self.persistence else {
            return Ok(());
        };
        let snapshot: Vec<Entity> = {
            let index = self.index.read().await;
            index
                .values()
                .filter(|existing| existing.id() != entity.id())
                .cloned()
                .chain(std::iter::once(entity.clone()))
                .collect()
        };
        persistence.save(ctx, &snapshot).await
    }

    async fn commit(&self, entity: &Entity) {
        self.index
            .write()
            .await
            .insert(entity.id().to_string(), entity.clone());
        self.refresh_gauges().await;
    }

    async fn refresh_gauges(&self) {
        let (total, active) = {
            let index = self.index.read().await;
            (index.len(), index.values().filter(|e| e.is_active()).count())
        };
        self.metrics.set_entity_counts(total, active);
    }

    /// Observer failures are contained by the bus and never fail the write.
    fn publish(&self, event: &RegistryEvent) {
        if let Err(err) = self.events.emit(event) {
            warn!(event = %event.event_type(), id = event.entity_id(), error = %err, "event delivery incomplete");
            self.metrics.record_error();
        }
    }

    fn finish<T>(&self, operation: &'static str, started: Instant, result: Result<T>) -> Result<T> {
        self.metrics.observe_latency(operation, started.elapsed());
        if let Err(err) = &result {
            self.metrics.record_error();
            if err.is_backend_failure() {
                error!(operation, error = %err, "registry backend failure");
                self.health.set_error(format!("{operation}: {err}"));
            } else {
                debug!(operation, error = %err, "registry operation rejected");
            }
        }
        result
    }
}
