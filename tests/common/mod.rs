#![allow(dead_code)]

use async_trait::async_trait;
use entity_registry::application::events::Observer;
use entity_registry::domain::context::Context;
use entity_registry::domain::entity::Entity;
use entity_registry::domain::ports::{CacheBackend, PersistenceBackend};
use entity_registry::error::{RegistryError, Result};
use std::io::Error;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Appends `label:event:id` for every notification it receives.
pub struct RecordingObserver {
    label: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingObserver {
    pub fn new(label: &'static str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self { label, log }
    }

    fn record(&self, event: &str, id: &str) {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}:{}", self.label, event, id));
    }
}

impl Observer for RecordingObserver {
    fn on_entity_registered(&self, entity: &Entity) {
        self.record("registered", entity.id());
    }

    fn on_entity_unregistered(&self, id: &str) {
        self.record("unregistered", id);
    }

    fn on_entity_updated(&self, entity: &Entity) {
        self.record("updated", entity.id());
    }

    fn on_entity_activated(&self, entity: &Entity) {
        self.record("activated", entity.id());
    }

    fn on_entity_deactivated(&self, entity: &Entity) {
        self.record("deactivated", entity.id());
    }
}

/// A persistence backend whose writes always fail.
#[derive(Default)]
pub struct FailingPersistence;

#[async_trait]
impl PersistenceBackend for FailingPersistence {
    async fn save(&self, _ctx: &Context, _entities: &[Entity]) -> Result<()> {
        Err(RegistryError::IoError(Error::other("disk full")))
    }

    async fn load(&self, _ctx: &Context) -> Result<Vec<Entity>> {
        Ok(Vec::new())
    }

    async fn delete(&self, _ctx: &Context, _id: &str) -> Result<()> {
        Err(RegistryError::IoError(Error::other("disk full")))
    }

    async fn clear(&self, _ctx: &Context) -> Result<()> {
        Ok(())
    }
}

/// A cache whose writes always fail; reads always miss.
#[derive(Default)]
pub struct FailingCache;

#[async_trait]
impl CacheBackend for FailingCache {
    async fn get(&self, _ctx: &Context, _id: &str) -> Result<Option<Entity>> {
        Ok(None)
    }

    async fn set(&self, _ctx: &Context, _entity: &Entity) -> Result<()> {
        Err(RegistryError::Backend("connection refused".to_string()))
    }

    async fn delete(&self, _ctx: &Context, _id: &str) -> Result<()> {
        Err(RegistryError::Backend("connection refused".to_string()))
    }

    async fn clear(&self, _ctx: &Context) -> Result<()> {
        Ok(())
    }

    async fn size(&self, _ctx: &Context) -> Result<usize> {
        Ok(0)
    }
}

pub fn currency(id: &str, name: &str, symbol: &str) -> Entity {
    Entity::new(id, name)
        .with_metadata("symbol", symbol)
        .expect("symbol is not a reserved key")
}

pub fn write_currency_csv(path: &Path, rows: &[(&str, &str, &str)]) -> std::result::Result<(), Error> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["id", "name", "active", "symbol"])?;
    for (id, name, symbol) in rows {
        wtr.write_record([*id, *name, "true", *symbol])?;
    }
    wtr.flush()?;
    Ok(())
}
