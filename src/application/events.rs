//! Synchronous publish/subscribe for entity lifecycle events.

use crate::domain::entity::Entity;
use crate::domain::event::{EventPayload, RegistryEvent};
use crate::error::{RegistryError, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

/// Receives lifecycle notifications. Every method defaults to a no-op.
pub trait Observer: Send + Sync {
    fn on_entity_registered(&self, _entity: &Entity) {}
    fn on_entity_unregistered(&self, _id: &str) {}
    fn on_entity_updated(&self, _entity: &Entity) {}
    fn on_entity_activated(&self, _entity: &Entity) {}
    fn on_entity_deactivated(&self, _entity: &Entity) {}
}

fn dispatch(observer: &dyn Observer, event: &RegistryEvent) {
    match &event.payload {
        EventPayload::Registered(entity) => observer.on_entity_registered(entity),
        EventPayload::Unregistered(id) => observer.on_entity_unregistered(id),
        EventPayload::Updated(entity) => observer.on_entity_updated(entity),
        EventPayload::Activated(entity) => observer.on_entity_activated(entity),
        EventPayload::Deactivated(entity) => observer.on_entity_deactivated(entity),
    }
}

/// Fans events out to subscribers in subscription order, on the caller's task.
///
/// `emit` works on a copy of the subscriber list, so observers may subscribe
/// or unsubscribe from inside a handler. A panicking observer is contained:
/// the remaining observers still run and `emit` reports how many failed.
#[derive(Default)]
pub struct EventBus {
    observers: RwLock<Vec<Arc<dyn Observer>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn Observer>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Removes `observer` (matched by identity). Returns whether it was subscribed.
    pub fn unsubscribe(&self, observer: &Arc<dyn Observer>) -> bool {
        let mut observers = self
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|existing| !Arc::ptr_eq(existing, observer));
        observers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn emit(&self, event: &RegistryEvent) -> Result<()> {
        let snapshot: Vec<Arc<dyn Observer>> = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut failed = 0;
        for observer in snapshot {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| dispatch(observer.as_ref(), event)));
            if outcome.is_err() {
                failed += 1;
                warn!(
                    event = %event.event_type(),
                    id = event.entity_id(),
                    "observer panicked while handling event"
                );
            }
        }

        if failed > 0 {
            return Err(RegistryError::ObserverPanicked(failed));
        }
        Ok(())
    }
}

/// Logs every lifecycle event at `info` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn on_entity_registered(&self, entity: &Entity) {
        info!(id = entity.id(), name = entity.name(), "entity registered");
    }

    fn on_entity_unregistered(&self, id: &str) {
        info!(id, "entity unregistered");
    }

    fn on_entity_updated(&self, entity: &Entity) {
        info!(id = entity.id(), name = entity.name(), "entity updated");
    }

    fn on_entity_activated(&self, entity: &Entity) {
        info!(id = entity.id(), "entity activated");
    }

    fn on_entity_deactivated(&self, entity: &Entity) {
        info!(id = entity.id(), "entity deactivated");
    }
}
