use super::entity::Entity;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Registered,
    Unregistered,
    Updated,
    Activated,
    Deactivated,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Registered => "registered",
            Self::Unregistered => "unregistered",
            Self::Updated => "updated",
            Self::Activated => "activated",
            Self::Deactivated => "deactivated",
        };
        f.write_str(label)
    }
}

/// What happened to an entity. Unregistration carries only the id.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Registered(Entity),
    Unregistered(String),
    Updated(Entity),
    Activated(Entity),
    Deactivated(Entity),
}

/// A lifecycle notification published on the event bus.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEvent {
    pub payload: EventPayload,
    pub timestamp: DateTime<Utc>,
}

impl RegistryEvent {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            payload,
            timestamp: Utc::now(),
        }
    }

    pub fn registered(entity: Entity) -> Self {
        Self::new(EventPayload::Registered(entity))
    }

    pub fn unregistered(id: impl Into<String>) -> Self {
        Self::new(EventPayload::Unregistered(id.into()))
    }

    pub fn updated(entity: Entity) -> Self {
        Self::new(EventPayload::Updated(entity))
    }

    pub fn activated(entity: Entity) -> Self {
        Self::new(EventPayload::Activated(entity))
    }

    pub fn deactivated(entity: Entity) -> Self {
        Self::new(EventPayload::Deactivated(entity))
    }

    pub fn event_type(&self) -> EventType {
        match &self.payload {
            EventPayload::Registered(_) => EventType::Registered,
            EventPayload::Unregistered(_) => EventType::Unregistered,
            EventPayload::Updated(_) => EventType::Updated,
            EventPayload::Activated(_) => EventType::Activated,
            EventPayload::Deactivated(_) => EventType::Deactivated,
        }
    }

    pub fn entity_id(&self) -> &str {
        match &self.payload {
            EventPayload::Unregistered(id) => id,
            EventPayload::Registered(entity)
            | EventPayload::Updated(entity)
            | EventPayload::Activated(entity)
            | EventPayload::Deactivated(entity) => entity.id(),
        }
    }

    /// The entity snapshot, absent for unregistrations.
    pub fn entity(&self) -> Option<&Entity> {
        match &self.payload {
            EventPayload::Unregistered(_) => None,
            EventPayload::Registered(entity)
            | EventPayload::Updated(entity)
            | EventPayload::Activated(entity)
            | EventPayload::Deactivated(entity) => Some(entity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unregistered_event_carries_only_id() {
        let event = RegistryEvent::unregistered("usd");
        assert_eq!(event.event_type(), EventType::Unregistered);
        assert_eq!(event.entity_id(), "usd");
        assert!(event.entity().is_none());
    }

    #[test]
    fn test_entity_events_expose_snapshot() {
        let event = RegistryEvent::deactivated(Entity::new("usd", "US Dollar"));
        assert_eq!(event.event_type(), EventType::Deactivated);
        assert_eq!(event.entity().map(Entity::name), Some("US Dollar"));
        assert_eq!(event.event_type().to_string(), "deactivated");
    }
}
