use crate::error::{RegistryError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Free-form string attributes attached to an entity.
pub type Metadata = HashMap<String, String>;

/// Core field names that metadata keys may not shadow, compared case-insensitively.
pub const RESERVED_FIELDS: [&str; 7] = [
    "id",
    "name",
    "active",
    "createdAt",
    "updatedAt",
    "created_at",
    "updated_at",
];

/// Returns `true` when `key` collides with one of the [`RESERVED_FIELDS`].
pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_FIELDS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(key))
}

fn ensure_not_reserved(key: &str) -> Result<()> {
    if is_reserved_key(key) {
        return Err(RegistryError::ReservedMetadataKey(key.to_string()));
    }
    Ok(())
}

/// The unit of storage: a named, identified, metadata-tagged object.
///
/// `id` and `created_at` never change once the entity is built. Every other
/// mutation goes through a setter that refreshes `updated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EntityRecord")]
pub struct Entity {
    id: String,
    name: String,
    active: bool,
    metadata: Metadata,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Raw wire shape, checked for reserved metadata keys before it becomes an [`Entity`].
#[derive(Deserialize)]
struct EntityRecord {
    id: String,
    name: String,
    active: bool,
    #[serde(default)]
    metadata: Metadata,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EntityRecord> for Entity {
    type Error = RegistryError;

    fn try_from(record: EntityRecord) -> Result<Self> {
        for key in record.metadata.keys() {
            ensure_not_reserved(key)?;
        }
        Ok(Self {
            id: record.id,
            name: record.name,
            active: record.active,
            metadata: record.metadata,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

impl Entity {
    /// Creates an active entity with no metadata.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            active: true,
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder-style [`Entity::set_metadata`].
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        self.set_metadata(key, value)?;
        Ok(self)
    }

    /// Builder-style [`Entity::set_active`].
    pub fn with_active(mut self, active: bool) -> Self {
        self.set_active(active);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
        self.touch();
    }

    /// Inserts or replaces a metadata entry.
    ///
    /// Rejects keys that case-insensitively match a core field name.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = key.into();
        ensure_not_reserved(&key)?;
        self.metadata.insert(key, value.into());
        self.touch();
        Ok(())
    }

    pub fn remove_metadata(&mut self, key: &str) -> Option<String> {
        let removed = self.metadata.remove(key);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    /// Turns this entity into the replacement for `previous` during an upsert:
    /// identity and creation time are inherited, `updated_at` is refreshed and
    /// never earlier than the replaced entity's.
    pub(crate) fn supersede(&mut self, previous: &Entity) {
        self.created_at = previous.created_at;
        self.updated_at = self.updated_at.max(previous.updated_at);
        self.touch();
    }

    fn touch(&mut self) {
        let now = Utc::now();
        // Keep updated_at monotonic even if the wall clock steps backwards.
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at
        };
    }
}
