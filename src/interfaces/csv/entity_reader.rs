use crate::domain::entity::Entity;
use crate::error::{RegistryError, Result, ValidationError};
use std::collections::HashMap;
use std::io::Read;

/// Reads entities from a CSV source.
///
/// The header must name `id` and `name`; `active` is optional and defaults to
/// true. Every other non-empty column becomes a metadata entry, so a column
/// named after a reserved field is rejected per row.
pub struct EntityReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> EntityReader<R> {
    /// Creates a new `EntityReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and converts rows.
    pub fn entities(self) -> impl Iterator<Item = Result<Entity>> {
        self.reader
            .into_deserialize::<HashMap<String, String>>()
            .map(|row| row.map_err(RegistryError::from).and_then(into_entity))
    }
}

fn parse_active(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "" | "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(ValidationError::InvalidField {
            field: "active".to_string(),
            reason: format!("`{other}` is not a boolean"),
        }
        .into()),
    }
}

fn into_entity(mut row: HashMap<String, String>) -> Result<Entity> {
    let id = row
        .remove("id")
        .ok_or_else(|| ValidationError::MissingField("id".to_string()))?;
    let name = row
        .remove("name")
        .ok_or_else(|| ValidationError::MissingField("name".to_string()))?;
    let active = match row.remove("active") {
        Some(raw) => parse_active(&raw)?,
        None => true,
    };

    let mut entity = Entity::new(id, name).with_active(active);
    let mut columns: Vec<(String, String)> = row.into_iter().filter(|(_, v)| !v.is_empty()).collect();
    columns.sort();
    for (key, value) in columns {
        entity.set_metadata(key, value)?;
    }
    Ok(entity)
}
