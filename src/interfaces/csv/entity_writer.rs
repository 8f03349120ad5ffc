use crate::domain::entity::Entity;
use crate::error::Result;
use chrono::SecondsFormat;
use std::io::Write;

/// Writes entities as CSV rows:
/// `id,name,active,created_at,updated_at,metadata`.
///
/// Metadata is flattened to `key=value` pairs sorted by key and joined with `;`.
pub struct EntityWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> EntityWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_entities<'a, I>(&mut self, entities: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Entity>,
    {
        self.writer
            .write_record(["id", "name", "active", "created_at", "updated_at", "metadata"])?;
        for entity in entities {
            let active = entity.is_active().to_string();
            let created = entity.created_at().to_rfc3339_opts(SecondsFormat::Secs, true);
            let updated = entity.updated_at().to_rfc3339_opts(SecondsFormat::Secs, true);
            let metadata = flatten_metadata(entity);
            self.writer.write_record([
                entity.id(),
                entity.name(),
                active.as_str(),
                created.as_str(),
                updated.as_str(),
                metadata.as_str(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

fn flatten_metadata(entity: &Entity) -> String {
    let mut pairs: Vec<(&String, &String)> = entity.metadata().iter().collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(";")
}
