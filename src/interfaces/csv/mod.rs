pub mod entity_reader;
pub mod entity_writer;
