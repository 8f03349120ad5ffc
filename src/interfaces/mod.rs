//! Adapters between external formats and the entity model.

pub mod csv;
