//! Domain layer: the entity model, lifecycle events, and the capability
//! contracts every storage backend implements.

pub mod context;
pub mod entity;
pub mod event;
pub mod ports;
