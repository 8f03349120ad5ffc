//! Storage backends implementing the domain ports.

pub mod file;
pub mod in_memory;
#[cfg(feature = "cache-redis")]
pub mod redis;
pub mod remote;
