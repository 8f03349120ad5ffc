//! Application layer containing the registry orchestration.
//!
//! This module defines the `RegistryProvider`, the single entry point other
//! subsystems use, together with the pluggable validation, notification,
//! metrics, and health components it composes.

pub mod events;
pub mod health;
pub mod metrics;
pub mod provider;
pub mod validator;
