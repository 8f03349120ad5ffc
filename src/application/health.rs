use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{PoisonError, RwLock};

/// Structured health report for external monitoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// A single last-error slot. Advisory only: nothing in the registry consults it
/// before serving a request.
#[derive(Debug, Default)]
pub struct Health {
    last_error: RwLock<Option<String>>,
}

impl Health {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_healthy(&self) -> bool {
        self.last_error
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    pub fn set_error(&self, error: impl Into<String>) {
        *self.last_error.write().unwrap_or_else(PoisonError::into_inner) = Some(error.into());
    }

    pub fn clear_error(&self) {
        *self.last_error.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn status(&self) -> HealthStatus {
        let last_error = self
            .last_error
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        HealthStatus {
            healthy: last_error.is_none(),
            timestamp: Utc::now(),
            last_error,
        }
    }
}
