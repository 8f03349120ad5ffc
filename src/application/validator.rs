use crate::domain::entity::{Entity, Metadata};
use crate::error::ValidationError;

type FieldCheck = Box<dyn Fn(&str) -> Result<(), String> + Send + Sync>;

/// Admission rules an entity must pass before it is written anywhere.
///
/// Checks run in a fixed order (core fields, required keys, forbidden keys,
/// custom checks) and each group in the order it was added, so the first
/// failure reported for a given entity never changes.
#[derive(Default)]
pub struct Validator {
    required: Vec<String>,
    forbidden: Vec<String>,
    field_checks: Vec<(String, FieldCheck)>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_required_metadata<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn with_forbidden_metadata<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.forbidden.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Adds a check for the value of metadata `key`. Skipped when the key is absent.
    pub fn with_field_validator<F>(mut self, key: impl Into<String>, check: F) -> Self
    where
        F: Fn(&str) -> Result<(), String> + Send + Sync + 'static,
    {
        self.field_checks.push((key.into(), Box::new(check)));
        self
    }

    pub fn validate(&self, entity: &Entity) -> Result<(), ValidationError> {
        if entity.id().trim().is_empty() {
            return Err(ValidationError::MissingField("id".to_string()));
        }
        if entity.name().trim().is_empty() {
            return Err(ValidationError::MissingField("name".to_string()));
        }
        self.validate_metadata(entity.metadata())
    }

    pub fn validate_metadata(&self, metadata: &Metadata) -> Result<(), ValidationError> {
        if let Some(key) = self.required.iter().find(|k| !metadata.contains_key(*k)) {
            return Err(ValidationError::MissingMetadata(key.clone()));
        }
        if let Some(key) = self.forbidden.iter().find(|k| metadata.contains_key(*k)) {
            return Err(ValidationError::ForbiddenMetadata(key.clone()));
        }
        for (key, check) in &self.field_checks {
            if let Some(value) = metadata.get(key) {
                check(value).map_err(|reason| ValidationError::InvalidField {
                    field: key.clone(),
                    reason,
                })?;
            }
        }
        Ok(())
    }
}
