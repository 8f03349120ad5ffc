use thiserror::Error;

/// Field-scoped admission failures raised by the validator and the entity model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(String),
    #[error("missing required metadata key `{0}`")]
    MissingMetadata(String),
    #[error("forbidden metadata key `{0}` is present")]
    ForbiddenMetadata(String),
    #[error("invalid value for `{field}`: {reason}")]
    InvalidField { field: String, reason: String },
}

impl ValidationError {
    /// The name of the field or metadata key that failed.
    pub fn field(&self) -> &str {
        match self {
            Self::MissingField(field)
            | Self::MissingMetadata(field)
            | Self::ForbiddenMetadata(field)
            | Self::InvalidField { field, .. } => field,
        }
    }
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("metadata key `{0}` collides with a reserved entity field")]
    ReservedMetadataKey(String),
    #[error("entity not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("operation deadline exceeded")]
    DeadlineExceeded,
    #[error("{0} observer(s) panicked while handling an event")]
    ObserverPanicked(usize),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl RegistryError {
    /// Whether the error came from a storage tier rather than from the caller's input.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            Self::Serialization(_) | Self::IoError(_) | Self::Backend(_) | Self::InternalError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
