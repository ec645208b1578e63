use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
}

impl StoreError {
    /// True when the backend failed to complete the operation.
    ///
    /// Validation and routing failures are raised before storage is touched
    /// and return `false`.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, StoreError::StorageError(_))
    }

    /// The validation failure, if this is one.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            StoreError::Validation(err) => Some(err),
            _ => None,
        }
    }
}

/// A supplied field violates a schema constraint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} required")]
    Required { field: String },

    #[error("invalid classification")]
    InvalidClassification { field: String, value: i64 },

    #[error("invalid {field}")]
    Invalid { field: String },

    #[error("unknown field {field}")]
    UnknownField { field: String },

    #[error("id is assigned by the store and cannot be written")]
    ImmutableId,
}

impl ValidationError {
    /// Name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::InvalidClassification { field, .. }
            | ValidationError::Invalid { field }
            | ValidationError::UnknownField { field } => field,
            ValidationError::ImmutableId => crate::ID_COLUMN,
        }
    }
}

#[cfg(feature = "rusqlite")]
impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::StorageError(e.to_string())
    }
}
