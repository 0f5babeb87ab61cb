//! Error types for the screening pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, ScreeningError>;

/// Main error type for the screening pipeline
#[derive(Error, Debug)]
pub enum ScreeningError {
    /// Fewer than two distinct diagnosis classes in the training data
    #[error("Insufficient classes: need at least 2 distinct labels, found {found}")]
    InsufficientClasses { found: usize },

    /// Uploaded table is missing columns the model expects
    #[error("Schema mismatch: missing columns [{}]", missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    #[error("Unknown label: '{0}' was not seen during training")]
    UnknownLabel(String),

    #[error("Unknown class id: {id} (codec knows {n_classes} classes)")]
    UnknownId { id: usize, n_classes: usize },

    /// One or more bundle components are missing on disk
    #[error("Model not ready: missing artifacts [{}]. Retrain the model first", missing.join(", "))]
    ArtifactsNotReady { missing: Vec<String> },

    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    #[error("Invalid record at row {row}: {reason}")]
    InvalidRecord { row: usize, reason: String },

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },
}

impl ScreeningError {
    /// Short machine-readable kind, used in API responses
    pub fn kind(&self) -> &'static str {
        match self {
            ScreeningError::InsufficientClasses { .. } => "insufficient_classes",
            ScreeningError::SchemaMismatch { .. } => "schema_mismatch",
            ScreeningError::UnknownLabel(_) => "unknown_label",
            ScreeningError::UnknownId { .. } => "unknown_id",
            ScreeningError::ArtifactsNotReady { .. } => "artifacts_not_ready",
            ScreeningError::MalformedUpload(_) => "malformed_upload",
            ScreeningError::InvalidRecord { .. } => "invalid_record",
            ScreeningError::TrainingError(_) => "training_error",
            ScreeningError::InvalidInput(_) => "invalid_input",
            ScreeningError::ModelNotFitted => "model_not_fitted",
            ScreeningError::IoError(_) => "io_error",
            ScreeningError::SerializationError(_) => "serialization_error",
            ScreeningError::ShapeError { .. } => "shape_error",
        }
    }
}

impl From<polars::error::PolarsError> for ScreeningError {
    fn from(err: polars::error::PolarsError) -> Self {
        ScreeningError::MalformedUpload(err.to_string())
    }
}

impl From<calamine::Error> for ScreeningError {
    fn from(err: calamine::Error) -> Self {
        ScreeningError::MalformedUpload(err.to_string())
    }
}

impl From<serde_json::Error> for ScreeningError {
    fn from(err: serde_json::Error) -> Self {
        ScreeningError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ScreeningError {
    fn from(err: ndarray::ShapeError) -> Self {
        ScreeningError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
