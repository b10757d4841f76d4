//! Error types for the compositional-da library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum DaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid value '{value}' at row {row}, column {col}")]
    InvalidValue {
        value: String,
        row: usize,
        col: usize,
    },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Missing column '{0}' in metadata")]
    MissingColumn(String),

    #[error("Duplicate identifier '{0}'")]
    DuplicateId(String),

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("No shared samples: {0}")]
    EmptyIntersection(String),

    #[error("Requested groups {missing:?} not found in data; available groups: {available:?}")]
    UnknownGroup {
        missing: Vec<String>,
        available: Vec<String>,
    },

    #[error("{method} requires {required} groups, found {found}")]
    InsufficientGroups {
        method: String,
        required: String,
        found: usize,
    },

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unknown method '{0}'")]
    UnknownMethod(String),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, DaError>;
