//! Error types for scale-factor evaluation.

use thiserror::Error;

/// Errors raised while loading correction tables or evaluating weights.
#[derive(Error, Debug)]
pub enum SfError {
    /// I/O error while opening a table source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Table document is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Table document parsed but describes an inconsistent object.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Requested object path does not exist in the table source.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// Object exists but is not a 2-D table.
    #[error("unsupported class: {0}")]
    UnsupportedClass(String),

    /// Provider could not be constructed from the given inputs.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Caller passed a value the evaluation cannot handle.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, SfError>;
