//! Error types for kafka-types crate.

use thiserror::Error;

/// Errors that can occur while naming topics or building records.
#[derive(Error, Debug)]
pub enum KafkaTypesError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for kafka-types operations.
pub type Result<T> = std::result::Result<T, KafkaTypesError>;
