//! Error types for schema registry access and the Avro wire codec.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Schema registry request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Schema registry returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Schema id {0} not found in registry")]
    SchemaNotFound(i32),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Invalid schema registry URL: {0}")]
    InvalidUrl(String),

    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Avro encoding failed: {0}")]
    Encode(String),

    #[error("Avro decoding failed: {0}")]
    Decode(String),
}

impl Error {
    /// Errors that mean the registry could not resolve or register a schema.
    ///
    /// These indicate misconfiguration or lost connectivity rather than one
    /// bad message.
    pub fn is_registry_error(&self) -> bool {
        matches!(
            self,
            Error::Request(_)
                | Error::Status { .. }
                | Error::SchemaNotFound(_)
                | Error::InvalidSchema(_)
                | Error::InvalidUrl(_)
        )
    }

    /// Errors caused by the bytes of a single message.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Error::Malformed(_) | Error::Decode(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
