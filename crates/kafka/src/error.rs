use kafka_types::KafkaTypesError;
use rdkafka::error::KafkaError;
use rdkafka::types::RDKafkaErrorCode;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Schema registry error: {0}")]
    SchemaRegistry(avro_registry::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Producer did not drain outstanding messages within {timeout:?}")]
    ProducerTimeout { timeout: Duration },

    #[error("Consumer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Consumer error: {0}")]
    Consumer(String),

    #[error("Admin error: {0}")]
    Admin(String),
}

impl Error {
    /// Broker timeouts: a poll or commit that ran out of time rather than failed.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Kafka(e) => matches!(
                e.rdkafka_error_code(),
                Some(RDKafkaErrorCode::OperationTimedOut | RDKafkaErrorCode::RequestTimedOut)
            ),
            _ => false,
        }
    }

    /// Schema could not be registered or resolved.
    pub fn is_schema_registry(&self) -> bool {
        matches!(self, Error::SchemaRegistry(_))
    }

    /// A single message could not be unframed or decoded.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Error::Malformed(_))
    }
}

impl From<avro_registry::Error> for Error {
    fn from(e: avro_registry::Error) -> Self {
        if e.is_registry_error() {
            Error::SchemaRegistry(e)
        } else if e.is_malformed() {
            Error::Malformed(e.to_string())
        } else {
            Error::Serialization(e.to_string())
        }
    }
}

impl From<KafkaTypesError> for Error {
    fn from(e: KafkaTypesError) -> Self {
        match e {
            KafkaTypesError::InvalidArgument(msg) => Error::InvalidArgument(msg),
            KafkaTypesError::Json(e) => Error::Serialization(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_codes() {
        let op = Error::Kafka(KafkaError::ConsumerCommit(RDKafkaErrorCode::OperationTimedOut));
        let req = Error::Kafka(KafkaError::MessageConsumption(RDKafkaErrorCode::RequestTimedOut));
        let other = Error::Kafka(KafkaError::ConsumerCommit(RDKafkaErrorCode::BrokerNotAvailable));

        assert!(op.is_timeout());
        assert!(req.is_timeout());
        assert!(!other.is_timeout());
        assert!(!Error::Consumer("timed out".to_string()).is_timeout());
    }

    #[test]
    fn test_codec_errors_are_classified() {
        let registry: Error = avro_registry::Error::SchemaNotFound(3).into();
        let malformed: Error = avro_registry::Error::Malformed("short".to_string()).into();
        let encode: Error = avro_registry::Error::Encode("bad value".to_string()).into();

        assert!(registry.is_schema_registry());
        assert!(malformed.is_malformed());
        assert!(matches!(encode, Error::Serialization(_)));
    }
}
