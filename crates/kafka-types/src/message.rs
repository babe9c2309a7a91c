//! Kafka message types.
//!
//! Raw messages as handed over by the broker client, before any schema
//! registry decoding. These types are shared between the consumer poll loop,
//! the record processor and the test doubles that script broker behavior.

/// A raw Kafka message with metadata.
///
/// The payload is still wire-encoded (schema-id framed Avro). Decoding
/// happens in the record processor once the writer schema is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Kafka topic name
    pub topic: String,
    /// Kafka partition number
    pub partition: i32,
    /// Kafka offset within the partition
    pub offset: i64,
    /// Message key (if any)
    pub key: Option<Vec<u8>>,
    /// Wire-encoded payload (if any)
    pub payload: Option<Vec<u8>>,
    /// Message timestamp in milliseconds since epoch (if available)
    pub timestamp: Option<i64>,
}

impl InboundMessage {
    /// Build a message carrying only a payload, mostly useful in tests.
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            key: None,
            payload: Some(payload),
            timestamp: None,
        }
    }

    /// Attach a key to the message.
    pub fn with_key(mut self, key: Vec<u8>) -> Self {
        self.key = Some(key);
        self
    }
}
