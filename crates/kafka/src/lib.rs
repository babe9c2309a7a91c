//! Record-oriented Kafka client with Avro schema registry support.
//!
//! Features:
//!
//! - Typed records: produce and consume anything implementing [`Record`],
//!   encoded as registry-framed Avro
//! - Dispatch by record name: one handler per record type, several types may
//!   share a topic
//! - Bounded retries: a failing handler is retried up to three times, then the
//!   record goes to the consumer group's failure topic
//! - Failure records: a producer that cannot send a record emits a
//!   [`Failure`] to `fail-<topic>` instead of losing it
//! - At-least-once consumption: offsets are committed only after a message
//!   reached a terminal outcome
//!
//! ```rust,no_run
//! use kafka_records_client::{ConsumerConfig, KafkaClient, ProduceOptions, ProducerConfig};
//! use kafka_types::Record;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct UserCreated {
//!     id: String,
//! }
//!
//! impl Record for UserCreated {
//!     fn schema() -> &'static str {
//!         r#"{"type":"record","name":"UserCreated","fields":[{"name":"id","type":"string"}]}"#
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = KafkaClient::from_registry_config(&Default::default())?;
//!
//!     let producer = client.producer(&ProducerConfig::default())?;
//!     producer
//!         .produce(&UserCreated { id: "u-1".into() }, ProduceOptions::default())
//!         .await?;
//!
//!     let mut consumer = client.consumer(ConsumerConfig {
//!         group_id: "welcome-mails".into(),
//!         ..Default::default()
//!     })?;
//!     consumer.subscribe(|user: UserCreated| async move {
//!         println!("welcome {}", user.id);
//!         Ok(())
//!     })?;
//!     consumer.consume(&[])?;
//!     consumer.wait().await?;
//!     Ok(())
//! }
//! ```

pub mod admin;

/// Broker seams and their librdkafka implementations
pub mod broker;

/// High-level API creating producers and consumers over one registry
pub mod client;
pub mod config;

/// Poll loop owning one broker connection
pub mod consumer;
pub mod error;

/// Decoding, dispatch, retries and failure routing for one message
pub mod processor;
pub mod producer;
pub mod schema;
pub mod subscription;

/// Broker test doubles
pub mod testing;

// Re-export main types for easy access
pub use admin::{create_topic_if_not_exists, list_topics, TopicInfo};
pub use avro_registry::{AvroCodec, MemoryRegistry, RegistryConfig, SchemaRegistry};
pub use broker::{ConsumerClient, KafkaConsumerClient, KafkaProducerClient, ProducerClient};
pub use client::KafkaClient;
pub use config::{
    ConnectionConfig, ConsumerConfig, OffsetReset, ProducerConfig, Security, DEFAULT_RETRIES,
    MAX_RETRIES,
};
pub use consumer::{wait_all, Consumer, ConsumerState, ExitReason, StopHandle};
pub use error::{Error, Result};
pub use kafka_types::{Failure, InboundMessage, Record};
pub use processor::{DecodedRecord, Outcome, RecordProcessor};
pub use producer::{ProduceOptions, Producer};
pub use subscription::{Subscription, Subscriptions};
