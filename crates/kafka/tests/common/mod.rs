//! Shared fixtures for the client integration tests.
//!
//! Everything runs against `MemoryRegistry` and the broker doubles from
//! `kafka_records_client::testing`, no live Kafka needed.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use avro_registry::{to_json, AvroCodec, MemoryRegistry};
use kafka_records_client::schema::record_schema;
use kafka_records_client::testing::MockProducerClient;
use kafka_records_client::{ConnectionConfig, ConsumerConfig, ProducerConfig, Producer};
use kafka_types::{key_subject, value_subject, InboundMessage, Record};
use serde::{Deserialize, Serialize};

pub const GROUP: &str = "billing";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub id: String,
    pub quantity: i32,
}

impl Record for OrderPlaced {
    fn schema() -> &'static str {
        r#"{
            "type": "record",
            "name": "OrderPlaced",
            "fields": [
                {"name": "id", "type": "string"},
                {"name": "quantity", "type": "int"}
            ]
        }"#
    }

    fn key(&self) -> Option<String> {
        Some(self.id.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub id: String,
}

impl Record for OrderCancelled {
    fn schema() -> &'static str {
        r#"{"type":"record","name":"OrderCancelled","fields":[{"name":"id","type":"string"}]}"#
    }
}

pub fn order(id: &str) -> OrderPlaced {
    OrderPlaced {
        id: id.to_string(),
        quantity: 2,
    }
}

pub fn codec() -> AvroCodec {
    AvroCodec::new(Arc::new(MemoryRegistry::new()))
}

pub fn failure_producer(codec: &AvroCodec, client: Arc<MockProducerClient>) -> Producer {
    Producer::new(
        client,
        codec.clone(),
        &ProducerConfig::for_failures(&ConnectionConfig::default()),
    )
}

pub fn consumer_config() -> ConsumerConfig {
    ConsumerConfig {
        group_id: GROUP.to_string(),
        connect_timeout: Duration::from_millis(100),
        poll_interval: Duration::from_millis(10),
        ..Default::default()
    }
}

/// Encode `record` the way a producer would and wrap it as a broker message.
pub async fn message_for<R: Record>(codec: &AvroCodec, record: &R, offset: i64) -> InboundMessage {
    let name = R::name();
    let schema = record_schema::<R>().unwrap();
    let payload = codec
        .encode(&value_subject(&name).unwrap(), &schema, record)
        .await
        .unwrap();
    let mut message = InboundMessage::new(R::topic().unwrap(), 0, offset, payload);
    if let Some(key) = record.key() {
        let key = codec
            .encode_key(&key_subject(&name).unwrap(), &key)
            .await
            .unwrap();
        message = message.with_key(key);
    }
    message
}

/// Decode a framed payload to JSON using its writer schema.
pub async fn decode_json(codec: &AvroCodec, payload: &[u8]) -> serde_json::Value {
    let value = codec.open(payload).await.unwrap().decode(None).unwrap();
    to_json(value).unwrap()
}
