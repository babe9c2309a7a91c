//! Broker seams and their librdkafka implementations.
//!
//! The consumer poll loop and the producer only talk to the broker through
//! [`ConsumerClient`] and [`ProducerClient`], so tests can swap in the
//! doubles from [`crate::testing`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use kafka_types::InboundMessage;
use rdkafka::consumer::{CommitMode, Consumer as RdkafkaConsumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::{BorrowedMessage, Message as RdkafkaMessage};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer as RdkafkaProducer};
use rdkafka::{Offset, TopicPartitionList};

use crate::config::{ConsumerConfig, ProducerConfig};
use crate::error::{Error, Result};

/// Consumer side of a broker connection.
#[async_trait]
pub trait ConsumerClient: Send + Sync {
    fn subscribe(&self, topics: &[String]) -> Result<()>;

    fn unsubscribe(&self);

    /// Wait up to `timeout` for the next message.
    ///
    /// `Ok(None)` means nothing arrived in time.
    async fn poll(&self, timeout: Duration) -> Result<Option<InboundMessage>>;

    /// Commit the offset following `message`.
    async fn commit(&self, message: &InboundMessage) -> Result<()>;
}

/// Resolves with the broker's delivery report for one message.
pub type DeliveryFuture = BoxFuture<'static, Result<()>>;

/// Producer side of a broker connection.
pub trait ProducerClient: Send + Sync {
    /// Enqueue a message for asynchronous delivery.
    ///
    /// `Err` means the message was not enqueued. A message that was enqueued
    /// but later rejected fails the returned future.
    fn send(&self, topic: &str, key: &[u8], payload: &[u8]) -> Result<DeliveryFuture>;

    /// Messages enqueued but not yet acknowledged by the broker.
    fn in_flight_count(&self) -> usize;
}

/// librdkafka-backed [`ConsumerClient`]
pub struct KafkaConsumerClient {
    consumer: StreamConsumer,
}

impl KafkaConsumerClient {
    pub fn new(config: &ConsumerConfig) -> Result<Self> {
        let consumer: StreamConsumer = config
            .client_config()
            .create()
            .map_err(|e| Error::Consumer(format!("Failed to create consumer: {e}")))?;
        Ok(Self { consumer })
    }

    /// Get the underlying consumer (for advanced use cases)
    pub fn inner(&self) -> &StreamConsumer {
        &self.consumer
    }
}

#[async_trait]
impl ConsumerClient for KafkaConsumerClient {
    fn subscribe(&self, topics: &[String]) -> Result<()> {
        let topics: Vec<&str> = topics.iter().map(String::as_str).collect();
        self.consumer.subscribe(&topics)?;
        Ok(())
    }

    fn unsubscribe(&self) {
        self.consumer.unsubscribe();
    }

    async fn poll(&self, timeout: Duration) -> Result<Option<InboundMessage>> {
        match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Ok(Ok(message)) => Ok(Some(to_inbound(&message))),
            Ok(Err(e)) => Err(Error::Kafka(e)),
            Err(_) => Ok(None),
        }
    }

    async fn commit(&self, message: &InboundMessage) -> Result<()> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            &message.topic,
            message.partition,
            Offset::Offset(message.offset + 1),
        )?;
        self.consumer.commit(&tpl, CommitMode::Sync)?;
        Ok(())
    }
}

fn to_inbound(message: &BorrowedMessage<'_>) -> InboundMessage {
    InboundMessage {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        key: message.key().map(|k| k.to_vec()),
        payload: message.payload().map(|p| p.to_vec()),
        timestamp: message.timestamp().to_millis(),
    }
}

/// librdkafka-backed [`ProducerClient`]
pub struct KafkaProducerClient {
    producer: Arc<FutureProducer>,
}

impl KafkaProducerClient {
    pub fn new(config: &ProducerConfig) -> Result<Self> {
        let producer: FutureProducer = config.client_config().create()?;
        Ok(Self {
            producer: Arc::new(producer),
        })
    }

    pub fn inner(&self) -> &FutureProducer {
        &self.producer
    }
}

impl ProducerClient for KafkaProducerClient {
    fn send(&self, topic: &str, key: &[u8], payload: &[u8]) -> Result<DeliveryFuture> {
        let record = FutureRecord::to(topic).key(key).payload(payload);
        let delivery = self
            .producer
            .send_result(record)
            .map_err(|(err, _)| Error::Kafka(err))?;

        let topic = topic.to_string();
        Ok(async move {
            match delivery.await {
                Ok(Ok(_)) => Ok(()),
                Ok(Err((err, _))) => {
                    tracing::error!(topic = %topic, error = %err, "Message delivery failed");
                    Err(Error::Kafka(err))
                }
                Err(_) => {
                    tracing::error!(topic = %topic, "Message delivery was cancelled");
                    Err(Error::Kafka(KafkaError::Canceled))
                }
            }
        }
        .boxed())
    }

    fn in_flight_count(&self) -> usize {
        usize::try_from(self.producer.in_flight_count()).unwrap_or(0)
    }
}
