//! Record producer with failure-record fallback.

use std::sync::Arc;
use std::time::Duration;

use avro_registry::{to_json, AvroCodec, Schema, Value};
use kafka_types::{key_subject, producer_failure_topic, topic_for, value_subject, Failure, Record};
use tokio::time::Instant;

use crate::broker::{KafkaProducerClient, ProducerClient};
use crate::config::ProducerConfig;
use crate::error::{Error, Result};
use crate::schema::{record_schema, schema_record_name};

/// How often the drain wait checks for outstanding deliveries.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Per-call produce settings.
#[derive(Debug, Clone)]
pub struct ProduceOptions {
    /// Message key. Falls back to [`Record::key`], then a random UUID.
    pub key: Option<String>,
    /// Destination topic. Falls back to the record's canonical topic.
    pub topic: Option<String>,
    /// Emit a failure record if this send fails.
    pub send_failure_records: bool,
}

impl Default for ProduceOptions {
    fn default() -> Self {
        Self {
            key: None,
            topic: None,
            send_failure_records: true,
        }
    }
}

impl ProduceOptions {
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn without_failure_records(mut self) -> Self {
        self.send_failure_records = false;
        self
    }
}

/// Encodes records through the schema registry and sends them, waiting for
/// delivery after each send.
pub struct Producer {
    client: Arc<dyn ProducerClient>,
    codec: AvroCodec,
    timeout: Duration,
    send_failure_records: bool,
}

impl Producer {
    pub fn new(client: Arc<dyn ProducerClient>, codec: AvroCodec, config: &ProducerConfig) -> Self {
        Self {
            client,
            codec,
            timeout: config.timeout,
            send_failure_records: config.send_failure_records,
        }
    }

    /// Create a producer backed by librdkafka.
    pub fn connect(config: &ProducerConfig, codec: AvroCodec) -> Result<Self> {
        let client = KafkaProducerClient::new(config)?;
        Ok(Self::new(Arc::new(client), codec, config))
    }

    pub fn codec(&self) -> &AvroCodec {
        &self.codec
    }

    /// Produce a typed record.
    ///
    /// If the send or its delivery fails for any reason other than the schema
    /// registry or the drain deadline, a [`Failure`] wrapping the record is sent to
    /// `fail-<topic>` and the original error is returned.
    pub async fn produce<R: Record>(&self, record: &R, options: ProduceOptions) -> Result<()> {
        let schema = record_schema::<R>()?;
        let name = R::name();
        let topic = match &options.topic {
            Some(topic) => topic.clone(),
            None => R::topic()?,
        };
        let key = options
            .key
            .clone()
            .or_else(|| record.key())
            .unwrap_or_else(new_key);

        let result = match avro_registry::to_value(record) {
            Ok(value) => self.send(&name, &schema, value, &topic, &key).await,
            Err(e) => Err(Error::Serialization(format!("cannot encode {name}: {e}"))),
        };

        match result {
            Err(e) if self.wraps_failure(&options, &e) => {
                match Failure::for_record(record, &topic, e.to_string()) {
                    Ok(failure) => self.emit_failure(failure, &topic).await,
                    Err(json_err) => tracing::error!(
                        topic = %topic,
                        error = %json_err,
                        "Cannot build failure record"
                    ),
                }
                Err(e)
            }
            other => other,
        }
    }

    /// Produce a value described only by its Avro record schema.
    pub async fn produce_value(
        &self,
        schema: &Schema,
        value: Value,
        options: ProduceOptions,
    ) -> Result<()> {
        let name = schema_record_name(schema)?;
        let topic = match &options.topic {
            Some(topic) => topic.clone(),
            None => topic_for(&name)?,
        };
        let key = options.key.clone().unwrap_or_else(new_key);
        let snapshot = (self.send_failure_records && options.send_failure_records).then(|| value.clone());

        match self.send(&name, schema, value, &topic, &key).await {
            Err(e) if self.wraps_failure(&options, &e) => {
                if let Some(snapshot) = snapshot {
                    match to_json(snapshot) {
                        Ok(json) => {
                            let failure = Failure::new(json.to_string(), &topic, e.to_string());
                            self.emit_failure(failure, &topic).await;
                        }
                        Err(json_err) => tracing::error!(
                            topic = %topic,
                            error = %json_err,
                            "Cannot build failure record"
                        ),
                    }
                }
                Err(e)
            }
            other => other,
        }
    }

    /// Produce a JSON document against an Avro record schema.
    pub async fn produce_json(
        &self,
        schema: &Schema,
        value: serde_json::Value,
        options: ProduceOptions,
    ) -> Result<()> {
        self.produce_value(schema, Value::from(value), options).await
    }

    /// Wait until every outstanding message is delivered.
    pub async fn flush(&self) -> Result<()> {
        self.drain().await
    }

    fn wraps_failure(&self, options: &ProduceOptions, error: &Error) -> bool {
        self.send_failure_records
            && options.send_failure_records
            && !error.is_schema_registry()
            && !matches!(error, Error::ProducerTimeout { .. })
    }

    /// Encode and send without any failure handling.
    async fn send(
        &self,
        name: &str,
        schema: &Schema,
        value: Value,
        topic: &str,
        key: &str,
    ) -> Result<()> {
        let payload = self
            .codec
            .encode_value(&value_subject(name)?, schema, value)
            .await?;
        let key_bytes = self.codec.encode_key(&key_subject(name)?, key).await?;

        let deadline = Instant::now() + self.timeout;
        let delivery = match self.client.send(topic, &key_bytes, &payload) {
            Ok(delivery) => delivery,
            Err(e) => {
                tracing::error!(topic = %topic, record = %name, error = %e, "Failed to send record");
                return Err(e);
            }
        };

        match tokio::time::timeout_at(deadline, delivery).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(topic = %topic, record = %name, error = %e, "Record was not delivered");
                return Err(e);
            }
            Err(_) => {
                return Err(Error::ProducerTimeout {
                    timeout: self.timeout,
                })
            }
        }
        tracing::debug!(topic = %topic, record = %name, key = %key, "Record sent");

        self.drain_until(deadline).await
    }

    async fn drain(&self) -> Result<()> {
        self.drain_until(Instant::now() + self.timeout).await
    }

    async fn drain_until(&self, deadline: Instant) -> Result<()> {
        while self.client.in_flight_count() > 0 {
            if Instant::now() >= deadline {
                return Err(Error::ProducerTimeout {
                    timeout: self.timeout,
                });
            }
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
        Ok(())
    }

    /// Send a failure record. Errors here are logged, never wrapped again.
    async fn emit_failure(&self, failure: Failure, original_topic: &str) {
        let topic = match producer_failure_topic(original_topic) {
            Ok(topic) => topic,
            Err(e) => {
                tracing::error!(error = %e, "Cannot name failure topic");
                return;
            }
        };

        let sent = async {
            let schema = record_schema::<Failure>()?;
            let value = avro_registry::to_value(&failure)
                .map_err(|e| Error::Serialization(e.to_string()))?;
            self.send(&Failure::name(), &schema, value, &topic, &new_key())
                .await
        }
        .await;

        match sent {
            Ok(()) => tracing::warn!(
                topic = %topic,
                original_topic = %original_topic,
                "Failure record emitted"
            ),
            Err(e) => tracing::error!(
                topic = %topic,
                error = %e,
                "Failed to emit failure record"
            ),
        }
    }
}

fn new_key() -> String {
    uuid::Uuid::new_v4().to_string()
}
