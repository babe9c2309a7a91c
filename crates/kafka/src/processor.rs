//! The record processor: decode, dispatch, retry, route failures.
//!
//! Every inbound message ends in exactly one [`Outcome`]. Handler errors never
//! leave the processor. Registry and broker errors do, so the poll loop can
//! stop before committing an offset it has not fully dealt with.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use avro_registry::{AvroCodec, Value};
use futures::FutureExt;
use kafka_types::{consumer_failure_topic, InboundMessage};

use crate::config::ConsumerConfig;
use crate::error::{Error, Result};
use crate::producer::{ProduceOptions, Producer};
use crate::subscription::{Subscription, Subscriptions};

/// Terminal result of processing one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No subscription for the record name.
    Unhandled,
    /// The handler succeeded after `attempts` calls.
    Handled { attempts: u32 },
    /// The handler failed `attempts` times. `routed` is true when the record
    /// was published to the failure topic.
    Failed { attempts: u32, routed: bool },
}

/// A message after schema resolution.
#[derive(Debug, Clone)]
pub struct DecodedRecord {
    /// Writer record name, used as the dispatch key.
    pub name: String,
    pub value: Value,
    pub key: Option<String>,
}

pub struct RecordProcessor {
    subscriptions: Arc<Subscriptions>,
    codec: AvroCodec,
    failure_producer: Arc<Producer>,
    group_id: String,
    num_retries: u32,
    send_to_failure_topic: bool,
}

impl RecordProcessor {
    pub fn new(
        subscriptions: Arc<Subscriptions>,
        codec: AvroCodec,
        failure_producer: Arc<Producer>,
        config: &ConsumerConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            subscriptions,
            codec,
            failure_producer,
            group_id: config.group_id.clone(),
            num_retries: config.num_retries,
            send_to_failure_topic: config.send_to_failure_topic,
        })
    }

    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    /// Decode a raw broker message and dispatch it.
    pub async fn process(&self, message: &InboundMessage) -> Result<Outcome> {
        let payload = message
            .payload
            .as_deref()
            .ok_or_else(|| Error::Malformed("message has no payload".to_string()))?;

        let wire = self.codec.open(payload).await?;
        let Some(name) = wire.record_name() else {
            tracing::debug!(
                topic = %message.topic,
                schema_id = wire.schema_id,
                "Ignoring message whose schema is not a record"
            );
            return Ok(Outcome::Unhandled);
        };

        let Some(subscription) = self.subscriptions.get(name) else {
            tracing::debug!(topic = %message.topic, record = %name, "No subscription for record");
            return Ok(Outcome::Unhandled);
        };

        let value = wire.decode(Some(subscription.schema()))?;
        let key = match &message.key {
            Some(key) => self.codec.decode_key(key).await,
            None => None,
        };

        self.dispatch(DecodedRecord {
            name: name.to_string(),
            value,
            key,
        })
        .await
    }

    /// Run the handler for `record`, retrying up to the configured bound and
    /// routing the record to the failure topic when every attempt failed.
    ///
    /// A handler that panics counts as a failed attempt.
    pub async fn dispatch(&self, record: DecodedRecord) -> Result<Outcome> {
        let Some(subscription) = self.subscriptions.get(&record.name).cloned() else {
            return Ok(Outcome::Unhandled);
        };

        let mut attempts = 0;
        loop {
            attempts += 1;
            let value = record.value.clone();
            match guarded(async { subscription.handle(value).await }).await {
                Ok(()) => return Ok(Outcome::Handled { attempts }),
                Err(e) => {
                    tracing::error!(
                        record = %record.name,
                        attempt = attempts,
                        error = %e,
                        "Handler failed"
                    );
                    if attempts > self.num_retries {
                        break;
                    }
                    tracing::info!(record = %record.name, attempt = attempts + 1, "Retrying handler");
                }
            }
        }

        let routed = self.route_failure(&subscription, &record).await?;
        Ok(Outcome::Failed { attempts, routed })
    }

    async fn route_failure(&self, subscription: &Subscription, record: &DecodedRecord) -> Result<bool> {
        if subscription.has_failure_callback() {
            let value = record.value.clone();
            let called = guarded(async {
                match subscription.fail(value) {
                    Some(callback) => callback.await,
                    None => Ok(()),
                }
            });
            if let Err(e) = called.await {
                tracing::error!(
                    record = %record.name,
                    error = %e,
                    "Failure callback failed, record not routed"
                );
                return Ok(false);
            }
        }

        if !self.send_to_failure_topic {
            return Ok(false);
        }

        let topic = consumer_failure_topic(&record.name, &self.group_id)?;
        let mut options = ProduceOptions::default()
            .with_topic(&topic)
            .without_failure_records();
        options.key = record.key.clone();

        tracing::warn!(record = %record.name, topic = %topic, "Routing record to failure topic");
        match self
            .failure_producer
            .produce_value(subscription.schema(), record.value.clone(), options)
            .await
        {
            Ok(()) => Ok(true),
            Err(Error::Serialization(msg)) => {
                tracing::error!(
                    record = %record.name,
                    topic = %topic,
                    error = %msg,
                    "Cannot serialize record for failure topic"
                );
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

/// Run a callback, turning a panic into an error.
async fn guarded<F>(callback: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = anyhow::Result<()>>,
{
    match AssertUnwindSafe(callback).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(anyhow::anyhow!("handler panicked: {}", panic_message(&*panic))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
