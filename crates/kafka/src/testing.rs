//! In-memory broker doubles.
//!
//! [`MockConsumerClient`] replays scripted poll results and records
//! subscriptions and commits. [`MockProducerClient`] records every delivered
//! message and can be told to reject sends, fail deliveries or stall them.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{self, FutureExt};
use kafka_types::InboundMessage;
use rdkafka::error::KafkaError;
use rdkafka::types::RDKafkaErrorCode;

use crate::broker::{ConsumerClient, DeliveryFuture, ProducerClient};
use crate::error::{Error, Result};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One scripted poll result.
#[derive(Debug, Clone)]
pub enum PollEvent {
    Message(InboundMessage),
    /// Broker-reported error with the given code.
    Error(RDKafkaErrorCode),
}

#[derive(Default)]
struct ConsumerState {
    events: VecDeque<PollEvent>,
    subscriptions: Vec<Vec<String>>,
    commit_failures: VecDeque<RDKafkaErrorCode>,
    committed: Vec<(String, i32, i64)>,
    subscribe_failure: Option<RDKafkaErrorCode>,
}

#[derive(Default)]
pub struct MockConsumerClient {
    state: Mutex<ConsumerState>,
    unsubscribes: AtomicUsize,
    polls: AtomicUsize,
    commit_attempts: AtomicUsize,
}

impl MockConsumerClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_message(&self, message: InboundMessage) {
        lock(&self.state).events.push_back(PollEvent::Message(message));
    }

    pub fn push_error(&self, code: RDKafkaErrorCode) {
        lock(&self.state).events.push_back(PollEvent::Error(code));
    }

    /// Fail the next commit with `code`. Queued failures are used in order.
    pub fn fail_next_commit(&self, code: RDKafkaErrorCode) {
        lock(&self.state).commit_failures.push_back(code);
    }

    pub fn fail_subscribe(&self, code: RDKafkaErrorCode) {
        lock(&self.state).subscribe_failure = Some(code);
    }

    pub fn subscriptions(&self) -> Vec<Vec<String>> {
        lock(&self.state).subscriptions.clone()
    }

    /// Successfully committed `(topic, partition, offset)` triples.
    pub fn committed(&self) -> Vec<(String, i32, i64)> {
        lock(&self.state).committed.clone()
    }

    pub fn pending_events(&self) -> usize {
        lock(&self.state).events.len()
    }

    pub fn unsubscribe_count(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn commit_attempts(&self) -> usize {
        self.commit_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConsumerClient for MockConsumerClient {
    fn subscribe(&self, topics: &[String]) -> Result<()> {
        let mut state = lock(&self.state);
        if let Some(code) = state.subscribe_failure {
            return Err(Error::Kafka(KafkaError::Subscription(format!(
                "{topics:?}: {code}"
            ))));
        }
        state.subscriptions.push(topics.to_vec());
        Ok(())
    }

    fn unsubscribe(&self) {
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
    }

    /// Returns the next scripted event, or waits out `timeout` when none is left.
    async fn poll(&self, timeout: Duration) -> Result<Option<InboundMessage>> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let event = lock(&self.state).events.pop_front();
        match event {
            Some(PollEvent::Message(message)) => Ok(Some(message)),
            Some(PollEvent::Error(code)) => Err(Error::Kafka(KafkaError::MessageConsumption(code))),
            None => {
                tokio::time::sleep(timeout).await;
                Ok(None)
            }
        }
    }

    async fn commit(&self, message: &InboundMessage) -> Result<()> {
        self.commit_attempts.fetch_add(1, Ordering::SeqCst);
        let mut state = lock(&self.state);
        if let Some(code) = state.commit_failures.pop_front() {
            return Err(Error::Kafka(KafkaError::ConsumerCommit(code)));
        }
        state
            .committed
            .push((message.topic.clone(), message.partition, message.offset));
        Ok(())
    }
}

/// A message delivered by [`MockProducerClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRecord {
    pub topic: String,
    pub key: Vec<u8>,
    pub payload: Vec<u8>,
}

#[derive(Default)]
pub struct MockProducerClient {
    sent: Mutex<Vec<SentRecord>>,
    failing_topics: Mutex<HashSet<String>>,
    undeliverable_topics: Mutex<HashSet<String>>,
    fail_all: AtomicBool,
    send_attempts: AtomicUsize,
    in_flight: AtomicUsize,
}

impl MockProducerClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every send to `topic`.
    pub fn fail_topic(&self, topic: impl Into<String>) {
        lock(&self.failing_topics).insert(topic.into());
    }

    /// Reject every send.
    pub fn fail_all(&self) {
        self.fail_all.store(true, Ordering::SeqCst);
    }

    /// Accept sends to `topic` but fail their delivery, as the broker does for
    /// oversized or unauthorized messages.
    pub fn fail_delivery_to(&self, topic: impl Into<String>) {
        lock(&self.undeliverable_topics).insert(topic.into());
    }

    /// Report `count` undelivered messages until changed.
    pub fn set_in_flight(&self, count: usize) {
        self.in_flight.store(count, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentRecord> {
        lock(&self.sent).clone()
    }

    pub fn sent_to(&self, topic: &str) -> Vec<SentRecord> {
        lock(&self.sent)
            .iter()
            .filter(|record| record.topic == topic)
            .cloned()
            .collect()
    }

    /// Sends attempted, accepted or not.
    pub fn send_attempts(&self) -> usize {
        self.send_attempts.load(Ordering::SeqCst)
    }
}

impl ProducerClient for MockProducerClient {
    fn send(&self, topic: &str, key: &[u8], payload: &[u8]) -> Result<DeliveryFuture> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_all.load(Ordering::SeqCst) || lock(&self.failing_topics).contains(topic) {
            return Err(Error::Kafka(KafkaError::MessageProduction(
                RDKafkaErrorCode::BrokerNotAvailable,
            )));
        }
        if lock(&self.undeliverable_topics).contains(topic) {
            let rejected = Error::Kafka(KafkaError::MessageProduction(
                RDKafkaErrorCode::MessageSizeTooLarge,
            ));
            return Ok(future::err(rejected).boxed());
        }
        lock(&self.sent).push(SentRecord {
            topic: topic.to_string(),
            key: key.to_vec(),
            payload: payload.to_vec(),
        });
        Ok(future::ok(()).boxed())
    }

    fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}
