//! The consumer poll loop.
//!
//! Lifecycle: `Created -> Subscribed -> Polling -> Stopped`. Handlers are
//! registered while `Created`. [`Consumer::consume`] subscribes the broker
//! connection and spawns the loop as its own tokio task; the loop exits when
//! [`Consumer::disconnect`] is called, when the idle timeout elapses, or when
//! an error propagates, and always unsubscribes on the way out.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use avro_registry::AvroCodec;
use kafka_types::{InboundMessage, Record};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::broker::{ConsumerClient, KafkaConsumerClient};
use crate::config::ConsumerConfig;
use crate::error::{Error, Result};
use crate::processor::RecordProcessor;
use crate::producer::Producer;
use crate::subscription::Subscriptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConsumerState {
    Created = 0,
    Subscribed = 1,
    Polling = 2,
    Stopped = 3,
}

impl ConsumerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConsumerState::Created,
            1 => ConsumerState::Subscribed,
            2 => ConsumerState::Polling,
            _ => ConsumerState::Stopped,
        }
    }
}

/// Why a poll loop ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Disconnected,
    IdleTimeout,
}

#[derive(Clone)]
struct StateCell(Arc<AtomicU8>);

impl StateCell {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(ConsumerState::Created as u8)))
    }

    fn get(&self) -> ConsumerState {
        ConsumerState::from_u8(self.0.load(Ordering::SeqCst))
    }

    fn set(&self, state: ConsumerState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

/// Timing of one poll loop.
#[derive(Debug, Clone, Copy)]
struct LoopSettings {
    connect_timeout: Duration,
    poll_interval: Duration,
    idle_timeout: Option<Duration>,
}

/// Disconnects a [`Consumer`] without borrowing it.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A record consumer owning one broker connection and one poll loop.
pub struct Consumer {
    client: Arc<dyn ConsumerClient>,
    codec: AvroCodec,
    failure_producer: Arc<Producer>,
    config: ConsumerConfig,
    subscriptions: Arc<Subscriptions>,
    connected: Arc<AtomicBool>,
    state: StateCell,
    handle: Option<JoinHandle<Result<ExitReason>>>,
}

impl Consumer {
    /// Create a consumer over an existing broker connection.
    ///
    /// `failure_producer` publishes records whose handlers kept failing.
    pub fn new(
        client: Arc<dyn ConsumerClient>,
        codec: AvroCodec,
        failure_producer: Producer,
        config: ConsumerConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client,
            codec,
            failure_producer: Arc::new(failure_producer),
            config,
            subscriptions: Arc::new(Subscriptions::new()),
            connected: Arc::new(AtomicBool::new(false)),
            state: StateCell::new(),
            handle: None,
        })
    }

    /// Create a consumer backed by librdkafka.
    pub fn connect(config: ConsumerConfig, codec: AvroCodec, failure_producer: Producer) -> Result<Self> {
        config.validate()?;
        let client = KafkaConsumerClient::new(&config)?;
        Self::new(Arc::new(client), codec, failure_producer, config)
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    pub fn state(&self) -> ConsumerState {
        self.state.get()
    }

    /// True from [`Consumer::consume`] until a disconnect is requested.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    pub fn subscribe<R, F, Fut>(&mut self, on_success: F) -> Result<()>
    where
        R: Record,
        F: Fn(R) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.subscriptions_mut()?.subscribe(on_success)
    }

    pub fn subscribe_with_failure<R, F, Fut, G, GFut>(
        &mut self,
        on_success: F,
        on_failure: G,
    ) -> Result<()>
    where
        R: Record,
        F: Fn(R) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
        G: Fn(R) -> GFut + Send + Sync + 'static,
        GFut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.subscriptions_mut()?.subscribe_with_failure(on_success, on_failure)
    }

    pub fn subscribe_value<F, Fut>(&mut self, schema_json: &str, on_success: F) -> Result<()>
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.subscriptions_mut()?.subscribe_value(schema_json, on_success)
    }

    pub fn subscribe_value_with_failure<F, Fut, G, GFut>(
        &mut self,
        schema_json: &str,
        on_success: F,
        on_failure: G,
    ) -> Result<()>
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
        G: Fn(serde_json::Value) -> GFut + Send + Sync + 'static,
        GFut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.subscriptions_mut()?
            .subscribe_value_with_failure(schema_json, on_success, on_failure)
    }

    fn subscriptions_mut(&mut self) -> Result<&mut Subscriptions> {
        self.ensure_created()?;
        Arc::get_mut(&mut self.subscriptions).ok_or_else(|| {
            Error::Configuration("subscriptions are shared with a poll loop".to_string())
        })
    }

    fn ensure_created(&self) -> Result<()> {
        match self.state() {
            ConsumerState::Created => Ok(()),
            state => Err(Error::Configuration(format!(
                "subscriptions are fixed once consuming starts (consumer is {state:?})"
            ))),
        }
    }

    /// Subscribe to `topics` (or every subscribed record's topic when empty)
    /// and start the poll loop in the background.
    ///
    /// A failed broker subscription is returned here, after unsubscribing.
    pub fn consume(&mut self, topics: &[String]) -> Result<()> {
        self.ensure_created()?;

        let topics = if topics.is_empty() {
            self.subscriptions.default_topics()?
        } else {
            topics.to_vec()
        };

        let processor = RecordProcessor::new(
            self.subscriptions.clone(),
            self.codec.clone(),
            self.failure_producer.clone(),
            &self.config,
        )?;

        if let Err(e) = self.client.subscribe(&topics) {
            tracing::error!(topics = ?topics, error = %e, "Failed to subscribe");
            self.client.unsubscribe();
            self.state.set(ConsumerState::Stopped);
            return Err(e);
        }
        self.state.set(ConsumerState::Subscribed);
        tracing::info!(topics = ?topics, group_id = %self.config.group_id, "Subscribed");

        let settings = LoopSettings {
            connect_timeout: self.config.connect_timeout,
            poll_interval: self.config.poll_interval,
            idle_timeout: self.config.idle_timeout,
        };

        self.connected.store(true, Ordering::SeqCst);
        self.handle = Some(tokio::spawn(poll_loop(
            self.client.clone(),
            processor,
            settings,
            self.connected.clone(),
            self.state.clone(),
        )));
        Ok(())
    }

    /// Ask the poll loop to stop after its current iteration.
    ///
    /// Has no lasting effect before [`Consumer::consume`], which connects.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// A handle that disconnects this consumer from another task.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.connected.clone())
    }

    /// Wait for the poll loop to finish.
    pub async fn wait(&mut self) -> Result<ExitReason> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| Error::Consumer("consumer is not running".to_string()))?;
        handle.await?
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Wait for every consumer, returning the first error once all have stopped.
pub async fn wait_all(consumers: &mut [Consumer]) -> Result<Vec<ExitReason>> {
    let mut results = Vec::with_capacity(consumers.len());
    for consumer in consumers.iter_mut() {
        results.push(consumer.wait().await);
    }
    results.into_iter().collect()
}

/// Unsubscribes when the poll loop ends, however it ends.
struct UnsubscribeGuard {
    client: Arc<dyn ConsumerClient>,
    state: StateCell,
}

impl Drop for UnsubscribeGuard {
    fn drop(&mut self) {
        self.client.unsubscribe();
        self.state.set(ConsumerState::Stopped);
        tracing::debug!("Unsubscribed");
    }
}

async fn poll_loop(
    client: Arc<dyn ConsumerClient>,
    processor: RecordProcessor,
    settings: LoopSettings,
    connected: Arc<AtomicBool>,
    state: StateCell,
) -> Result<ExitReason> {
    let _guard = UnsubscribeGuard {
        client: client.clone(),
        state: state.clone(),
    };
    state.set(ConsumerState::Polling);

    let mut last_seen = Instant::now();
    loop {
        if !connected.load(Ordering::SeqCst) {
            tracing::info!("Consumer disconnected, leaving poll loop");
            return Ok(ExitReason::Disconnected);
        }
        if let Some(idle_timeout) = settings.idle_timeout {
            if last_seen.elapsed() >= idle_timeout {
                tracing::info!(idle_timeout = ?idle_timeout, "Idle timeout reached, leaving poll loop");
                return Ok(ExitReason::IdleTimeout);
            }
        }

        match client.poll(settings.connect_timeout).await {
            Ok(None) => {}
            Err(e) if e.is_timeout() => {}
            Err(e) => tracing::error!(error = %e, "Broker reported an error"),
            Ok(Some(message)) => {
                if handle_message(client.as_ref(), &processor, &message).await? {
                    last_seen = Instant::now();
                }
            }
        }

        tokio::time::sleep(settings.poll_interval).await;
    }
}

/// Process and commit one message. Returns false when it was skipped.
async fn handle_message(
    client: &dyn ConsumerClient,
    processor: &RecordProcessor,
    message: &InboundMessage,
) -> Result<bool> {
    tracing::debug!(
        topic = %message.topic,
        partition = message.partition,
        offset = message.offset,
        "Processing message"
    );

    match processor.process(message).await {
        Ok(outcome) => tracing::debug!(offset = message.offset, outcome = ?outcome, "Message processed"),
        Err(e) if e.is_malformed() => {
            tracing::warn!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                error = %e,
                "Skipping malformed message"
            );
            return Ok(false);
        }
        Err(e) => return Err(e),
    }

    commit_with_retry(client, message).await?;
    Ok(true)
}

async fn commit_with_retry(client: &dyn ConsumerClient, message: &InboundMessage) -> Result<()> {
    match client.commit(message).await {
        Err(e) if e.is_timeout() => {
            tracing::warn!(
                topic = %message.topic,
                offset = message.offset,
                error = %e,
                "Commit timed out, retrying once"
            );
            client.commit(message).await
        }
        other => other,
    }
}
