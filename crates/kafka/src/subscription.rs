//! The record registry: which handler runs for which record name.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;

use avro_registry::{parse_schema, to_json, Schema, Value};
use futures::future::{self, BoxFuture, FutureExt};
use kafka_types::{topic_for, Record};

use crate::error::{Error, Result};
use crate::schema::{record_schema, schema_record_name};

pub type HandlerFuture = BoxFuture<'static, anyhow::Result<()>>;

/// Type-erased callback receiving a decoded Avro value.
pub type Handler = Arc<dyn Fn(Value) -> HandlerFuture + Send + Sync>;

/// Handlers and names bound to one record type.
pub struct Subscription {
    name: String,
    topic: String,
    schema: Schema,
    on_success: Handler,
    on_failure: Option<Handler>,
}

impl Subscription {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Reader schema incoming values are resolved to.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn has_failure_callback(&self) -> bool {
        self.on_failure.is_some()
    }

    pub(crate) fn handle(&self, value: Value) -> HandlerFuture {
        (self.on_success)(value)
    }

    pub(crate) fn fail(&self, value: Value) -> Option<HandlerFuture> {
        self.on_failure.as_ref().map(|callback| callback(value))
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("name", &self.name)
            .field("topic", &self.topic)
            .field("has_failure_callback", &self.has_failure_callback())
            .finish()
    }
}

/// Subscriptions keyed by record name. At most one per name.
#[derive(Debug, Default)]
pub struct Subscriptions {
    entries: HashMap<String, Arc<Subscription>>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle records of type `R`.
    pub fn subscribe<R, F, Fut>(&mut self, on_success: F) -> Result<()>
    where
        R: Record,
        F: Fn(R) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let schema = record_schema::<R>()?;
        self.insert(R::name(), R::topic()?, schema, typed_handler(on_success), None)
    }

    /// Handle records of type `R`, calling `on_failure` once retries run out.
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
        let schema = record_schema::<R>()?;
        self.insert(
            R::name(),
            R::topic()?,
            schema,
            typed_handler(on_success),
            Some(typed_failure_handler(on_failure)),
        )
    }

    /// Handle records described only by an Avro schema, as JSON.
    pub fn subscribe_value<F, Fut>(&mut self, schema_json: &str, on_success: F) -> Result<()>
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let (name, schema) = value_schema(schema_json)?;
        let topic = topic_for(&name)?;
        self.insert(name, topic, schema, json_handler(on_success), None)
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
        let (name, schema) = value_schema(schema_json)?;
        let topic = topic_for(&name)?;
        self.insert(
            name,
            topic,
            schema,
            json_handler(on_success),
            Some(json_handler(on_failure)),
        )
    }

    fn insert(
        &mut self,
        name: String,
        topic: String,
        schema: Schema,
        on_success: Handler,
        on_failure: Option<Handler>,
    ) -> Result<()> {
        if self.entries.contains_key(&name) {
            return Err(Error::Configuration(format!(
                "record '{name}' is already subscribed"
            )));
        }

        tracing::debug!(record = %name, topic = %topic, "Subscription registered");
        self.entries.insert(
            name.clone(),
            Arc::new(Subscription {
                name,
                topic,
                schema,
                on_success,
                on_failure,
            }),
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Subscription>> {
        self.entries.get(name)
    }

    pub fn handlers(&self) -> &HashMap<String, Arc<Subscription>> {
        &self.entries
    }

    /// Topics of all subscriptions, sorted and de-duplicated.
    pub fn default_topics(&self) -> Result<Vec<String>> {
        if self.entries.is_empty() {
            return Err(Error::Configuration(
                "no subscriptions registered, cannot infer topics to consume".to_string(),
            ));
        }
        let topics: BTreeSet<&str> = self.entries.values().map(|s| s.topic.as_str()).collect();
        Ok(topics.into_iter().map(str::to_string).collect())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn value_schema(schema_json: &str) -> Result<(String, Schema)> {
    let schema =
        parse_schema(schema_json).map_err(|e| Error::Configuration(format!("invalid schema: {e}")))?;
    let name = schema_record_name(&schema)?;
    Ok((name, schema))
}

/// Deserialize into `R` on every attempt. A value that does not fit `R` is a
/// handler failure.
fn typed_handler<R, F, Fut>(handler: F) -> Handler
where
    R: Record,
    F: Fn(R) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |value: Value| match decode_record::<R>(&value) {
        Ok(record) => handler(record).boxed(),
        Err(e) => future::err(e).boxed(),
    })
}

/// Failure callbacks are skipped for values that do not fit `R`, so routing
/// to the failure topic still happens.
fn typed_failure_handler<R, G, GFut>(handler: G) -> Handler
where
    R: Record,
    G: Fn(R) -> GFut + Send + Sync + 'static,
    GFut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |value: Value| match decode_record::<R>(&value) {
        Ok(record) => handler(record).boxed(),
        Err(e) => {
            tracing::warn!(record = %R::name(), error = %e, "Skipping failure callback");
            future::ok(()).boxed()
        }
    })
}

fn json_handler<F, Fut>(handler: F) -> Handler
where
    F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |value: Value| match to_json(value) {
        Ok(json) => handler(json).boxed(),
        Err(e) => future::err(anyhow::Error::new(e)).boxed(),
    })
}

fn decode_record<R: Record>(value: &Value) -> anyhow::Result<R> {
    avro_registry::from_value::<R>(value)
        .map_err(|e| anyhow::anyhow!("cannot deserialize {}: {e}", R::name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Serialize, Deserialize)]
    struct InvoicePaid {
        id: String,
        cents: i64,
    }

    impl Record for InvoicePaid {
        fn schema() -> &'static str {
            r#"{"type":"record","name":"InvoicePaid","fields":[{"name":"id","type":"string"},{"name":"cents","type":"long"}]}"#
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct InvoiceVoided {
        id: String,
    }

    impl Record for InvoiceVoided {
        fn schema() -> &'static str {
            r#"{"type":"record","name":"InvoiceVoided","fields":[{"name":"id","type":"string"}]}"#
        }

        fn topic() -> kafka_types::Result<String> {
            Ok("invoice-paid".to_string())
        }
    }

    fn invoice_value(id: &str) -> Value {
        Value::Record(vec![
            ("id".to_string(), Value::String(id.to_string())),
            ("cents".to_string(), Value::Long(250)),
        ])
    }

    #[test]
    fn test_duplicate_subscription_rejected() {
        let mut subscriptions = Subscriptions::new();
        subscriptions
            .subscribe(|_: InvoicePaid| async { Ok(()) })
            .unwrap();

        let err = subscriptions
            .subscribe(|_: InvoicePaid| async { Ok(()) })
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(subscriptions.len(), 1);
    }

    #[test]
    fn test_default_topics_sorted_and_deduplicated() {
        let mut subscriptions = Subscriptions::new();
        subscriptions
            .subscribe(|_: InvoiceVoided| async { Ok(()) })
            .unwrap();
        subscriptions
            .subscribe(|_: InvoicePaid| async { Ok(()) })
            .unwrap();
        subscriptions
            .subscribe_value(
                r#"{"type":"record","name":"AuditEntry","fields":[{"name":"line","type":"string"}]}"#,
                |_| async { Ok(()) },
            )
            .unwrap();

        assert_eq!(
            subscriptions.default_topics().unwrap(),
            vec!["audit-entry".to_string(), "invoice-paid".to_string()]
        );
    }

    #[test]
    fn test_default_topics_without_subscriptions() {
        let subscriptions = Subscriptions::new();
        assert!(matches!(
            subscriptions.default_topics(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_value_subscription_requires_record_schema() {
        let mut subscriptions = Subscriptions::new();
        let err = subscriptions
            .subscribe_value(r#""string""#, |_| async { Ok(()) })
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[tokio::test]
    async fn test_typed_handler_receives_record() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();

        let mut subscriptions = Subscriptions::new();
        subscriptions
            .subscribe(move |invoice: InvoicePaid| {
                let counter = counter.clone();
                async move {
                    assert_eq!(invoice.id, "inv-1");
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .unwrap();

        let subscription = subscriptions.get("InvoicePaid").unwrap();
        subscription.handle(invoice_value("inv-1")).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_undecodable_value_fails_handler_but_not_failure_callback() {
        let mut subscriptions = Subscriptions::new();
        subscriptions
            .subscribe_with_failure(
                |_: InvoicePaid| async { Ok(()) },
                |_: InvoicePaid| async { anyhow::bail!("must not be called") },
            )
            .unwrap();

        let subscription = subscriptions.get("InvoicePaid").unwrap();
        let wrong = Value::Record(vec![("id".to_string(), Value::Int(1))]);

        assert!(subscription.handle(wrong.clone()).await.is_err());
        assert!(subscription.fail(wrong).unwrap().await.is_ok());
    }

    #[tokio::test]
    async fn test_value_handler_receives_json() {
        let mut subscriptions = Subscriptions::new();
        subscriptions
            .subscribe_value(InvoicePaid::schema(), |json| async move {
                anyhow::ensure!(json["cents"] == 250, "unexpected payload {json}");
                Ok(())
            })
            .unwrap();

        let subscription = subscriptions.get("InvoicePaid").unwrap();
        assert_eq!(subscription.topic(), "invoice-paid");
        assert!(!subscription.has_failure_callback());
        subscription.handle(invoice_value("inv-2")).await.unwrap();
    }
}
