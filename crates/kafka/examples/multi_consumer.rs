use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kafka_records_client::{
    wait_all, ConnectionConfig, ConsumerConfig, KafkaClient, ProduceOptions, ProducerConfig,
    Record, RegistryConfig,
};
use serde::{Deserialize, Serialize};

/// Example demonstrating several consumer groups reading the same records
///
/// This example shows how to:
/// 1. Describe a record type with an Avro schema
/// 2. Produce records through the schema registry
/// 3. Run two consumers in different consumer groups
/// 4. Route records whose handler keeps failing to the group's failure topic
/// 5. Wait for both poll loops to go idle
///
/// To run this example:
/// 1. Start Kafka and a schema registry with Docker
///   docker run -d --name kafka -p 9092:9092 apache/kafka:latest
///   docker run -d --name registry -p 8081:8081 \
///     -e SCHEMA_REGISTRY_KAFKASTORE_BOOTSTRAP_SERVERS=host.docker.internal:9092 \
///     -e SCHEMA_REGISTRY_HOST_NAME=registry confluentinc/cp-schema-registry:latest
/// 2. Run the example
///   cargo run --example multi_consumer

#[derive(Debug, Serialize, Deserialize)]
struct UserEvent {
    user_id: String,
    event_type: String,
    timestamp: i64,
}

impl Record for UserEvent {
    fn schema() -> &'static str {
        r#"{
            "type": "record",
            "name": "UserEvent",
            "fields": [
                {"name": "user_id", "type": "string"},
                {"name": "event_type", "type": "string"},
                {"name": "timestamp", "type": "long"}
            ]
        }"#
    }

    fn key(&self) -> Option<String> {
        Some(self.user_id.clone())
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    match run_main().await {
        Ok(_) => {}
        Err(e) => {
            eprintln!("Error: {e:?}");
            std::process::exit(1);
        }
    }
}

async fn run_main() -> anyhow::Result<()> {
    let connection = ConnectionConfig::new("localhost:9092");
    let client = KafkaClient::from_registry_config(&RegistryConfig::default())?;

    let producer = client.producer(&ProducerConfig {
        connection: connection.clone(),
        ..Default::default()
    })?;
    for i in 0..10 {
        let event = UserEvent {
            user_id: format!("user-{i}"),
            event_type: if i % 3 == 0 { "deleted" } else { "login" }.to_string(),
            timestamp: 1_700_000_000 + i,
        };
        producer.produce(&event, ProduceOptions::default()).await?;
    }
    println!("Produced 10 events to '{}'", UserEvent::topic()?);

    let audited = Arc::new(AtomicU64::new(0));
    let mut audit = client.consumer(ConsumerConfig {
        connection: connection.clone(),
        group_id: "audit".to_string(),
        idle_timeout: Some(Duration::from_secs(5)),
        ..Default::default()
    })?;
    {
        let counter = Arc::clone(&audited);
        audit.subscribe(move |event: UserEvent| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                println!("audit: {} {}", event.user_id, event.event_type);
                Ok(())
            }
        })?;
    }

    // Deleted users cannot be mailed; those records end up in
    // fail-mailer-user-event after the retries.
    let mut mailer = client.consumer(ConsumerConfig {
        connection,
        group_id: "mailer".to_string(),
        num_retries: 1,
        idle_timeout: Some(Duration::from_secs(5)),
        ..Default::default()
    })?;
    mailer.subscribe_with_failure(
        |event: UserEvent| async move {
            anyhow::ensure!(event.event_type != "deleted", "user {} is gone", event.user_id);
            Ok(())
        },
        |event: UserEvent| async move {
            println!("mailer gave up on {}", event.user_id);
            Ok(())
        },
    )?;

    audit.consume(&[])?;
    mailer.consume(&[])?;

    let mut consumers = vec![audit, mailer];
    let reasons = wait_all(&mut consumers).await?;
    println!(
        "Consumers stopped ({reasons:?}), audited {} events",
        audited.load(Ordering::SeqCst)
    );
    Ok(())
}
