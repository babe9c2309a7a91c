//! kafka-records CLI
//!
//! Produce and consume Avro records against a Kafka cluster and a
//! Confluent-compatible schema registry.
//!
//! ```bash
//! kafka-records produce --schema-file order-placed.avsc \
//!     --data '{"order_id":"o-1","amount":12.5}'
//!
//! kafka-records consume --schema-file order-placed.avsc \
//!     --schema-file order-cancelled.avsc --group-id billing --idle-timeout 30s
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use avro_registry::{parse_schema, RegistryConfig};
use clap::{Parser, Subcommand};
use kafka_records::{parse_duration, ConsumeOpts, KafkaOpts, ProduceOpts, RegistryOpts};
use kafka_records_client::{create_topic_if_not_exists, list_topics, KafkaClient, ProduceOptions};

#[derive(Parser)]
#[command(name = "kafka-records")]
#[command(about = "Produce and consume Avro records on Kafka with failure-topic routing")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Produce one record given as JSON
    Produce {
        /// Avro record schema of the record
        #[arg(long, value_name = "PATH")]
        schema_file: PathBuf,

        /// Record as a JSON document
        #[arg(long)]
        data: String,

        /// Target topic (default: kebab-case record name)
        #[arg(long)]
        topic: Option<String>,

        /// Message key (default: random UUID)
        #[arg(long)]
        key: Option<String>,

        #[command(flatten)]
        kafka: KafkaOpts,

        #[command(flatten)]
        registry: RegistryOpts,

        #[command(flatten)]
        produce: ProduceOpts,
    },

    /// Consume records and print them as JSON, one per line
    Consume {
        /// Avro record schema to handle, may be repeated
        #[arg(long = "schema-file", value_name = "PATH", required = true)]
        schema_files: Vec<PathBuf>,

        /// Topics to subscribe (default: one topic per record type)
        #[arg(long = "topic", value_name = "TOPIC")]
        topics: Vec<String>,

        #[command(flatten)]
        kafka: KafkaOpts,

        #[command(flatten)]
        registry: RegistryOpts,

        #[command(flatten)]
        consume: ConsumeOpts,
    },

    /// Create a topic unless it already exists
    CreateTopic {
        topic: String,

        #[arg(long, default_value_t = 1)]
        partitions: i32,

        #[arg(long, default_value_t = 1)]
        replication_factor: i32,

        #[command(flatten)]
        kafka: KafkaOpts,
    },

    /// List topics and their partition counts
    ListTopics {
        /// Metadata request timeout
        #[arg(long, default_value = "10s", value_parser = parse_duration)]
        timeout: Duration,

        #[command(flatten)]
        kafka: KafkaOpts,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Produce {
            schema_file,
            data,
            topic,
            key,
            kafka,
            registry,
            produce,
        } => {
            let schema_json = read_schema(&schema_file)?;
            let schema = parse_schema(&schema_json)
                .with_context(|| format!("Invalid Avro schema in {schema_file:?}"))?;
            let value: serde_json::Value =
                serde_json::from_str(&data).context("--data is not valid JSON")?;

            let client = KafkaClient::from_registry_config(&RegistryConfig::from(&registry))?;
            let producer = client.producer(&produce.producer_config(kafka.connection()?))?;

            let mut options = ProduceOptions::default();
            if let Some(key) = key {
                options = options.with_key(key);
            }
            if let Some(topic) = topic {
                options = options.with_topic(topic);
            }

            producer
                .produce_json(&schema, value, options)
                .await
                .context("Failed to produce record")?;
            tracing::info!("Record produced");
        }
        Commands::Consume {
            schema_files,
            topics,
            kafka,
            registry,
            consume,
        } => {
            let client = KafkaClient::from_registry_config(&RegistryConfig::from(&registry))?;
            let mut consumer = client.consumer(consume.consumer_config(kafka.connection()?))?;

            for path in &schema_files {
                let schema_json = read_schema(path)?;
                consumer
                    .subscribe_value(&schema_json, |value| async move {
                        println!("{value}");
                        Ok(())
                    })
                    .with_context(|| format!("Cannot subscribe to records of {path:?}"))?;
            }

            consumer.consume(&topics)?;

            let stop = consumer.stop_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Interrupted, stopping consumer");
                    stop.stop();
                }
            });

            let reason = consumer.wait().await?;
            tracing::info!(reason = ?reason, "Consumer stopped");
        }
        Commands::CreateTopic {
            topic,
            partitions,
            replication_factor,
            kafka,
        } => {
            let created =
                create_topic_if_not_exists(&kafka.connection()?, &topic, partitions, replication_factor)
                    .await?;
            if created {
                println!("Created topic {topic}");
            } else {
                println!("Topic {topic} already exists");
            }
        }
        Commands::ListTopics { timeout, kafka } => {
            for topic in list_topics(&kafka.connection()?, timeout).await? {
                println!("{}\t{}", topic.name, topic.partitions);
            }
        }
    }

    Ok(())
}

fn read_schema(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read schema file {path:?}"))
}
