//! kafka-records
//!
//! Command line front end for the record-oriented Kafka client.
//!
//! # CLI Usage
//!
//! ```bash
//! # Produce one JSON document as an Avro record
//! kafka-records produce --schema-file user-created.avsc --data '{"id":"u-1"}'
//!
//! # Print records of one or more types as JSON until interrupted
//! kafka-records consume --schema-file user-created.avsc --group-id audit
//!
//! # Topic administration
//! kafka-records create-topic user-created --partitions 3
//! kafka-records list-topics
//! ```
//!
//! Every option falls back to an environment variable (`KAFKA_BROKERS`,
//! `SCHEMA_REGISTRY_URL`, `KAFKA_GROUP_ID`, ...).

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Context;
use avro_registry::RegistryConfig;
use clap::Parser;
use kafka_records_client::{
    ConnectionConfig, ConsumerConfig, OffsetReset, ProducerConfig, Security, DEFAULT_RETRIES,
};

pub mod config;

pub use config::parse_duration;

#[derive(Parser, Clone, Debug)]
pub struct KafkaOpts {
    /// Kafka brokers (comma-separated list)
    #[arg(long, default_value = "localhost:9092", env = "KAFKA_BROKERS")]
    pub brokers: String,

    /// CA certificate used to verify the brokers (enables TLS)
    #[arg(long, env = "KAFKA_SSL_CA_LOCATION")]
    pub ssl_ca_location: Option<String>,

    /// Client certificate for mutual TLS
    #[arg(long, env = "KAFKA_SSL_CERTIFICATE_LOCATION")]
    pub ssl_certificate_location: Option<String>,

    /// Private key of the client certificate
    #[arg(long, env = "KAFKA_SSL_KEY_LOCATION")]
    pub ssl_key_location: Option<String>,

    /// SASL username (enables SASL over TLS together with the password)
    #[arg(long, env = "KAFKA_SASL_USERNAME")]
    pub sasl_username: Option<String>,

    #[arg(long, env = "KAFKA_SASL_PASSWORD", hide_env_values = true)]
    pub sasl_password: Option<String>,

    #[arg(long, default_value = "PLAIN", env = "KAFKA_SASL_MECHANISM")]
    pub sasl_mechanism: String,

    /// Turn on librdkafka debug logging
    #[arg(long)]
    pub kafka_debug: bool,

    /// Extra librdkafka property (format: key=value), may be repeated
    #[arg(long = "kafka-property", value_name = "KEY=VALUE")]
    pub properties: Vec<String>,
}

impl KafkaOpts {
    pub fn connection(&self) -> anyhow::Result<ConnectionConfig> {
        let security = match (&self.sasl_username, &self.sasl_password) {
            (Some(username), Some(password)) => Security::SaslSsl {
                mechanism: self.sasl_mechanism.clone(),
                username: username.clone(),
                password: password.clone(),
                ca_location: self.ssl_ca_location.clone(),
            },
            (None, None) => {
                if self.ssl_ca_location.is_some()
                    || self.ssl_certificate_location.is_some()
                    || self.ssl_key_location.is_some()
                {
                    Security::Ssl {
                        ca_location: self.ssl_ca_location.clone(),
                        certificate_location: self.ssl_certificate_location.clone(),
                        key_location: self.ssl_key_location.clone(),
                    }
                } else {
                    Security::Plaintext
                }
            }
            _ => anyhow::bail!("SASL needs both --sasl-username and --sasl-password"),
        };

        let mut properties = BTreeMap::new();
        for property in &self.properties {
            let (key, value) = property
                .split_once('=')
                .with_context(|| format!("Invalid Kafka property '{property}', expected key=value"))?;
            properties.insert(key.trim().to_string(), value.trim().to_string());
        }

        Ok(ConnectionConfig {
            brokers: self.brokers.clone(),
            security,
            debug: self.kafka_debug,
            properties,
        })
    }
}

#[derive(Parser, Clone, Debug)]
pub struct RegistryOpts {
    /// Schema registry URL, basic-auth credentials may be embedded as user info
    #[arg(
        long,
        default_value = "http://localhost:8081",
        env = "SCHEMA_REGISTRY_URL"
    )]
    pub schema_registry_url: String,

    /// Skip TLS certificate verification of the schema registry
    #[arg(long)]
    pub schema_registry_insecure: bool,
}

impl From<&RegistryOpts> for RegistryConfig {
    fn from(opts: &RegistryOpts) -> Self {
        Self {
            url: opts.schema_registry_url.clone(),
            verify_ssl: !opts.schema_registry_insecure,
            ..Default::default()
        }
    }
}

#[derive(Parser, Clone, Debug)]
pub struct ConsumeOpts {
    /// Consumer group ID
    #[arg(long, env = "KAFKA_GROUP_ID")]
    pub group_id: String,

    /// Handler retries before a record goes to the failure topic (at most 3)
    #[arg(long, default_value_t = DEFAULT_RETRIES)]
    pub num_retries: u32,

    /// Stop after this long without messages (e.g. "30s", "5m")
    #[arg(long, value_parser = parse_duration)]
    pub idle_timeout: Option<Duration>,

    /// Bounded wait of a single poll
    #[arg(long, default_value = "1000ms", value_parser = parse_duration)]
    pub connect_timeout: Duration,

    /// Pause between polls
    #[arg(long, default_value = "10ms", value_parser = parse_duration)]
    pub poll_interval: Duration,

    /// Where to start without committed offsets (earliest or latest)
    #[arg(long, default_value = "earliest")]
    pub offset_reset: OffsetReset,

    /// Drop records whose handler kept failing instead of routing them
    #[arg(long)]
    pub no_failure_topic: bool,
}

impl ConsumeOpts {
    pub fn consumer_config(&self, connection: ConnectionConfig) -> ConsumerConfig {
        ConsumerConfig {
            connection,
            group_id: self.group_id.clone(),
            offset_reset: self.offset_reset,
            num_retries: self.num_retries,
            connect_timeout: self.connect_timeout,
            poll_interval: self.poll_interval,
            idle_timeout: self.idle_timeout,
            send_to_failure_topic: !self.no_failure_topic,
            ..Default::default()
        }
    }
}

#[derive(Parser, Clone, Debug)]
pub struct ProduceOpts {
    /// Delivery deadline of each send
    #[arg(long, default_value = "3000ms", value_parser = parse_duration)]
    pub producer_timeout: Duration,

    /// Send retries of the Kafka client
    #[arg(long, default_value_t = DEFAULT_RETRIES)]
    pub producer_retries: u32,

    /// Do not emit a failure record when sending fails
    #[arg(long)]
    pub no_failure_records: bool,
}

impl ProduceOpts {
    pub fn producer_config(&self, connection: ConnectionConfig) -> ProducerConfig {
        ProducerConfig {
            connection,
            timeout: self.producer_timeout,
            retries: self.producer_retries,
            send_failure_records: !self.no_failure_records,
        }
    }
}
