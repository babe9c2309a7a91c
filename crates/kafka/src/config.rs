//! Connection, consumer and producer configuration.
//!
//! Every struct renders to an [`rdkafka::ClientConfig`]; nothing here is
//! global, each client gets its own copy at construction.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rdkafka::ClientConfig;

use crate::error::{Error, Result};

/// Upper bound for [`ConsumerConfig::num_retries`].
pub const MAX_RETRIES: u32 = 3;

pub const DEFAULT_RETRIES: u32 = 3;

/// Transport security for broker connections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Security {
    #[default]
    Plaintext,
    /// TLS, optionally with a client certificate.
    Ssl {
        ca_location: Option<String>,
        certificate_location: Option<String>,
        key_location: Option<String>,
    },
    /// SASL authentication over TLS.
    SaslSsl {
        mechanism: String,
        username: String,
        password: String,
        ca_location: Option<String>,
    },
}

/// Settings shared by every client talking to the same cluster.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Kafka brokers (comma-separated list)
    pub brokers: String,
    pub security: Security,
    /// Turn on all librdkafka debug contexts
    pub debug: bool,
    /// Extra librdkafka properties, applied last
    pub properties: BTreeMap<String, String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            security: Security::Plaintext,
            debug: false,
            properties: BTreeMap::new(),
        }
    }
}

impl ConnectionConfig {
    pub fn new(brokers: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            ..Default::default()
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config.set("bootstrap.servers", &self.brokers);

        match &self.security {
            Security::Plaintext => {}
            Security::Ssl {
                ca_location,
                certificate_location,
                key_location,
            } => {
                config.set("security.protocol", "ssl");
                set_optional(&mut config, "ssl.ca.location", ca_location);
                set_optional(&mut config, "ssl.certificate.location", certificate_location);
                set_optional(&mut config, "ssl.key.location", key_location);
            }
            Security::SaslSsl {
                mechanism,
                username,
                password,
                ca_location,
            } => {
                config
                    .set("security.protocol", "sasl_ssl")
                    .set("sasl.mechanisms", mechanism)
                    .set("sasl.username", username)
                    .set("sasl.password", password);
                set_optional(&mut config, "ssl.ca.location", ca_location);
            }
        }

        if self.debug {
            config.set("debug", "all");
        }

        for (key, value) in &self.properties {
            config.set(key, value);
        }
        config
    }
}

fn set_optional(config: &mut ClientConfig, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        config.set(key, value);
    }
}

/// Where a consumer group without committed offsets starts reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OffsetReset {
    #[default]
    Earliest,
    Latest,
}

impl OffsetReset {
    pub fn as_str(&self) -> &'static str {
        match self {
            OffsetReset::Earliest => "earliest",
            OffsetReset::Latest => "latest",
        }
    }
}

impl fmt::Display for OffsetReset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OffsetReset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "earliest" => Ok(OffsetReset::Earliest),
            "latest" => Ok(OffsetReset::Latest),
            other => Err(Error::Configuration(format!(
                "offset reset must be 'earliest' or 'latest', got '{other}'"
            ))),
        }
    }
}

/// Configuration for a record consumer
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub connection: ConnectionConfig,
    /// Consumer group ID. Also part of consumer-side failure topic names.
    pub group_id: String,
    pub offset_reset: OffsetReset,
    /// Handler retries after the first failed attempt, at most [`MAX_RETRIES`].
    pub num_retries: u32,
    /// Bounded wait of a single broker poll.
    pub connect_timeout: Duration,
    /// Pause between poll loop iterations.
    pub poll_interval: Duration,
    /// Stop once no message was processed for this long. `None` runs until
    /// disconnected.
    pub idle_timeout: Option<Duration>,
    /// Publish records whose handler kept failing to the group's failure topic.
    pub send_to_failure_topic: bool,
    pub session_timeout: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            group_id: "kafka-records-consumer".to_string(),
            offset_reset: OffsetReset::Earliest,
            num_retries: DEFAULT_RETRIES,
            connect_timeout: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(10),
            idle_timeout: None,
            send_to_failure_topic: true,
            session_timeout: Duration::from_millis(6000),
        }
    }
}

impl ConsumerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_retries > MAX_RETRIES {
            return Err(Error::Configuration(format!(
                "num_retries must be at most {MAX_RETRIES}, got {}",
                self.num_retries
            )));
        }
        if self.group_id.trim().is_empty() {
            return Err(Error::Configuration(
                "group_id must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Offsets are committed by the poll loop only, after each message.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = self.connection.client_config();
        config
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false")
            .set("enable.partition.eof", "false")
            .set("auto.offset.reset", self.offset_reset.as_str())
            .set(
                "session.timeout.ms",
                self.session_timeout.as_millis().to_string(),
            );
        config
    }
}

/// Configuration for a record producer
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    pub connection: ConnectionConfig,
    /// Drain deadline after each send.
    pub timeout: Duration,
    /// librdkafka send retries.
    pub retries: u32,
    /// Emit a failure record to `fail-<topic>` when a send fails.
    pub send_failure_records: bool,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            timeout: Duration::from_millis(3000),
            retries: DEFAULT_RETRIES,
            send_failure_records: true,
        }
    }
}

impl ProducerConfig {
    /// Producer settings used to publish consumer-side failure records.
    pub fn for_failures(connection: &ConnectionConfig) -> Self {
        Self {
            connection: connection.clone(),
            send_failure_records: false,
            ..Default::default()
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        let mut config = self.connection.client_config();
        config
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("retries", self.retries.to_string())
            .set("message.timeout.ms", self.timeout.as_millis().to_string());
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consumer_defaults() {
        let config = ConsumerConfig::default();
        assert_eq!(config.num_retries, 3);
        assert_eq!(config.connect_timeout, Duration::from_millis(1000));
        assert_eq!(config.poll_interval, Duration::from_millis(10));
        assert!(config.idle_timeout.is_none());
        assert!(config.send_to_failure_topic);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retries_above_bound_rejected() {
        let config = ConsumerConfig {
            num_retries: 4,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_empty_group_rejected() {
        let config = ConsumerConfig {
            group_id: " ".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_consumer_client_config_disables_auto_commit() {
        let config = ConsumerConfig {
            group_id: "billing".to_string(),
            offset_reset: OffsetReset::Latest,
            ..Default::default()
        };
        let rendered = config.client_config();
        assert_eq!(rendered.get("group.id"), Some("billing"));
        assert_eq!(rendered.get("enable.auto.commit"), Some("false"));
        assert_eq!(rendered.get("enable.auto.offset.store"), Some("false"));
        assert_eq!(rendered.get("auto.offset.reset"), Some("latest"));
        assert_eq!(rendered.get("session.timeout.ms"), Some("6000"));
    }

    #[test]
    fn test_sasl_ssl_connection() {
        let mut connection = ConnectionConfig::new("broker-1:9093,broker-2:9093");
        connection.security = Security::SaslSsl {
            mechanism: "PLAIN".to_string(),
            username: "svc".to_string(),
            password: "pw".to_string(),
            ca_location: Some("/etc/ssl/ca.pem".to_string()),
        };
        connection.debug = true;
        connection
            .properties
            .insert("client.id".to_string(), "orders".to_string());

        let rendered = connection.client_config();
        assert_eq!(rendered.get("bootstrap.servers"), Some("broker-1:9093,broker-2:9093"));
        assert_eq!(rendered.get("security.protocol"), Some("sasl_ssl"));
        assert_eq!(rendered.get("sasl.mechanisms"), Some("PLAIN"));
        assert_eq!(rendered.get("ssl.ca.location"), Some("/etc/ssl/ca.pem"));
        assert_eq!(rendered.get("debug"), Some("all"));
        assert_eq!(rendered.get("client.id"), Some("orders"));
    }

    #[test]
    fn test_ssl_without_client_certificate() {
        let connection = ConnectionConfig {
            security: Security::Ssl {
                ca_location: Some("/ca.pem".to_string()),
                certificate_location: None,
                key_location: None,
            },
            ..Default::default()
        };
        let rendered = connection.client_config();
        assert_eq!(rendered.get("security.protocol"), Some("ssl"));
        assert_eq!(rendered.get("ssl.certificate.location"), None);
    }

    #[test]
    fn test_producer_client_config() {
        let rendered = ProducerConfig::default().client_config();
        assert_eq!(rendered.get("acks"), Some("all"));
        assert_eq!(rendered.get("enable.idempotence"), Some("true"));
        assert_eq!(rendered.get("retries"), Some("3"));
        assert!(!ProducerConfig::for_failures(&ConnectionConfig::default()).send_failure_records);
    }

    #[test]
    fn test_offset_reset_parse() {
        assert_eq!("Earliest".parse::<OffsetReset>().unwrap(), OffsetReset::Earliest);
        assert_eq!("latest".parse::<OffsetReset>().unwrap(), OffsetReset::Latest);
        assert!("newest".parse::<OffsetReset>().is_err());
    }
}
