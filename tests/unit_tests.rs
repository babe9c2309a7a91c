use std::time::Duration;

use avro_registry::RegistryConfig;
use clap::Parser;
use kafka_records::{parse_duration, ConsumeOpts, KafkaOpts, ProduceOpts, RegistryOpts};
use kafka_records_client::{OffsetReset, Security};

fn kafka_opts(args: &[&str]) -> KafkaOpts {
    let mut argv = vec!["test", "--brokers", "broker-1:9092,broker-2:9092"];
    argv.extend_from_slice(args);
    KafkaOpts::try_parse_from(argv).unwrap()
}

// ============================================================================
// Duration parsing
// ============================================================================

#[test]
fn test_parse_duration_units() {
    assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
    assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
    assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
    assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
}

#[test]
fn test_parse_duration_bare_number_is_millis() {
    assert_eq!(parse_duration("250").unwrap(), Duration::from_millis(250));
    assert_eq!(parse_duration(" 10 ").unwrap(), Duration::from_millis(10));
}

#[test]
fn test_parse_duration_rejects_garbage() {
    assert!(parse_duration("").is_err());
    assert!(parse_duration("fast").is_err());
    assert!(parse_duration("-5s").is_err());
    assert!(parse_duration("1.5m").is_err());
}

// ============================================================================
// Kafka options
// ============================================================================

#[test]
fn test_plaintext_connection() {
    let connection = kafka_opts(&[]).connection().unwrap();

    assert_eq!(connection.brokers, "broker-1:9092,broker-2:9092");
    assert_eq!(connection.security, Security::Plaintext);
    assert!(!connection.debug);
    assert!(connection.properties.is_empty());
}

#[test]
fn test_ssl_connection() {
    let connection = kafka_opts(&[
        "--ssl-ca-location",
        "/etc/kafka/ca.pem",
        "--ssl-certificate-location",
        "/etc/kafka/client.pem",
    ])
    .connection()
    .unwrap();

    assert_eq!(
        connection.security,
        Security::Ssl {
            ca_location: Some("/etc/kafka/ca.pem".to_string()),
            certificate_location: Some("/etc/kafka/client.pem".to_string()),
            key_location: None,
        }
    );
}

#[test]
fn test_sasl_connection() {
    let connection = kafka_opts(&[
        "--sasl-username",
        "svc",
        "--sasl-password",
        "secret",
        "--sasl-mechanism",
        "SCRAM-SHA-512",
    ])
    .connection()
    .unwrap();

    assert_eq!(
        connection.security,
        Security::SaslSsl {
            mechanism: "SCRAM-SHA-512".to_string(),
            username: "svc".to_string(),
            password: "secret".to_string(),
            ca_location: None,
        }
    );
}

#[test]
fn test_sasl_without_password_rejected() {
    let err = kafka_opts(&["--sasl-username", "svc"]).connection().unwrap_err();
    assert!(err.to_string().contains("--sasl-password"));
}

#[test]
fn test_extra_properties_and_debug() {
    let connection = kafka_opts(&[
        "--kafka-debug",
        "--kafka-property",
        "client.id=cli",
        "--kafka-property",
        "linger.ms = 5",
    ])
    .connection()
    .unwrap();

    assert!(connection.debug);
    assert_eq!(connection.properties.get("client.id").unwrap(), "cli");
    assert_eq!(connection.properties.get("linger.ms").unwrap(), "5");

    let rendered = connection.client_config();
    assert_eq!(rendered.get("debug"), Some("all"));
    assert_eq!(rendered.get("client.id"), Some("cli"));
}

#[test]
fn test_malformed_property_rejected() {
    assert!(kafka_opts(&["--kafka-property", "client.id"])
        .connection()
        .is_err());
}

// ============================================================================
// Registry, consumer and producer options
// ============================================================================

#[test]
fn test_registry_opts_conversion() {
    let opts = RegistryOpts::try_parse_from([
        "test",
        "--schema-registry-url",
        "https://user:pw@registry:8081",
        "--schema-registry-insecure",
    ])
    .unwrap();

    let config = RegistryConfig::from(&opts);
    assert_eq!(config.url, "https://user:pw@registry:8081");
    assert!(!config.verify_ssl);
}

#[test]
fn test_consume_opts_defaults() {
    let opts = ConsumeOpts::try_parse_from(["test", "--group-id", "billing"]).unwrap();
    let config = opts.consumer_config(kafka_opts(&[]).connection().unwrap());

    assert_eq!(config.group_id, "billing");
    assert_eq!(config.num_retries, 3);
    assert_eq!(config.connect_timeout, Duration::from_millis(1000));
    assert_eq!(config.poll_interval, Duration::from_millis(10));
    assert_eq!(config.idle_timeout, None);
    assert_eq!(config.offset_reset, OffsetReset::Earliest);
    assert!(config.send_to_failure_topic);
    config.validate().unwrap();
}

#[test]
fn test_consume_opts_overrides() {
    let opts = ConsumeOpts::try_parse_from([
        "test",
        "--group-id",
        "billing",
        "--num-retries",
        "1",
        "--idle-timeout",
        "30s",
        "--poll-interval",
        "50",
        "--offset-reset",
        "latest",
        "--no-failure-topic",
    ])
    .unwrap();
    let config = opts.consumer_config(kafka_opts(&[]).connection().unwrap());

    assert_eq!(config.num_retries, 1);
    assert_eq!(config.idle_timeout, Some(Duration::from_secs(30)));
    assert_eq!(config.poll_interval, Duration::from_millis(50));
    assert_eq!(config.offset_reset, OffsetReset::Latest);
    assert!(!config.send_to_failure_topic);
}

#[test]
fn test_consume_opts_too_many_retries_fail_validation() {
    let opts =
        ConsumeOpts::try_parse_from(["test", "--group-id", "billing", "--num-retries", "4"])
            .unwrap();
    let config = opts.consumer_config(kafka_opts(&[]).connection().unwrap());
    assert!(config.validate().is_err());
}

#[test]
fn test_invalid_offset_reset_rejected_by_parser() {
    assert!(
        ConsumeOpts::try_parse_from(["test", "--group-id", "g", "--offset-reset", "middle"])
            .is_err()
    );
}

#[test]
fn test_produce_opts_conversion() {
    let opts = ProduceOpts::try_parse_from([
        "test",
        "--producer-timeout",
        "5s",
        "--no-failure-records",
    ])
    .unwrap();
    let config = opts.producer_config(kafka_opts(&[]).connection().unwrap());

    assert_eq!(config.timeout, Duration::from_secs(5));
    assert_eq!(config.retries, 3);
    assert!(!config.send_failure_records);
}
