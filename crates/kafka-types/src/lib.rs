//! Shared types for kafka-records.
//!
//! This crate provides the pieces both the producer and the consumer side
//! agree on without talking to each other:
//!
//! - [`naming`] - deterministic topic and schema subject names
//! - [`record`] - the [`Record`] trait implemented by domain message types
//! - [`failure`] - the [`Failure`] record written to producer failure topics
//! - [`message`] - raw broker messages handed to the record processor
//!
//! # Examples
//!
//! ```
//! use kafka_types::naming::{consumer_failure_topic, producer_failure_topic, topic_for};
//!
//! assert_eq!(topic_for("UserCreatedEvent").unwrap(), "user-created-event");
//! assert_eq!(
//!     producer_failure_topic("user-created-event").unwrap(),
//!     "fail-user-created-event"
//! );
//! assert_eq!(
//!     consumer_failure_topic("UserCreatedEvent", "grp1").unwrap(),
//!     "fail-grp1-user-created-event"
//! );
//! ```

pub mod error;
pub mod failure;
pub mod message;
pub mod naming;
pub mod record;

// Re-export main types for convenient access
pub use error::{KafkaTypesError, Result};
pub use failure::Failure;
pub use message::InboundMessage;
pub use naming::{
    consumer_failure_topic, kebab_case, key_subject, producer_failure_topic, topic_for,
    value_subject,
};
pub use record::{short_type_name, Record};
