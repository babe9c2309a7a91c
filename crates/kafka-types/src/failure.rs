//! The failure record written to producer-side failure topics.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::record::Record;

const FAILURE_SCHEMA: &str = r#"{
    "type": "record",
    "name": "Failure",
    "fields": [
        {"name": "payload", "type": "string"},
        {"name": "topic", "type": "string"},
        {"name": "details", "type": "string", "default": ""}
    ]
}"#;

/// A record that could not be delivered.
///
/// `payload` holds the original record serialized as JSON, `topic` the topic
/// it was meant for and `details` the error that prevented delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub payload: String,
    pub topic: String,
    #[serde(default)]
    pub details: String,
}

impl Failure {
    pub fn new(
        payload: impl Into<String>,
        topic: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            payload: payload.into(),
            topic: topic.into(),
            details: details.into(),
        }
    }

    /// Wrap a typed record, serializing it to JSON.
    pub fn for_record<R: Record>(
        record: &R,
        topic: impl Into<String>,
        details: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self::new(serde_json::to_string(record)?, topic, details))
    }
}

impl Record for Failure {
    fn schema() -> &'static str {
        FAILURE_SCHEMA
    }

    fn name() -> String {
        "Failure".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    struct Payment {
        id: String,
        amount: i64,
    }

    impl Record for Payment {
        fn schema() -> &'static str {
            r#"{"type":"record","name":"Payment","fields":[{"name":"id","type":"string"},{"name":"amount","type":"long"}]}"#
        }
    }

    #[test]
    fn test_failure_wraps_record_as_json() {
        let payment = Payment {
            id: "p-1".to_string(),
            amount: 1200,
        };
        let failure = Failure::for_record(&payment, "payment", "broker down").unwrap();

        assert_eq!(failure.topic, "payment");
        assert_eq!(failure.details, "broker down");
        let payload: serde_json::Value = serde_json::from_str(&failure.payload).unwrap();
        assert_eq!(payload["id"], "p-1");
        assert_eq!(payload["amount"], 1200);
    }

    #[test]
    fn test_failure_schema_is_named_failure() {
        assert_eq!(Failure::name(), "Failure");
        let schema: serde_json::Value = serde_json::from_str(Failure::schema()).unwrap();
        assert_eq!(schema["name"], "Failure");
        assert_eq!(schema["fields"].as_array().unwrap().len(), 3);
    }
}
