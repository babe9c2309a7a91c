//! Schema checks shared by subscriptions and the producer.

use avro_registry::{parse_schema, record_name, Schema};
use kafka_types::Record;

use crate::error::{Error, Result};

/// Parse `R::schema()` and check that it names the record `R::name()`.
///
/// Consumers route by the writer schema's record name, so a mismatch would
/// make the record undeliverable.
pub fn record_schema<R: Record>() -> Result<Schema> {
    let schema = parse_schema(R::schema())
        .map_err(|e| Error::Configuration(format!("schema of {}: {e}", R::name())))?;
    let name = schema_record_name(&schema)?;
    if name != R::name() {
        return Err(Error::Configuration(format!(
            "schema record name '{name}' does not match record name '{}'",
            R::name()
        )));
    }
    Ok(schema)
}

/// Record name of a schema, rejecting non-record schemas.
pub fn schema_record_name(schema: &Schema) -> Result<String> {
    record_name(schema)
        .map(str::to_string)
        .ok_or_else(|| Error::Configuration("schema must be an Avro record".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Shipment {
        id: String,
    }

    impl Record for Shipment {
        fn schema() -> &'static str {
            r#"{"type":"record","name":"Shipment","fields":[{"name":"id","type":"string"}]}"#
        }
    }

    #[derive(Serialize, Deserialize)]
    struct Mislabeled {
        id: String,
    }

    impl Record for Mislabeled {
        fn schema() -> &'static str {
            r#"{"type":"record","name":"Shipment","fields":[{"name":"id","type":"string"}]}"#
        }
    }

    #[test]
    fn test_record_schema_matches_name() {
        let schema = record_schema::<Shipment>().unwrap();
        assert_eq!(schema_record_name(&schema).unwrap(), "Shipment");
    }

    #[test]
    fn test_record_schema_name_mismatch() {
        let err = record_schema::<Mislabeled>().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_non_record_schema_rejected() {
        let schema = parse_schema(r#""string""#).unwrap();
        assert!(schema_record_name(&schema).is_err());
    }
}
