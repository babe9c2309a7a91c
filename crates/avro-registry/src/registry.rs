//! The schema registry seam.

use std::sync::Arc;

use apache_avro::Schema;
use async_trait::async_trait;

use crate::error::{Error, Result};

/// Register-or-lookup and fetch-by-id access to a schema registry.
#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    /// Register `schema` under `subject`, returning its id.
    ///
    /// Registering a schema that already exists returns the existing id.
    async fn register(&self, subject: &str, schema: &Schema) -> Result<i32>;

    /// Fetch the schema with the given id.
    async fn schema_by_id(&self, id: i32) -> Result<Arc<Schema>>;
}

#[async_trait]
impl<R: SchemaRegistry + ?Sized> SchemaRegistry for Arc<R> {
    async fn register(&self, subject: &str, schema: &Schema) -> Result<i32> {
        (**self).register(subject, schema).await
    }

    async fn schema_by_id(&self, id: i32) -> Result<Arc<Schema>> {
        (**self).schema_by_id(id).await
    }
}

/// Parse an Avro schema from JSON.
pub fn parse_schema(json: &str) -> Result<Schema> {
    Schema::parse_str(json).map_err(|e| Error::InvalidSchema(e.to_string()))
}

/// Unqualified name of a record schema, `None` for any other schema type.
pub fn record_name(schema: &Schema) -> Option<&str> {
    match schema {
        Schema::Record(record) => Some(record.name.name.as_str()),
        _ => None,
    }
}

/// Full JSON form of a schema, as sent to and stored by the registry.
pub(crate) fn schema_json(schema: &Schema) -> Result<String> {
    serde_json::to_string(schema).map_err(|e| Error::InvalidSchema(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_name_ignores_namespace() {
        let schema = parse_schema(
            r#"{"type":"record","name":"Order","namespace":"com.shop","fields":[{"name":"id","type":"string"}]}"#,
        )
        .unwrap();
        assert_eq!(record_name(&schema), Some("Order"));
    }

    #[test]
    fn test_record_name_of_primitive_is_none() {
        let schema = parse_schema(r#""string""#).unwrap();
        assert_eq!(record_name(&schema), None);
    }

    #[test]
    fn test_parse_schema_rejects_garbage() {
        let err = parse_schema("{not json").unwrap_err();
        assert!(matches!(err, Error::InvalidSchema(_)));
        assert!(err.is_registry_error());
    }
}
