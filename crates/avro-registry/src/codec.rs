//! Registry-aware Avro codec.

use std::sync::Arc;

use apache_avro::types::Value;
use apache_avro::Schema;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::registry::{record_name, SchemaRegistry};
use crate::wire;

/// Encodes values into framed Avro payloads and opens framed payloads.
#[derive(Clone)]
pub struct AvroCodec {
    registry: Arc<dyn SchemaRegistry>,
}

impl AvroCodec {
    pub fn new(registry: Arc<dyn SchemaRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<dyn SchemaRegistry> {
        &self.registry
    }

    /// Register `schema` under `subject`, resolve `value` against it and
    /// frame the Avro body with the schema id.
    pub async fn encode_value(&self, subject: &str, schema: &Schema, value: Value) -> Result<Vec<u8>> {
        let schema_id = self.registry.register(subject, schema).await?;
        let resolved = value
            .resolve(schema)
            .map_err(|e| Error::Encode(format!("value does not match schema for {subject}: {e}")))?;
        let body =
            apache_avro::to_avro_datum(schema, resolved).map_err(|e| Error::Encode(e.to_string()))?;
        Ok(wire::frame(schema_id, &body))
    }

    /// Encode any serde-serializable value.
    pub async fn encode<T: Serialize + ?Sized>(
        &self,
        subject: &str,
        schema: &Schema,
        value: &T,
    ) -> Result<Vec<u8>> {
        let value = apache_avro::to_value(value).map_err(|e| Error::Encode(e.to_string()))?;
        self.encode_value(subject, schema, value).await
    }

    /// Encode a JSON document against `schema`.
    pub async fn encode_json(
        &self,
        subject: &str,
        schema: &Schema,
        value: serde_json::Value,
    ) -> Result<Vec<u8>> {
        self.encode_value(subject, schema, Value::from(value)).await
    }

    /// Encode a message key as an Avro string.
    pub async fn encode_key(&self, subject: &str, key: &str) -> Result<Vec<u8>> {
        self.encode_value(subject, &Schema::String, Value::String(key.to_string()))
            .await
    }

    /// Unframe a payload and fetch its writer schema.
    pub async fn open<'a>(&self, payload: &'a [u8]) -> Result<WirePayload<'a>> {
        let (schema_id, body) = wire::unframe(payload)?;
        let writer = self.registry.schema_by_id(schema_id).await?;
        Ok(WirePayload {
            schema_id,
            writer,
            body,
        })
    }

    /// Decode a message key.
    ///
    /// Framed Avro strings are decoded, anything else is read as UTF-8.
    pub async fn decode_key(&self, bytes: &[u8]) -> Option<String> {
        if let Ok(payload) = self.open(bytes).await {
            if let Ok(Value::String(key)) = payload.decode(None) {
                return Some(key);
            }
        }
        std::str::from_utf8(bytes).ok().map(str::to_string)
    }
}

/// A framed payload whose writer schema has been resolved.
#[derive(Debug, Clone)]
pub struct WirePayload<'a> {
    pub schema_id: i32,
    pub writer: Arc<Schema>,
    pub body: &'a [u8],
}

impl WirePayload<'_> {
    /// Name of the writer record schema.
    pub fn record_name(&self) -> Option<&str> {
        record_name(&self.writer)
    }

    /// Decode the body, resolving from the writer schema to `reader` when given.
    pub fn decode(&self, reader: Option<&Schema>) -> Result<Value> {
        let mut body = self.body;
        apache_avro::from_avro_datum(&self.writer, &mut body, reader)
            .map_err(|e| Error::Decode(e.to_string()))
    }
}

/// Convert a decoded Avro value to JSON.
pub fn to_json(value: Value) -> Result<serde_json::Value> {
    serde_json::Value::try_from(value).map_err(|e| Error::Decode(e.to_string()))
}
