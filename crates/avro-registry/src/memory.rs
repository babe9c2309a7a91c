//! Process-local schema registry.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use apache_avro::Schema;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::registry::{schema_json, SchemaRegistry};

#[derive(Default)]
struct State {
    next_id: i32,
    ids_by_schema: HashMap<String, i32>,
    schemas: HashMap<i32, Arc<Schema>>,
    subjects: BTreeMap<String, Vec<i32>>,
}

/// In-memory registry assigning sequential ids starting at 1.
///
/// Identical schemas share one id across subjects, as with a Confluent
/// registry.
#[derive(Default)]
pub struct MemoryRegistry {
    state: Mutex<State>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered subjects in lexical order.
    pub async fn subjects(&self) -> Vec<String> {
        self.state.lock().await.subjects.keys().cloned().collect()
    }

    /// Schema ids registered under `subject`, oldest first.
    pub async fn versions(&self, subject: &str) -> Vec<i32> {
        self.state
            .lock()
            .await
            .subjects
            .get(subject)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl SchemaRegistry for MemoryRegistry {
    async fn register(&self, subject: &str, schema: &Schema) -> Result<i32> {
        let json = schema_json(schema)?;
        let mut state = self.state.lock().await;

        let existing = state.ids_by_schema.get(&json).copied();
        let id = match existing {
            Some(id) => id,
            None => {
                state.next_id += 1;
                let id = state.next_id;
                state.ids_by_schema.insert(json, id);
                state.schemas.insert(id, Arc::new(schema.clone()));
                id
            }
        };

        let versions = state.subjects.entry(subject.to_string()).or_default();
        if !versions.contains(&id) {
            versions.push(id);
        }
        Ok(id)
    }

    async fn schema_by_id(&self, id: i32) -> Result<Arc<Schema>> {
        self.state
            .lock()
            .await
            .schemas
            .get(&id)
            .cloned()
            .ok_or(Error::SchemaNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::parse_schema;

    #[tokio::test]
    async fn test_ids_are_sequential_and_shared() {
        let registry = MemoryRegistry::new();
        let string = parse_schema(r#""string""#).unwrap();
        let long = parse_schema(r#""long""#).unwrap();

        assert_eq!(registry.register("a-key", &string).await.unwrap(), 1);
        assert_eq!(registry.register("b-key", &string).await.unwrap(), 1);
        assert_eq!(registry.register("a-value", &long).await.unwrap(), 2);

        assert_eq!(registry.subjects().await, vec!["a-key", "a-value", "b-key"]);
        assert_eq!(registry.versions("a-key").await, vec![1]);
    }

    #[tokio::test]
    async fn test_unknown_id_is_registry_error() {
        let registry = MemoryRegistry::new();
        let err = registry.schema_by_id(42).await.unwrap_err();
        assert!(matches!(err, Error::SchemaNotFound(42)));
        assert!(err.is_registry_error());
    }
}
