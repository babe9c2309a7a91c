//! Memoizing registry decorator.

use std::collections::HashMap;
use std::sync::Arc;

use apache_avro::Schema;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::registry::{schema_json, SchemaRegistry};

/// Caches ids by (subject, schema) and schemas by id.
///
/// Registry lookups happen once per distinct schema instead of once per
/// message.
pub struct CachedRegistry<R> {
    inner: R,
    ids: RwLock<HashMap<(String, String), i32>>,
    schemas: RwLock<HashMap<i32, Arc<Schema>>>,
}

impl<R: SchemaRegistry> CachedRegistry<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            ids: RwLock::new(HashMap::new()),
            schemas: RwLock::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }
}

#[async_trait]
impl<R: SchemaRegistry> SchemaRegistry for CachedRegistry<R> {
    async fn register(&self, subject: &str, schema: &Schema) -> Result<i32> {
        let cache_key = (subject.to_string(), schema_json(schema)?);
        if let Some(id) = self.ids.read().await.get(&cache_key) {
            return Ok(*id);
        }

        let id = self.inner.register(subject, schema).await?;
        self.ids.write().await.insert(cache_key, id);
        self.schemas
            .write()
            .await
            .entry(id)
            .or_insert_with(|| Arc::new(schema.clone()));
        Ok(id)
    }

    async fn schema_by_id(&self, id: i32) -> Result<Arc<Schema>> {
        if let Some(schema) = self.schemas.read().await.get(&id) {
            return Ok(schema.clone());
        }

        let schema = self.inner.schema_by_id(id).await?;
        self.schemas.write().await.insert(id, schema.clone());
        Ok(schema)
    }
}
