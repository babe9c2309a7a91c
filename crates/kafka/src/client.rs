use std::sync::Arc;

use avro_registry::{AvroCodec, CachedRegistry, HttpSchemaRegistry, RegistryConfig, SchemaRegistry};

use crate::config::{ConsumerConfig, ProducerConfig};
use crate::consumer::Consumer;
use crate::error::Result;
use crate::producer::Producer;

/// Entry point creating producers and consumers that share one schema
/// registry.
///
/// Every consumer gets its own broker connection plus a separate failure
/// producer configured with the same connection settings.
#[derive(Clone)]
pub struct KafkaClient {
    codec: AvroCodec,
}

impl KafkaClient {
    pub fn new(registry: Arc<dyn SchemaRegistry>) -> Self {
        Self {
            codec: AvroCodec::new(registry),
        }
    }

    /// Talk to a Confluent-compatible registry, caching schema lookups.
    pub fn from_registry_config(config: &RegistryConfig) -> Result<Self> {
        let registry = CachedRegistry::new(HttpSchemaRegistry::new(config)?);
        Ok(Self::new(Arc::new(registry)))
    }

    pub fn codec(&self) -> &AvroCodec {
        &self.codec
    }

    pub fn producer(&self, config: &ProducerConfig) -> Result<Producer> {
        Producer::connect(config, self.codec.clone())
    }

    pub fn consumer(&self, config: ConsumerConfig) -> Result<Consumer> {
        let failure_producer = self.producer(&ProducerConfig::for_failures(&config.connection))?;
        Consumer::connect(config, self.codec.clone(), failure_producer)
    }
}
