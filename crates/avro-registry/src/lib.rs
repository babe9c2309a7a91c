//! Schema registry access and the Avro wire codec.
//!
//! Payloads are framed the way Confluent-compatible producers and consumers
//! expect: a zero magic byte, the big-endian schema id, then the Avro binary
//! body (see [`wire`]).
//!
//! Registries:
//! - [`HttpSchemaRegistry`] talks to a Confluent-compatible REST endpoint
//! - [`CachedRegistry`] memoizes any registry
//! - [`MemoryRegistry`] keeps everything in process, for tests and tooling

pub mod cache;
pub mod codec;
pub mod error;
pub mod http;
pub mod memory;
pub mod registry;
pub mod wire;

pub use apache_avro::types::Value;
pub use apache_avro::{from_value, to_value};
pub use apache_avro::Schema;
pub use cache::CachedRegistry;
pub use codec::{to_json, AvroCodec, WirePayload};
pub use error::{Error, Result};
pub use http::{HttpSchemaRegistry, RegistryConfig};
pub use memory::MemoryRegistry;
pub use registry::{parse_schema, record_name, SchemaRegistry};
