//! The `Record` trait implemented by every domain message type.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::naming::topic_for;

/// A typed domain message that can be produced to and consumed from Kafka.
///
/// The Avro schema returned by [`Record::schema`] must describe an Avro
/// `record` whose name equals [`Record::name`]. Consumers route incoming
/// messages by the writer schema's record name, so the two must agree.
///
/// # Example
///
/// ```rust
/// use kafka_types::Record;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Serialize, Deserialize)]
/// struct UserCreated {
///     id: String,
///     email: String,
/// }
///
/// impl Record for UserCreated {
///     fn schema() -> &'static str {
///         r#"{
///             "type": "record",
///             "name": "UserCreated",
///             "fields": [
///                 {"name": "id", "type": "string"},
///                 {"name": "email", "type": "string"}
///             ]
///         }"#
///     }
///
///     fn key(&self) -> Option<String> {
///         Some(self.id.clone())
///     }
/// }
///
/// assert_eq!(UserCreated::name(), "UserCreated");
/// assert_eq!(UserCreated::topic().unwrap(), "user-created");
/// ```
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Avro schema (JSON) describing the record fields.
    fn schema() -> &'static str;

    /// Stable record name. Defaults to the unqualified Rust type name.
    fn name() -> String {
        short_type_name::<Self>()
    }

    /// Message key. `None` lets the producer generate one.
    fn key(&self) -> Option<String> {
        None
    }

    /// Canonical topic for this record type.
    fn topic() -> Result<String> {
        topic_for(&Self::name())
    }
}

/// Unqualified type name with generic arguments stripped.
///
/// `my_app::events::UserCreated` becomes `UserCreated`, and
/// `my_app::Envelope<my_app::Order>` becomes `Envelope`.
pub fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize)]
    struct OrderShipped {
        id: String,
    }

    impl Record for OrderShipped {
        fn schema() -> &'static str {
            r#"{"type":"record","name":"OrderShipped","fields":[{"name":"id","type":"string"}]}"#
        }
    }

    #[allow(dead_code)]
    struct Envelope<T>(T);

    #[test]
    fn test_default_name_is_short_type_name() {
        assert_eq!(OrderShipped::name(), "OrderShipped");
        assert_eq!(OrderShipped::topic().unwrap(), "order-shipped");
    }

    #[test]
    fn test_short_type_name_strips_generics() {
        assert_eq!(short_type_name::<Envelope<OrderShipped>>(), "Envelope");
        assert_eq!(short_type_name::<String>(), "String");
    }

    #[test]
    fn test_default_key_is_none() {
        let record = OrderShipped {
            id: uuid::Uuid::new_v4().to_string(),
        };
        assert!(record.key().is_none());
    }
}
