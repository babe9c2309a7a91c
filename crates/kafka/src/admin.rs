//! Topic administration helpers.

use std::time::Duration;

use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::consumer::{BaseConsumer, Consumer as RdkafkaConsumer};
use rdkafka::types::RDKafkaErrorCode;

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};

/// A topic as reported by cluster metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicInfo {
    pub name: String,
    pub partitions: usize,
}

/// Create `topic` unless it already exists.
///
/// Returns `true` when the topic was created.
pub async fn create_topic_if_not_exists(
    connection: &ConnectionConfig,
    topic: &str,
    partitions: i32,
    replication: i32,
) -> Result<bool> {
    if partitions < 1 || replication < 1 {
        return Err(Error::InvalidArgument(format!(
            "topic '{topic}' needs at least one partition and one replica"
        )));
    }

    let admin_client: AdminClient<DefaultClientContext> = connection.client_config().create()?;

    let new_topic = NewTopic::new(topic, partitions, TopicReplication::Fixed(replication));
    let opts = AdminOptions::new().operation_timeout(Some(Duration::from_secs(5)));

    let results = admin_client.create_topics(&[new_topic], &opts).await?;
    let mut created = false;
    for result in results {
        match result {
            Ok(topic_name) => {
                tracing::info!(topic = %topic_name, "Topic created");
                created = true;
            }
            Err((topic_name, RDKafkaErrorCode::TopicAlreadyExists)) => {
                tracing::info!(topic = %topic_name, "Topic already exists");
            }
            Err((topic_name, code)) => {
                return Err(Error::Admin(format!(
                    "Failed to create topic '{topic_name}': {code}"
                )));
            }
        }
    }
    Ok(created)
}

/// List topics known to the cluster, sorted by name.
pub async fn list_topics(connection: &ConnectionConfig, timeout: Duration) -> Result<Vec<TopicInfo>> {
    let consumer: BaseConsumer = connection.client_config().create()?;

    let topics = tokio::task::spawn_blocking(move || -> Result<Vec<TopicInfo>> {
        let metadata = consumer.fetch_metadata(None, timeout)?;
        let mut topics: Vec<TopicInfo> = metadata
            .topics()
            .iter()
            .map(|topic| TopicInfo {
                name: topic.name().to_string(),
                partitions: topic.partitions().len(),
            })
            .collect();
        topics.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(topics)
    })
    .await??;

    Ok(topics)
}
