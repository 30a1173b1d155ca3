//! Administrative client handle for one cluster.
//!
//! Wraps the rdkafka admin client behind a closable handle: the manager caches
//! one per cluster and shuts it down with a bounded grace period. Dropping the
//! underlying client joins librdkafka's background threads, which can block,
//! so [`BrokerAdminClient::close`] performs the drop on the blocking pool and
//! gives up after the grace period rather than stalling shutdown.

use crate::fleet::error::ClusterError;
use crate::fleet::profile::ConnectionProfile;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::error::KafkaError;
use rdkafka::types::RDKafkaErrorCode;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Name and partition count of one topic, as reported by cluster metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSummary {
    pub name: String,
    pub partitions: usize,
}

pub struct BrokerAdminClient {
    inner: Mutex<Option<AdminClient<DefaultClientContext>>>,
}

impl BrokerAdminClient {
    /// Build an admin client from a broker connection profile. Construction
    /// failures from the client library are surfaced unmodified.
    pub fn from_profile(profile: &ConnectionProfile) -> Result<Self, ClusterError> {
        let admin: AdminClient<DefaultClientContext> = profile.client_config().create()?;
        Ok(Self {
            inner: Mutex::new(Some(admin)),
        })
    }

    /// List every topic with its partition count.
    pub async fn list_topics(&self) -> Result<Vec<TopicSummary>, ClusterError> {
        let guard = self.inner.lock().await;
        let admin = guard.as_ref().ok_or(ClusterError::ClientClosed)?;

        let metadata = admin.inner().fetch_metadata(None, METADATA_TIMEOUT)?;
        Ok(metadata
            .topics()
            .iter()
            .map(|topic| TopicSummary {
                name: topic.name().to_string(),
                partitions: topic.partitions().len(),
            })
            .collect())
    }

    /// Create a topic. A topic that already exists is not an error.
    pub async fn create_topic(
        &self,
        name: &str,
        partitions: i32,
        replication_factor: i32,
        config: Option<HashMap<String, String>>,
    ) -> Result<(), ClusterError> {
        let guard = self.inner.lock().await;
        let admin = guard.as_ref().ok_or(ClusterError::ClientClosed)?;

        let mut topic = NewTopic::new(name, partitions, TopicReplication::Fixed(replication_factor));
        if let Some(ref topic_config) = config {
            for (key, value) in topic_config {
                topic = topic.set(key, value);
            }
        }

        let options = AdminOptions::new()
            .operation_timeout(Some(REQUEST_TIMEOUT))
            .request_timeout(Some(REQUEST_TIMEOUT));
        let results = admin.create_topics(&[topic], &options).await?;

        for result in results {
            match result {
                Ok(created) => {
                    log::info!("Created topic {} with {} partitions", created, partitions)
                }
                Err((existing, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    log::debug!("Topic {} already exists", existing)
                }
                Err((_, code)) => return Err(ClusterError::Kafka(KafkaError::AdminOp(code))),
            }
        }
        Ok(())
    }

    /// Delete a topic. A topic that does not exist is not an error.
    pub async fn delete_topic(&self, name: &str) -> Result<(), ClusterError> {
        let guard = self.inner.lock().await;
        let admin = guard.as_ref().ok_or(ClusterError::ClientClosed)?;

        let options = AdminOptions::new()
            .operation_timeout(Some(REQUEST_TIMEOUT))
            .request_timeout(Some(REQUEST_TIMEOUT));
        let results = admin.delete_topics(&[name], &options).await?;

        for result in results {
            match result {
                Ok(deleted) => log::info!("Deleted topic {}", deleted),
                Err((missing, RDKafkaErrorCode::UnknownTopicOrPartition)) => {
                    log::debug!("Topic {} does not exist, nothing to delete", missing)
                }
                Err((_, code)) => return Err(ClusterError::Kafka(KafkaError::AdminOp(code))),
            }
        }
        Ok(())
    }

    pub async fn topic_exists(&self, name: &str) -> Result<bool, ClusterError> {
        let guard = self.inner.lock().await;
        let admin = guard.as_ref().ok_or(ClusterError::ClientClosed)?;

        let metadata = admin.inner().fetch_metadata(Some(name), METADATA_TIMEOUT)?;
        Ok(metadata.topics().iter().any(|topic| topic.name() == name))
    }

    pub async fn partition_count(&self, name: &str) -> Result<Option<usize>, ClusterError> {
        let guard = self.inner.lock().await;
        let admin = guard.as_ref().ok_or(ClusterError::ClientClosed)?;

        let metadata = admin.inner().fetch_metadata(Some(name), METADATA_TIMEOUT)?;
        Ok(metadata
            .topics()
            .iter()
            .find(|topic| topic.name() == name)
            .map(|topic| topic.partitions().len()))
    }

    /// Close the handle, waiting at most `grace` for the underlying client to
    /// shut down before abandoning it. Subsequent operations return
    /// [`ClusterError::ClientClosed`].
    pub async fn close(&self, grace: Duration) {
        let taken = self.inner.lock().await.take();
        if let Some(admin) = taken {
            let join = tokio::task::spawn_blocking(move || drop(admin));
            if tokio::time::timeout(grace, join).await.is_err() {
                log::warn!(
                    "Admin client did not shut down within {}ms, forcing",
                    grace.as_millis()
                );
            }
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.is_none()
    }
}
