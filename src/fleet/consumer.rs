//! Byte-level consumer handle.
//!
//! Like producers, consumers are constructed fresh on every call from the
//! cluster's cached consumer configuration. The handle exposes subscription
//! and a timeout-bounded single-message poll returning the raw record parts;
//! decoding is the serialization layer's concern.

use crate::fleet::error::ClusterError;
use crate::fleet::profile::ConnectionProfile;
use futures::StreamExt;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{Headers as _, Message as _};
use std::collections::HashMap;
use std::time::Duration;

/// Raw parts of one consumed record.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub timestamp_ms: Option<i64>,
    pub key: Option<Vec<u8>>,
    /// `None` for tombstone records.
    pub payload: Option<Vec<u8>>,
    pub headers: HashMap<String, Option<String>>,
}

pub struct ClusterConsumer {
    inner: StreamConsumer,
}

impl ClusterConsumer {
    /// Build a consumer from a broker connection profile (which carries the
    /// group id). Construction failures from the client library are surfaced
    /// unmodified.
    pub fn from_profile(profile: &ConnectionProfile) -> Result<Self, ClusterError> {
        let consumer: StreamConsumer = profile.client_config().create()?;
        Ok(Self { inner: consumer })
    }

    pub fn subscribe(&self, topics: &[&str]) -> Result<(), ClusterError> {
        self.inner.subscribe(topics)?;
        Ok(())
    }

    /// Poll for one message. Returns `None` when the timeout elapses without
    /// a record.
    pub async fn poll_message(
        &self,
        timeout: Duration,
    ) -> Result<Option<ReceivedMessage>, ClusterError> {
        let mut stream = self.inner.stream();
        match tokio::time::timeout(timeout, stream.next()).await {
            Ok(Some(Ok(message))) => {
                let headers = message
                    .headers()
                    .map(|kafka_headers| {
                        kafka_headers
                            .iter()
                            .map(|header| {
                                let value = header
                                    .value
                                    .map(|bytes| String::from_utf8_lossy(bytes).into_owned());
                                (header.key.to_string(), value)
                            })
                            .collect()
                    })
                    .unwrap_or_default();

                Ok(Some(ReceivedMessage {
                    topic: message.topic().to_string(),
                    partition: message.partition(),
                    offset: message.offset(),
                    timestamp_ms: message.timestamp().to_millis(),
                    key: message.key().map(|bytes| bytes.to_vec()),
                    payload: message.payload().map(|bytes| bytes.to_vec()),
                    headers,
                }))
            }
            Ok(Some(Err(err))) => Err(ClusterError::Kafka(err)),
            Ok(None) | Err(_) => Ok(None),
        }
    }

    pub fn inner(&self) -> &StreamConsumer {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::profile::keys;

    #[tokio::test]
    async fn test_construct_requires_group_id() {
        let mut profile = ConnectionProfile::new();
        profile.set(keys::BOOTSTRAP_SERVERS, "localhost:9092");
        profile.set(keys::GROUP_ID, "console-test");
        assert!(ClusterConsumer::from_profile(&profile).is_ok());
    }
}
