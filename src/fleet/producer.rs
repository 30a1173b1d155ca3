//! Byte-level producer handle.
//!
//! Producers are deliberately not cached as live handles: the manager caches
//! the cluster's producer *configuration* and constructs a fresh
//! [`ClusterProducer`] from it on every call. Payloads are raw bytes; encoding
//! is the serialization layer's concern.

use crate::fleet::error::ClusterError;
use crate::fleet::profile::ConnectionProfile;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use std::collections::HashMap;
use std::time::Duration;

pub struct ClusterProducer {
    inner: FutureProducer,
}

impl ClusterProducer {
    /// Build a producer from a broker connection profile. Construction
    /// failures from the client library are surfaced unmodified.
    pub fn from_profile(profile: &ConnectionProfile) -> Result<Self, ClusterError> {
        let producer: FutureProducer = profile.client_config().create()?;
        Ok(Self { inner: producer })
    }

    /// Send one record and wait for the delivery report. Returns the
    /// partition and offset the record landed on.
    pub async fn send(
        &self,
        topic: &str,
        key: Option<&[u8]>,
        payload: &[u8],
        headers: &HashMap<String, Option<String>>,
        timeout: Duration,
    ) -> Result<(i32, i64), ClusterError> {
        let mut record = FutureRecord::<[u8], [u8]>::to(topic).payload(payload);
        if let Some(key_bytes) = key {
            record = record.key(key_bytes);
        }
        if !headers.is_empty() {
            record = record.headers(to_rdkafka_headers(headers));
        }

        self.inner
            .send(record, timeout)
            .await
            .map_err(|(err, _)| ClusterError::Kafka(err))
    }

    pub fn inner(&self) -> &FutureProducer {
        &self.inner
    }
}

fn to_rdkafka_headers(headers: &HashMap<String, Option<String>>) -> OwnedHeaders {
    let mut owned = OwnedHeaders::new_with_capacity(headers.len());
    for (key, value) in headers {
        owned = owned.insert(Header {
            key,
            value: value.as_deref(),
        });
    }
    owned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::profile::keys;
    use rdkafka::message::Headers as _;

    #[test]
    fn test_construct_from_profile() {
        let mut profile = ConnectionProfile::new();
        profile.set(keys::BOOTSTRAP_SERVERS, "localhost:9092");
        // Construction does not contact the broker.
        assert!(ClusterProducer::from_profile(&profile).is_ok());
    }

    #[test]
    fn test_header_conversion_preserves_null_values() {
        let mut headers = HashMap::new();
        headers.insert("source".to_string(), Some("console".to_string()));
        headers.insert("marker".to_string(), None);

        let owned = to_rdkafka_headers(&headers);
        assert_eq!(owned.count(), 2);
    }
}
