//! Serialization dispatch.
//!
//! [`SerdeFactory`] resolves a codec per cluster and payload role for each of
//! the five wire formats. Serializers are cheap and built per call;
//! registry-backed deserializers hold a registry client handle and are cached
//! per `(cluster, role, format)` with at-most-once construction. Primitive
//! and container codecs are stateless and never cached.

use crate::fleet::cache::CacheMap;
use crate::fleet::manager::ClusterManager;
use crate::fleet::registry::{SchemaFormat, SchemaRegistryClient};
use crate::fleet::serialization::avro::AvroSerde;
use crate::fleet::serialization::container::EmbeddedAvroCodec;
use crate::fleet::serialization::format::{PayloadRole, WireFormat};
use crate::fleet::serialization::json_schema::JsonSchemaSerde;
use crate::fleet::serialization::primitive::PrimitiveCodec;
use crate::fleet::serialization::protobuf::ProtobufSerde;
use crate::fleet::serialization::SerializationError;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// One serializer, dispatched over the format tagged union.
pub enum MessageSerializer {
    SchemaAvro(AvroSerde),
    SchemaJson(JsonSchemaSerde),
    SchemaProtobuf(ProtobufSerde),
    EmbeddedAvro(EmbeddedAvroCodec),
    Primitive(PrimitiveCodec),
}

impl MessageSerializer {
    /// Encode the text form of a payload for `topic`.
    pub async fn serialize(&self, topic: &str, text: &str) -> Result<Vec<u8>, SerializationError> {
        match self {
            MessageSerializer::SchemaAvro(serde) => serde.serialize(topic, text).await,
            MessageSerializer::SchemaJson(serde) => serde.serialize(topic, text).await,
            MessageSerializer::SchemaProtobuf(serde) => serde.serialize(topic, text).await,
            MessageSerializer::EmbeddedAvro(codec) => codec.serialize(text),
            MessageSerializer::Primitive(codec) => codec.serialize(text),
        }
    }
}

/// One deserializer, dispatched over the format tagged union.
pub enum MessageDeserializer {
    SchemaAvro(AvroSerde),
    SchemaJson(JsonSchemaSerde),
    SchemaProtobuf(ProtobufSerde),
    EmbeddedAvro(EmbeddedAvroCodec),
    Primitive(PrimitiveCodec),
}

impl MessageDeserializer {
    /// Decode a payload to its text form. `None` is the explicit no-value
    /// result of an empty container.
    pub async fn deserialize(
        &self,
        bytes: &[u8],
    ) -> Result<Option<String>, SerializationError> {
        match self {
            MessageDeserializer::SchemaAvro(serde) => serde.deserialize(bytes).await.map(Some),
            MessageDeserializer::SchemaJson(serde) => serde.deserialize(bytes).await.map(Some),
            MessageDeserializer::SchemaProtobuf(serde) => {
                serde.deserialize(bytes).await.map(Some)
            }
            MessageDeserializer::EmbeddedAvro(codec) => codec.deserialize(bytes),
            MessageDeserializer::Primitive(codec) => codec.deserialize(bytes).map(Some),
        }
    }

    /// Release per-deserializer state (parsed-schema memos).
    pub async fn close(&self) {
        match self {
            MessageDeserializer::SchemaAvro(serde) => serde.close().await,
            MessageDeserializer::SchemaJson(serde) => serde.close().await,
            MessageDeserializer::SchemaProtobuf(serde) => serde.close().await,
            MessageDeserializer::EmbeddedAvro(_) | MessageDeserializer::Primitive(_) => {}
        }
    }
}

pub struct SerdeFactory {
    manager: Arc<ClusterManager>,
    deserializers: CacheMap<(String, PayloadRole, SchemaFormat), Arc<MessageDeserializer>>,
}

impl SerdeFactory {
    pub fn new(manager: Arc<ClusterManager>) -> Self {
        Self {
            manager,
            deserializers: CacheMap::new(),
        }
    }

    /// Build a serializer for one cluster, role and format. `schema_hint`
    /// carries the explicit schema object the JSON Schema serializer needs;
    /// the other formats ignore it.
    pub async fn serializer(
        &self,
        cluster: &str,
        role: PayloadRole,
        format: WireFormat,
        schema_hint: Option<JsonValue>,
    ) -> Result<MessageSerializer, SerializationError> {
        match format {
            WireFormat::SchemaAvro => Ok(MessageSerializer::SchemaAvro(AvroSerde::new(
                self.registry(cluster).await?,
                role,
            ))),
            WireFormat::SchemaJson => {
                let mut serde = JsonSchemaSerde::new(self.registry(cluster).await?, role);
                if let Some(schema) = schema_hint {
                    serde = serde.with_schema(schema);
                }
                Ok(MessageSerializer::SchemaJson(serde))
            }
            WireFormat::SchemaProtobuf => Ok(MessageSerializer::SchemaProtobuf(
                ProtobufSerde::new(self.registry(cluster).await?, role),
            )),
            WireFormat::EmbeddedAvro => {
                Ok(MessageSerializer::EmbeddedAvro(EmbeddedAvroCodec::new()))
            }
            WireFormat::Primitive(primitive) => {
                Ok(MessageSerializer::Primitive(primitive.codec()))
            }
        }
    }

    /// Resolve the deserializer for one cluster, role and format.
    /// Registry-backed deserializers are cached; the schema-less codecs are
    /// rebuilt freely because they hold no state.
    pub async fn deserializer(
        &self,
        cluster: &str,
        role: PayloadRole,
        format: WireFormat,
    ) -> Result<Arc<MessageDeserializer>, SerializationError> {
        match format {
            WireFormat::SchemaAvro => {
                self.cached(cluster, role, SchemaFormat::Avro, |registry| {
                    MessageDeserializer::SchemaAvro(AvroSerde::new(registry, role))
                })
                .await
            }
            WireFormat::SchemaJson => {
                self.cached(cluster, role, SchemaFormat::Json, |registry| {
                    MessageDeserializer::SchemaJson(JsonSchemaSerde::new(registry, role))
                })
                .await
            }
            WireFormat::SchemaProtobuf => {
                self.cached(cluster, role, SchemaFormat::Protobuf, |registry| {
                    MessageDeserializer::SchemaProtobuf(ProtobufSerde::new(registry, role))
                })
                .await
            }
            WireFormat::EmbeddedAvro => Ok(Arc::new(MessageDeserializer::EmbeddedAvro(
                EmbeddedAvroCodec::new(),
            ))),
            WireFormat::Primitive(primitive) => Ok(Arc::new(MessageDeserializer::Primitive(
                primitive.codec(),
            ))),
        }
    }

    /// Drop every cached deserializer across all clusters and roles.
    pub async fn close(&self) {
        self.deserializers.drain().await;
    }

    /// Drop one cluster's cached deserializers (up to six entries: three
    /// formats by two roles; absent entries are simply skipped) and close
    /// each one.
    pub async fn close_cluster(&self, cluster: &str) {
        let removed = self
            .deserializers
            .remove_matching(|(owner, _, _)| owner == cluster)
            .await;
        for (_, deserializer) in removed {
            deserializer.close().await;
        }
    }

    async fn cached<F>(
        &self,
        cluster: &str,
        role: PayloadRole,
        registry_format: SchemaFormat,
        build: F,
    ) -> Result<Arc<MessageDeserializer>, SerializationError>
    where
        F: FnOnce(Arc<SchemaRegistryClient>) -> MessageDeserializer,
    {
        self.deserializers
            .get_or_try_create(
                &(cluster.to_string(), role, registry_format),
                || async move {
                    let registry = self.registry(cluster).await?;
                    Ok(Arc::new(build(registry)))
                },
            )
            .await
    }

    async fn registry(
        &self,
        cluster: &str,
    ) -> Result<Arc<SchemaRegistryClient>, SerializationError> {
        self.manager
            .get_schema_registry_client(cluster)
            .await
            .map_err(SerializationError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::config::{ClusterDefinition, SchemaRegistryDefinition, StaticCatalog};
    use crate::fleet::error::ClusterError;
    use crate::fleet::serialization::primitive::PrimitiveType;

    fn factory() -> SerdeFactory {
        let catalog = StaticCatalog::new()
            .with_cluster(
                ClusterDefinition::new("alpha", "localhost:9092")
                    .schema_registry(SchemaRegistryDefinition::new("http://registry:8081")),
            )
            .with_cluster(ClusterDefinition::new("bare", "localhost:9093"));
        SerdeFactory::new(Arc::new(ClusterManager::new(Arc::new(catalog))))
    }

    #[tokio::test]
    async fn test_registry_deserializer_cached_per_key() {
        let factory = factory();

        let first = factory
            .deserializer("alpha", PayloadRole::Value, WireFormat::SchemaAvro)
            .await
            .unwrap();
        let second = factory
            .deserializer("alpha", PayloadRole::Value, WireFormat::SchemaAvro)
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        // A different role is a different cache entry.
        let key_side = factory
            .deserializer("alpha", PayloadRole::Key, WireFormat::SchemaAvro)
            .await
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &key_side));
    }

    #[tokio::test]
    async fn test_schema_less_formats_need_no_registry() {
        let factory = factory();

        // Cluster "bare" has no registry; the schema-less codecs still work.
        let primitive = factory
            .deserializer(
                "bare",
                PayloadRole::Value,
                WireFormat::Primitive(PrimitiveType::Int64),
            )
            .await
            .unwrap();
        let encoded = 42i64.to_be_bytes();
        assert_eq!(
            primitive.deserialize(&encoded).await.unwrap(),
            Some("42".to_string())
        );

        assert!(factory
            .deserializer("bare", PayloadRole::Value, WireFormat::EmbeddedAvro)
            .await
            .is_ok());

        // The registry-backed formats surface the missing definition.
        match factory
            .deserializer("bare", PayloadRole::Value, WireFormat::SchemaAvro)
            .await
        {
            Err(SerializationError::Registry(ClusterError::RegistryNotDefined(_))) => {}
            other => panic!("expected RegistryNotDefined, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_json_serializer_requires_schema_hint() {
        let factory = factory();
        let serializer = factory
            .serializer("alpha", PayloadRole::Value, WireFormat::SchemaJson, None)
            .await
            .unwrap();

        match serializer.serialize("orders", "{}").await {
            Err(SerializationError::SchemaError(_)) => {}
            other => panic!("expected SchemaError, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_close_cluster_is_scoped() {
        let factory = factory();

        let alpha = factory
            .deserializer("alpha", PayloadRole::Value, WireFormat::SchemaAvro)
            .await
            .unwrap();
        factory.close_cluster("alpha").await;

        let rebuilt = factory
            .deserializer("alpha", PayloadRole::Value, WireFormat::SchemaAvro)
            .await
            .unwrap();
        assert!(!Arc::ptr_eq(&alpha, &rebuilt));

        // Closing a cluster with no cached entries is fine.
        factory.close_cluster("bare").await;
        factory.close().await;
    }
}
