//! Serialization dispatch tests driven through the public factory surface:
//! primitive round trips, the self-describing container format, and the
//! dispatch/caching rules that do not need a live registry.

use apache_avro::types::Value as AvroValue;
use apache_avro::{Schema as AvroSchema, Writer};
use fleetstream::fleet::serialization::{PayloadRole, SerializationError};
use fleetstream::{
    ClusterDefinition, ClusterManager, PrimitiveType, SchemaRegistryDefinition, SerdeFactory,
    StaticCatalog, WireFormat,
};
use std::sync::Arc;

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
async fn primitive_codecs_round_trip_through_the_factory() {
    let factory = factory();

    for (format, text) in [
        (WireFormat::Primitive(PrimitiveType::Int64), "-9223372036854775808"),
        (WireFormat::Primitive(PrimitiveType::Int64), "0"),
        (WireFormat::Primitive(PrimitiveType::Int64), "9223372036854775807"),
        (WireFormat::Primitive(PrimitiveType::Int32), "-1"),
        (WireFormat::Primitive(PrimitiveType::Float64), "2.25"),
        (WireFormat::Primitive(PrimitiveType::Text), "plain text payload"),
        (
            WireFormat::Primitive(PrimitiveType::Uuid),
            "6ba7b810-9dad-11d1-80b4-00c04fd430c8",
        ),
    ] {
        let serializer = factory
            .serializer("bare", PayloadRole::Value, format, None)
            .await
            .unwrap();
        let deserializer = factory
            .deserializer("bare", PayloadRole::Value, format)
            .await
            .unwrap();

        let bytes = serializer.serialize("any-topic", text).await.unwrap();
        let decoded = deserializer.deserialize(&bytes).await.unwrap();
        assert_eq!(decoded.as_deref(), Some(text));
    }
}

#[tokio::test]
async fn container_payloads_deserialize_first_record_only() {
    let schema = AvroSchema::parse_str(
        r#"{"type": "record", "name": "Ping", "fields": [{"name": "seq", "type": "long"}]}"#,
    )
    .unwrap();
    let mut writer = Writer::new(&schema, Vec::new());
    writer
        .append(AvroValue::Record(vec![(
            "seq".to_string(),
            AvroValue::Long(1),
        )]))
        .unwrap();
    writer
        .append(AvroValue::Record(vec![(
            "seq".to_string(),
            AvroValue::Long(2),
        )]))
        .unwrap();
    let bytes = writer.into_inner().unwrap();

    let factory = factory();
    let deserializer = factory
        .deserializer("bare", PayloadRole::Value, WireFormat::EmbeddedAvro)
        .await
        .unwrap();

    let text = deserializer.deserialize(&bytes).await.unwrap().unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["seq"], 1);
}

#[tokio::test]
async fn empty_container_is_an_explicit_no_value() {
    let schema = AvroSchema::parse_str(
        r#"{"type": "record", "name": "Ping", "fields": [{"name": "seq", "type": "long"}]}"#,
    )
    .unwrap();
    let bytes = Writer::new(&schema, Vec::new()).into_inner().unwrap();

    let factory = factory();
    let deserializer = factory
        .deserializer("bare", PayloadRole::Value, WireFormat::EmbeddedAvro)
        .await
        .unwrap();

    assert!(deserializer.deserialize(&bytes).await.unwrap().is_none());
}

#[tokio::test]
async fn container_serialization_is_rejected() {
    let factory = factory();
    let serializer = factory
        .serializer("bare", PayloadRole::Value, WireFormat::EmbeddedAvro, None)
        .await
        .unwrap();

    match serializer.serialize("topic", "{}").await {
        Err(SerializationError::UnsupportedOperation(_)) => {}
        other => panic!("expected UnsupportedOperation, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn registry_deserializers_are_cached_per_cluster_and_role() {
    let factory = factory();

    let value_side = factory
        .deserializer("alpha", PayloadRole::Value, WireFormat::SchemaProtobuf)
        .await
        .unwrap();
    let value_again = factory
        .deserializer("alpha", PayloadRole::Value, WireFormat::SchemaProtobuf)
        .await
        .unwrap();
    let key_side = factory
        .deserializer("alpha", PayloadRole::Key, WireFormat::SchemaProtobuf)
        .await
        .unwrap();

    assert!(Arc::ptr_eq(&value_side, &value_again));
    assert!(!Arc::ptr_eq(&value_side, &key_side));

    factory.close_cluster("alpha").await;
    let rebuilt = factory
        .deserializer("alpha", PayloadRole::Value, WireFormat::SchemaProtobuf)
        .await
        .unwrap();
    assert!(!Arc::ptr_eq(&value_side, &rebuilt));
}

#[tokio::test]
async fn wire_format_names_parse() {
    assert_eq!("avro".parse::<WireFormat>().unwrap(), WireFormat::SchemaAvro);
    assert_eq!(
        "int64".parse::<WireFormat>().unwrap(),
        WireFormat::Primitive(PrimitiveType::Int64)
    );
    assert!("xml".parse::<WireFormat>().is_err());
}
