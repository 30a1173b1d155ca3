//! Self-describing Avro container codec.
//!
//! The object-container format embeds its own schema and zero or more
//! records, so no registry is involved. Deserialization reads only the first
//! record and renders it as canonical JSON text; a container with zero
//! records is an explicit "no value", not an error. Producing this format is
//! out of scope: serialization signals an unsupported operation.

use crate::fleet::serialization::avro::avro_to_json;
use crate::fleet::serialization::SerializationError;
use apache_avro::Reader;

#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedAvroCodec;

impl EmbeddedAvroCodec {
    pub fn new() -> Self {
        Self
    }

    /// Render the container's first record as JSON text, or `None` when the
    /// container holds no records.
    pub fn deserialize(&self, bytes: &[u8]) -> Result<Option<String>, SerializationError> {
        let mut reader = Reader::new(bytes).map_err(|e| {
            SerializationError::deserialize_error("not an Avro object container", e)
        })?;

        match reader.next() {
            None => Ok(None),
            Some(record) => {
                let value = record.map_err(|e| {
                    SerializationError::deserialize_error("unreadable container record", e)
                })?;
                let json = avro_to_json(value)?;
                let text = serde_json::to_string(&json).map_err(|e| {
                    SerializationError::deserialize_error("JSON rendering failed", e)
                })?;
                Ok(Some(text))
            }
        }
    }

    /// Container payloads are read-only in this layer.
    pub fn serialize(&self, _text: &str) -> Result<Vec<u8>, SerializationError> {
        Err(SerializationError::UnsupportedOperation(
            "self-describing container payloads cannot be serialized".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apache_avro::types::Value as AvroValue;
    use apache_avro::{Schema as AvroSchema, Writer};

    const SCHEMA: &str = r#"{
        "type": "record",
        "name": "Event",
        "fields": [
            {"name": "id", "type": "long"},
            {"name": "kind", "type": "string"}
        ]
    }"#;

    fn container(records: &[(i64, &str)]) -> Vec<u8> {
        let schema = AvroSchema::parse_str(SCHEMA).unwrap();
        let mut writer = Writer::new(&schema, Vec::new());
        for (id, kind) in records {
            let record = AvroValue::Record(vec![
                ("id".to_string(), AvroValue::Long(*id)),
                ("kind".to_string(), AvroValue::String(kind.to_string())),
            ]);
            writer.append(record).unwrap();
        }
        writer.into_inner().unwrap()
    }

    #[test]
    fn test_first_record_only() {
        let bytes = container(&[(1, "created"), (2, "deleted")]);
        let text = EmbeddedAvroCodec::new().deserialize(&bytes).unwrap().unwrap();

        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["kind"], "created");
    }

    #[test]
    fn test_empty_container_is_no_value() {
        let bytes = container(&[]);
        assert!(EmbeddedAvroCodec::new().deserialize(&bytes).unwrap().is_none());
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(EmbeddedAvroCodec::new().deserialize(b"not avro").is_err());
    }

    #[test]
    fn test_serialize_is_unsupported() {
        match EmbeddedAvroCodec::new().serialize("{}") {
            Err(SerializationError::UnsupportedOperation(_)) => {}
            other => panic!("expected UnsupportedOperation, got {:?}", other.map(|_| ())),
        }
    }
}
