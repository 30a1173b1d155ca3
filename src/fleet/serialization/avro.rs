//! Registry-governed Avro codec and the JSON ↔ Avro value mapping.
//!
//! Serialization resolves the subject's latest schema (never registering),
//! maps the caller's JSON text onto an Avro datum against that schema, and
//! frames the datum with the schema id. Deserialization resolves the embedded
//! id and renders the datum back as JSON text. Parsed writer schemas are
//! memoized per id; `close` drops the memo.

use crate::fleet::registry::{RegistrySchema, SchemaFormat, SchemaRegistryClient};
use crate::fleet::serialization::format::{PayloadRole, RegistrySerdeConfig};
use crate::fleet::serialization::wire;
use crate::fleet::serialization::SerializationError;
use apache_avro::schema::{RecordSchema, UnionSchema};
use apache_avro::types::Value as AvroValue;
use apache_avro::{from_avro_datum, to_avro_datum, Schema as AvroSchema};
use serde_json::{Map as JsonMap, Number, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

pub struct AvroSerde {
    registry: Arc<SchemaRegistryClient>,
    role: PayloadRole,
    config: RegistrySerdeConfig,
    parsed: Mutex<HashMap<u32, Arc<AvroSchema>>>,
}

impl AvroSerde {
    pub fn new(registry: Arc<SchemaRegistryClient>, role: PayloadRole) -> Self {
        Self {
            registry,
            role,
            config: RegistrySerdeConfig::default(),
            parsed: Mutex::new(HashMap::new()),
        }
    }

    /// The fixed conservative registry mode this serde runs in.
    pub fn config(&self) -> RegistrySerdeConfig {
        self.config
    }

    pub async fn serialize(&self, topic: &str, text: &str) -> Result<Vec<u8>, SerializationError> {
        // use_latest_version is pinned on: resolution only, never registration.
        let subject = self.role.subject(topic);
        let schema = self.registry.latest_schema(&subject).await?;
        let parsed = self.parsed_schema(&schema).await?;

        let json: JsonValue = serde_json::from_str(text)
            .map_err(|e| SerializationError::serialize_error("payload is not valid JSON", e))?;
        let value = json_to_avro(&parsed, &json)?;
        let datum = to_avro_datum(&parsed, value)
            .map_err(|e| SerializationError::serialize_error("Avro encoding failed", e))?;

        Ok(wire::encode_frame(schema.id, &datum))
    }

    pub async fn deserialize(&self, bytes: &[u8]) -> Result<String, SerializationError> {
        let (schema_id, body) = wire::decode_frame(bytes)?;
        let schema = self.registry.schema_by_id(schema_id).await?;
        let parsed = self.parsed_schema(&schema).await?;

        let mut reader = body;
        let value = from_avro_datum(&parsed, &mut reader, None)
            .map_err(|e| SerializationError::deserialize_error("Avro decoding failed", e))?;
        let json = avro_to_json(value)?;
        serde_json::to_string(&json)
            .map_err(|e| SerializationError::deserialize_error("JSON rendering failed", e))
    }

    /// Drop the parsed-schema memo. The serde remains usable.
    pub async fn close(&self) {
        self.parsed.lock().await.clear();
    }

    async fn parsed_schema(
        &self,
        schema: &RegistrySchema,
    ) -> Result<Arc<AvroSchema>, SerializationError> {
        if schema.format != SchemaFormat::Avro {
            return Err(SerializationError::SchemaError(format!(
                "schema {} is {}, not AVRO",
                schema.id,
                schema.format.as_str()
            )));
        }
        if let Some(found) = self.parsed.lock().await.get(&schema.id) {
            return Ok(found.clone());
        }
        let parsed = AvroSchema::parse_str(&schema.definition)
            .map_err(|e| SerializationError::schema_error("unparseable Avro schema", e))?;
        let shared = Arc::new(parsed);
        self.parsed
            .lock()
            .await
            .insert(schema.id, shared.clone());
        Ok(shared)
    }
}

/// Map a JSON value onto an Avro value guided by the writer schema.
pub fn json_to_avro(
    schema: &AvroSchema,
    json: &JsonValue,
) -> Result<AvroValue, SerializationError> {
    match schema {
        AvroSchema::Null => match json {
            JsonValue::Null => Ok(AvroValue::Null),
            other => Err(mismatch("null", other)),
        },
        AvroSchema::Boolean => match json {
            JsonValue::Bool(b) => Ok(AvroValue::Boolean(*b)),
            other => Err(mismatch("boolean", other)),
        },
        AvroSchema::Int => int_from_json(json).map(AvroValue::Int),
        AvroSchema::Long => long_from_json(json).map(AvroValue::Long),
        AvroSchema::Float => double_from_json(json).map(|v| AvroValue::Float(v as f32)),
        AvroSchema::Double => double_from_json(json).map(AvroValue::Double),
        AvroSchema::Bytes => bytes_from_json(json).map(AvroValue::Bytes),
        AvroSchema::String => match json {
            JsonValue::String(s) => Ok(AvroValue::String(s.clone())),
            other => Err(mismatch("string", other)),
        },
        AvroSchema::Uuid => match json {
            JsonValue::String(s) => Uuid::parse_str(s)
                .map(AvroValue::Uuid)
                .map_err(|e| SerializationError::serialize_error("invalid uuid", e)),
            other => Err(mismatch("uuid string", other)),
        },
        AvroSchema::Date => int_from_json(json).map(AvroValue::Date),
        AvroSchema::TimeMillis => int_from_json(json).map(AvroValue::TimeMillis),
        AvroSchema::TimeMicros => long_from_json(json).map(AvroValue::TimeMicros),
        AvroSchema::TimestampMillis => long_from_json(json).map(AvroValue::TimestampMillis),
        AvroSchema::TimestampMicros => long_from_json(json).map(AvroValue::TimestampMicros),
        AvroSchema::LocalTimestampMillis => {
            long_from_json(json).map(AvroValue::LocalTimestampMillis)
        }
        AvroSchema::LocalTimestampMicros => {
            long_from_json(json).map(AvroValue::LocalTimestampMicros)
        }
        AvroSchema::Fixed(fixed) => {
            let bytes = bytes_from_json(json)?;
            if bytes.len() != fixed.size {
                return Err(SerializationError::SerializationFailed(format!(
                    "fixed value must be {} bytes, got {}",
                    fixed.size,
                    bytes.len()
                )));
            }
            Ok(AvroValue::Fixed(fixed.size, bytes))
        }
        AvroSchema::Enum(enumeration) => match json {
            JsonValue::String(symbol) => enumeration
                .symbols
                .iter()
                .position(|candidate| candidate == symbol)
                .map(|position| AvroValue::Enum(position as u32, symbol.clone()))
                .ok_or_else(|| {
                    SerializationError::SerializationFailed(format!(
                        "'{}' is not a symbol of enum {}",
                        symbol, enumeration.name
                    ))
                }),
            other => Err(mismatch("enum symbol", other)),
        },
        AvroSchema::Array(items) => match json {
            JsonValue::Array(values) => values
                .iter()
                .map(|value| json_to_avro(items, value))
                .collect::<Result<Vec<_>, _>>()
                .map(AvroValue::Array),
            other => Err(mismatch("array", other)),
        },
        AvroSchema::Map(values_schema) => match json {
            JsonValue::Object(entries) => entries
                .iter()
                .map(|(key, value)| {
                    json_to_avro(values_schema, value).map(|mapped| (key.clone(), mapped))
                })
                .collect::<Result<HashMap<_, _>, _>>()
                .map(AvroValue::Map),
            other => Err(mismatch("map", other)),
        },
        AvroSchema::Union(union) => union_from_json(union, json),
        AvroSchema::Record(record) => record_from_json(record, json),
        other => Err(SerializationError::SchemaError(format!(
            "unsupported Avro schema kind: {:?}",
            other
        ))),
    }
}

fn union_from_json(
    union: &UnionSchema,
    json: &JsonValue,
) -> Result<AvroValue, SerializationError> {
    if json.is_null() {
        if let Some(position) = union
            .variants()
            .iter()
            .position(|variant| matches!(variant, AvroSchema::Null))
        {
            return Ok(AvroValue::Union(position as u32, Box::new(AvroValue::Null)));
        }
    }
    for (position, variant) in union.variants().iter().enumerate() {
        if let Ok(value) = json_to_avro(variant, json) {
            return Ok(AvroValue::Union(position as u32, Box::new(value)));
        }
    }
    Err(SerializationError::SerializationFailed(format!(
        "no union variant accepts {}",
        json
    )))
}

fn record_from_json(
    record: &RecordSchema,
    json: &JsonValue,
) -> Result<AvroValue, SerializationError> {
    let entries = match json {
        JsonValue::Object(entries) => entries,
        other => return Err(mismatch("record object", other)),
    };

    let mut fields = Vec::with_capacity(record.fields.len());
    for field in &record.fields {
        let value = match entries.get(&field.name) {
            Some(value) => json_to_avro(&field.schema, value)?,
            // An absent field is legal only when the schema can hold null.
            None => json_to_avro(&field.schema, &JsonValue::Null).map_err(|_| {
                SerializationError::SerializationFailed(format!(
                    "record field '{}' is missing and not nullable",
                    field.name
                ))
            })?,
        };
        fields.push((field.name.clone(), value));
    }
    Ok(AvroValue::Record(fields))
}

fn int_from_json(json: &JsonValue) -> Result<i32, SerializationError> {
    long_from_json(json)?
        .try_into()
        .map_err(|_| SerializationError::SerializationFailed(format!("{} overflows int", json)))
}

fn long_from_json(json: &JsonValue) -> Result<i64, SerializationError> {
    json.as_i64().ok_or_else(|| mismatch("integer", json))
}

fn double_from_json(json: &JsonValue) -> Result<f64, SerializationError> {
    json.as_f64().ok_or_else(|| mismatch("number", json))
}

fn bytes_from_json(json: &JsonValue) -> Result<Vec<u8>, SerializationError> {
    match json {
        JsonValue::String(s) => Ok(s.as_bytes().to_vec()),
        JsonValue::Array(values) => values
            .iter()
            .map(|value| {
                value
                    .as_u64()
                    .filter(|byte| *byte <= u8::MAX as u64)
                    .map(|byte| byte as u8)
                    .ok_or_else(|| mismatch("byte (0..=255)", value))
            })
            .collect(),
        other => Err(mismatch("bytes (string or byte array)", other)),
    }
}

fn mismatch(expected: &str, got: &JsonValue) -> SerializationError {
    SerializationError::SerializationFailed(format!("expected {}, got {}", expected, got))
}

/// Render an Avro value as JSON.
pub fn avro_to_json(value: AvroValue) -> Result<JsonValue, SerializationError> {
    match value {
        AvroValue::Null => Ok(JsonValue::Null),
        AvroValue::Boolean(b) => Ok(JsonValue::Bool(b)),
        AvroValue::Int(i) => Ok(JsonValue::from(i)),
        AvroValue::Long(l) => Ok(JsonValue::from(l)),
        AvroValue::Float(f) => number_from_f64(f as f64),
        AvroValue::Double(d) => number_from_f64(d),
        AvroValue::Bytes(bytes) | AvroValue::Fixed(_, bytes) => Ok(JsonValue::Array(
            bytes.into_iter().map(JsonValue::from).collect(),
        )),
        AvroValue::String(s) => Ok(JsonValue::String(s)),
        AvroValue::Enum(_, symbol) => Ok(JsonValue::String(symbol)),
        AvroValue::Uuid(uuid) => Ok(JsonValue::String(uuid.hyphenated().to_string())),
        AvroValue::Union(_, inner) => avro_to_json(*inner),
        AvroValue::Array(values) => values
            .into_iter()
            .map(avro_to_json)
            .collect::<Result<Vec<_>, _>>()
            .map(JsonValue::Array),
        AvroValue::Map(entries) => {
            let mut object = JsonMap::new();
            for (key, entry) in entries {
                object.insert(key, avro_to_json(entry)?);
            }
            Ok(JsonValue::Object(object))
        }
        AvroValue::Record(fields) => {
            let mut object = JsonMap::new();
            for (name, field) in fields {
                object.insert(name, avro_to_json(field)?);
            }
            Ok(JsonValue::Object(object))
        }
        AvroValue::Date(days) => Ok(JsonValue::from(days)),
        AvroValue::TimeMillis(t) => Ok(JsonValue::from(t)),
        AvroValue::TimeMicros(t) => Ok(JsonValue::from(t)),
        AvroValue::TimestampMillis(t) => Ok(JsonValue::from(t)),
        AvroValue::TimestampMicros(t) => Ok(JsonValue::from(t)),
        AvroValue::LocalTimestampMillis(t) => Ok(JsonValue::from(t)),
        AvroValue::LocalTimestampMicros(t) => Ok(JsonValue::from(t)),
        other => Err(SerializationError::DeserializationFailed(format!(
            "unsupported Avro value kind: {:?}",
            other
        ))),
    }
}

fn number_from_f64(value: f64) -> Result<JsonValue, SerializationError> {
    Number::from_f64(value)
        .map(JsonValue::Number)
        .ok_or_else(|| {
            SerializationError::DeserializationFailed(format!(
                "{} has no JSON representation",
                value
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const RECORD_SCHEMA: &str = r#"{
        "type": "record",
        "name": "Order",
        "fields": [
            {"name": "id", "type": "long"},
            {"name": "note", "type": ["null", "string"], "default": null},
            {"name": "tags", "type": {"type": "array", "items": "string"}},
            {"name": "state", "type": {"type": "enum", "name": "State", "symbols": ["OPEN", "CLOSED"]}}
        ]
    }"#;

    fn schema() -> AvroSchema {
        AvroSchema::parse_str(RECORD_SCHEMA).unwrap()
    }

    #[test]
    fn test_record_datum_round_trip() {
        let schema = schema();
        let json = json!({"id": 7, "note": "first", "tags": ["a", "b"], "state": "OPEN"});

        let value = json_to_avro(&schema, &json).unwrap();
        let datum = to_avro_datum(&schema, value).unwrap();
        let mut reader = datum.as_slice();
        let decoded = from_avro_datum(&schema, &mut reader, None).unwrap();

        assert_eq!(avro_to_json(decoded).unwrap(), json);
    }

    #[test]
    fn test_missing_nullable_field_becomes_null() {
        let schema = schema();
        let json = json!({"id": 1, "tags": [], "state": "CLOSED"});
        let value = json_to_avro(&schema, &json).unwrap();

        match value {
            AvroValue::Record(fields) => {
                let note = &fields.iter().find(|(name, _)| name == "note").unwrap().1;
                assert!(matches!(note, AvroValue::Union(_, inner) if **inner == AvroValue::Null));
            }
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_required_field_is_an_error() {
        let schema = schema();
        let json = json!({"note": "x", "tags": [], "state": "OPEN"});
        assert!(json_to_avro(&schema, &json).is_err());
    }

    #[test]
    fn test_unknown_enum_symbol_is_an_error() {
        let schema = schema();
        let json = json!({"id": 1, "tags": [], "state": "PENDING"});
        assert!(json_to_avro(&schema, &json).is_err());
    }

    #[test]
    fn test_schema_mismatch_is_typed() {
        let schema = AvroSchema::parse_str("\"long\"").unwrap();
        match json_to_avro(&schema, &json!("not a number")) {
            Err(SerializationError::SerializationFailed(_)) => {}
            other => panic!("expected SerializationFailed, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_map_and_bytes_mapping() {
        let schema = AvroSchema::parse_str(r#"{"type": "map", "values": "int"}"#).unwrap();
        let value = json_to_avro(&schema, &json!({"a": 1, "b": 2})).unwrap();
        assert_eq!(avro_to_json(value).unwrap(), json!({"a": 1, "b": 2}));

        let schema = AvroSchema::parse_str("\"bytes\"").unwrap();
        let value = json_to_avro(&schema, &json!([1, 2, 255])).unwrap();
        assert_eq!(avro_to_json(value).unwrap(), json!([1, 2, 255]));
    }
}
