//! Registry-governed Protobuf codec.
//!
//! No descriptor-compiling toolchain is available at runtime, so the codec
//! transcodes generically between the protobuf wire format and
//! field-number-keyed JSON: `{"1": "order-1", "2": 42}` maps to fields 1 and
//! 2 of the message. Varint fields wider than `i64::MAX` are rendered as
//! two's-complement signed values, matching how negative `int64` fields are
//! put on the wire.

use crate::fleet::registry::{SchemaFormat, SchemaRegistryClient};
use crate::fleet::serialization::format::{PayloadRole, RegistrySerdeConfig};
use crate::fleet::serialization::wire;
use crate::fleet::serialization::SerializationError;
use serde_json::{Map as JsonMap, Number, Value as JsonValue};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Nesting bound for generic decoding; deeper payloads are almost certainly
/// misinterpreted binary data.
const MAX_NESTING: usize = 16;

const WIRE_VARINT: u64 = 0;
const WIRE_FIXED64: u64 = 1;
const WIRE_LENGTH_DELIMITED: u64 = 2;
const WIRE_FIXED32: u64 = 5;

pub struct ProtobufSerde {
    registry: Arc<SchemaRegistryClient>,
    role: PayloadRole,
    config: RegistrySerdeConfig,
}

impl ProtobufSerde {
    pub fn new(registry: Arc<SchemaRegistryClient>, role: PayloadRole) -> Self {
        Self {
            registry,
            role,
            config: RegistrySerdeConfig::default(),
        }
    }

    /// The fixed conservative registry mode this serde runs in.
    pub fn config(&self) -> RegistrySerdeConfig {
        self.config
    }

    pub async fn serialize(&self, topic: &str, text: &str) -> Result<Vec<u8>, SerializationError> {
        let json: JsonValue = serde_json::from_str(text)
            .map_err(|e| SerializationError::serialize_error("payload is not valid JSON", e))?;
        let object = json.as_object().ok_or_else(|| {
            SerializationError::SerializationFailed(
                "protobuf payload must be a field-number-keyed JSON object".to_string(),
            )
        })?;

        let subject = self.role.subject(topic);
        let registered = self.registry.latest_schema(&subject).await?;
        if registered.format != SchemaFormat::Protobuf {
            return Err(SerializationError::SchemaError(format!(
                "subject {} holds {}, not PROTOBUF",
                subject,
                registered.format.as_str()
            )));
        }

        let message = encode_message(object)?;
        let mut body = Vec::with_capacity(1 + message.len());
        wire::encode_default_message_indexes(&mut body);
        body.extend_from_slice(&message);
        Ok(wire::encode_frame(registered.id, &body))
    }

    pub async fn deserialize(&self, bytes: &[u8]) -> Result<String, SerializationError> {
        let (schema_id, body) = wire::decode_frame(bytes)?;
        let registered = self.registry.schema_by_id(schema_id).await?;
        if registered.format != SchemaFormat::Protobuf {
            return Err(SerializationError::SchemaError(format!(
                "schema {} is {}, not PROTOBUF",
                schema_id,
                registered.format.as_str()
            )));
        }

        let message = wire::skip_message_indexes(body)?;
        let json = decode_message(message, 0)?;
        serde_json::to_string(&json)
            .map_err(|e| SerializationError::deserialize_error("JSON rendering failed", e))
    }

    /// Nothing beyond the registry handle is held; kept for cache-lifecycle
    /// symmetry with the other registry serdes.
    pub async fn close(&self) {}
}

/// Decode one message body into a field-number-keyed JSON object.
pub fn decode_message(mut buf: &[u8], depth: usize) -> Result<JsonValue, SerializationError> {
    if depth > MAX_NESTING {
        return Err(SerializationError::DeserializationFailed(
            "message nesting exceeds decoder bound".to_string(),
        ));
    }

    let mut fields: BTreeMap<u64, Vec<JsonValue>> = BTreeMap::new();
    while !buf.is_empty() {
        let key = wire::read_varint(&mut buf)?;
        let field = key >> 3;
        if field == 0 {
            return Err(SerializationError::DeserializationFailed(
                "field number 0 is not valid".to_string(),
            ));
        }

        let value = match key & 7 {
            WIRE_VARINT => varint_to_json(wire::read_varint(&mut buf)?),
            WIRE_FIXED64 => {
                let bytes = take(&mut buf, 8)?;
                let raw = u64::from_le_bytes([
                    bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
                ]);
                let float = f64::from_bits(raw);
                if float.is_finite() {
                    Number::from_f64(float)
                        .map(JsonValue::Number)
                        .unwrap_or_else(|| JsonValue::from(raw))
                } else {
                    JsonValue::from(raw)
                }
            }
            WIRE_FIXED32 => {
                let bytes = take(&mut buf, 4)?;
                let raw = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                let float = f32::from_bits(raw);
                if float.is_finite() {
                    Number::from_f64(float as f64)
                        .map(JsonValue::Number)
                        .unwrap_or_else(|| JsonValue::from(raw))
                } else {
                    JsonValue::from(raw)
                }
            }
            WIRE_LENGTH_DELIMITED => {
                let length = wire::read_varint(&mut buf)? as usize;
                let bytes = take(&mut buf, length)?;
                decode_length_delimited(bytes, depth)?
            }
            other => {
                return Err(SerializationError::DeserializationFailed(format!(
                    "unsupported wire type {}",
                    other
                )))
            }
        };
        fields.entry(field).or_default().push(value);
    }

    let mut object = JsonMap::new();
    for (field, mut values) in fields {
        let value = if values.len() == 1 {
            values.remove(0)
        } else {
            JsonValue::Array(values)
        };
        object.insert(field.to_string(), value);
    }
    Ok(JsonValue::Object(object))
}

/// Encode a field-number-keyed JSON object into a message body.
pub fn encode_message(object: &JsonMap<String, JsonValue>) -> Result<Vec<u8>, SerializationError> {
    let mut buf = Vec::new();
    for (key, value) in object {
        let field: u64 = key.parse().map_err(|_| {
            SerializationError::SerializationFailed(format!(
                "field keys must be numeric, got '{}'",
                key
            ))
        })?;
        if field == 0 {
            return Err(SerializationError::SerializationFailed(
                "field number 0 is not valid".to_string(),
            ));
        }
        encode_field(field, value, &mut buf)?;
    }
    Ok(buf)
}

fn encode_field(
    field: u64,
    value: &JsonValue,
    buf: &mut Vec<u8>,
) -> Result<(), SerializationError> {
    match value {
        JsonValue::Null => Ok(()),
        JsonValue::Bool(b) => {
            wire::write_varint(field << 3 | WIRE_VARINT, buf);
            wire::write_varint(*b as u64, buf);
            Ok(())
        }
        JsonValue::Number(number) => {
            if let Some(signed) = number.as_i64() {
                wire::write_varint(field << 3 | WIRE_VARINT, buf);
                wire::write_varint(signed as u64, buf);
            } else if let Some(unsigned) = number.as_u64() {
                wire::write_varint(field << 3 | WIRE_VARINT, buf);
                wire::write_varint(unsigned, buf);
            } else {
                let float = number.as_f64().unwrap_or_default();
                wire::write_varint(field << 3 | WIRE_FIXED64, buf);
                buf.extend_from_slice(&float.to_bits().to_le_bytes());
            }
            Ok(())
        }
        JsonValue::String(text) => {
            wire::write_varint(field << 3 | WIRE_LENGTH_DELIMITED, buf);
            wire::write_varint(text.len() as u64, buf);
            buf.extend_from_slice(text.as_bytes());
            Ok(())
        }
        JsonValue::Object(nested) => {
            let body = encode_message(nested)?;
            wire::write_varint(field << 3 | WIRE_LENGTH_DELIMITED, buf);
            wire::write_varint(body.len() as u64, buf);
            buf.extend_from_slice(&body);
            Ok(())
        }
        JsonValue::Array(values) => {
            for element in values {
                if element.is_array() {
                    return Err(SerializationError::SerializationFailed(
                        "nested arrays have no protobuf wire form".to_string(),
                    ));
                }
                encode_field(field, element, buf)?;
            }
            Ok(())
        }
    }
}

fn varint_to_json(raw: u64) -> JsonValue {
    if raw > i64::MAX as u64 {
        // Two's-complement reinterpretation: this is how negative int64
        // fields arrive on the wire.
        JsonValue::from(raw as i64)
    } else {
        JsonValue::from(raw)
    }
}

fn decode_length_delimited(bytes: &[u8], depth: usize) -> Result<JsonValue, SerializationError> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        if text.chars().all(|c| !c.is_control() || c == '\n' || c == '\t' || c == '\r') {
            return Ok(JsonValue::String(text.to_string()));
        }
    }
    if !bytes.is_empty() {
        if let Ok(nested) = decode_message(bytes, depth + 1) {
            return Ok(nested);
        }
    }
    Ok(JsonValue::String(format!("0x{}", hex::encode(bytes))))
}

fn take<'a>(buf: &mut &'a [u8], count: usize) -> Result<&'a [u8], SerializationError> {
    if buf.len() < count {
        return Err(SerializationError::DeserializationFailed(format!(
            "need {} bytes, have {}",
            count,
            buf.len()
        )));
    }
    let (head, tail) = buf.split_at(count);
    *buf = tail;
    Ok(head)
}
