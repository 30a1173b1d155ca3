//! Registry-governed JSON Schema codec.
//!
//! Payloads are unstructured JSON containers with no intrinsic schema, so the
//! serializer's subject-naming step takes an explicit schema object from the
//! caller instead of deriving one from the payload type. The wire form is the
//! registry frame followed by the JSON document bytes.

use crate::fleet::registry::{SchemaFormat, SchemaRegistryClient};
use crate::fleet::serialization::format::{PayloadRole, RegistrySerdeConfig};
use crate::fleet::serialization::wire;
use crate::fleet::serialization::SerializationError;
use serde_json::Value as JsonValue;
use std::sync::Arc;

pub struct JsonSchemaSerde {
    registry: Arc<SchemaRegistryClient>,
    role: PayloadRole,
    config: RegistrySerdeConfig,
    /// Explicit schema object; required for serialization, unused on the
    /// deserialization path.
    schema: Option<JsonValue>,
}

impl JsonSchemaSerde {
    pub fn new(registry: Arc<SchemaRegistryClient>, role: PayloadRole) -> Self {
        Self {
            registry,
            role,
            config: RegistrySerdeConfig::default(),
            schema: None,
        }
    }

    pub fn with_schema(mut self, schema: JsonValue) -> Self {
        self.schema = Some(schema);
        self
    }

    /// The fixed conservative registry mode this serde runs in.
    pub fn config(&self) -> RegistrySerdeConfig {
        self.config
    }

    pub async fn serialize(&self, topic: &str, text: &str) -> Result<Vec<u8>, SerializationError> {
        let schema = self.schema.as_ref().ok_or_else(|| {
            SerializationError::SchemaError(
                "JSON Schema serialization requires an explicit schema object".to_string(),
            )
        })?;

        let payload: JsonValue = serde_json::from_str(text)
            .map_err(|e| SerializationError::serialize_error("payload is not valid JSON", e))?;
        check_container_shape(schema, &payload)?;

        // Subject naming consumes the explicit schema, never the payload type.
        let subject = self.role.subject(topic);
        let registered = self.registry.latest_schema(&subject).await?;
        if registered.format != SchemaFormat::Json {
            return Err(SerializationError::SchemaError(format!(
                "subject {} holds {}, not JSON",
                subject,
                registered.format.as_str()
            )));
        }

        let body = serde_json::to_vec(&payload)
            .map_err(|e| SerializationError::serialize_error("JSON rendering failed", e))?;
        Ok(wire::encode_frame(registered.id, &body))
    }

    pub async fn deserialize(&self, bytes: &[u8]) -> Result<String, SerializationError> {
        let (schema_id, body) = wire::decode_frame(bytes)?;
        // Resolving the id keeps the not-found path typed and warms the
        // identifier cache; the document itself carries all the structure.
        let registered = self.registry.schema_by_id(schema_id).await?;
        if registered.format != SchemaFormat::Json {
            return Err(SerializationError::SchemaError(format!(
                "schema {} is {}, not JSON",
                schema_id,
                registered.format.as_str()
            )));
        }

        let payload: JsonValue = serde_json::from_slice(body)
            .map_err(|e| SerializationError::deserialize_error("payload is not valid JSON", e))?;
        serde_json::to_string(&payload)
            .map_err(|e| SerializationError::deserialize_error("JSON rendering failed", e))
    }

    /// Nothing beyond the registry handle is held; kept for cache-lifecycle
    /// symmetry with the other registry serdes.
    pub async fn close(&self) {}
}

/// Cheap structural check of the payload against the explicit schema's
/// declared root type.
fn check_container_shape(
    schema: &JsonValue,
    payload: &JsonValue,
) -> Result<(), SerializationError> {
    let declared = match schema.get("type").and_then(JsonValue::as_str) {
        Some(declared) => declared,
        None => return Ok(()),
    };
    let matches = match declared {
        "object" => payload.is_object(),
        "array" => payload.is_array(),
        "string" => payload.is_string(),
        "number" => payload.is_number(),
        "integer" => payload.as_i64().is_some() || payload.as_u64().is_some(),
        "boolean" => payload.is_boolean(),
        "null" => payload.is_null(),
        _ => true,
    };
    if matches {
        Ok(())
    } else {
        Err(SerializationError::SerializationFailed(format!(
            "payload does not match declared root type '{}'",
            declared
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_container_shape_check() {
        let schema = json!({"type": "object", "properties": {}});
        assert!(check_container_shape(&schema, &json!({"a": 1})).is_ok());
        assert!(check_container_shape(&schema, &json!([1, 2])).is_err());

        // A schema without a declared root type accepts anything.
        assert!(check_container_shape(&json!({}), &json!([1])).is_ok());
    }
}
