//! Wire format selection.
//!
//! The five payload formats are modeled as one tagged union so adding a
//! format is a new variant plus new dispatch arms, not a type hierarchy.

use crate::fleet::registry::SchemaFormat;
use crate::fleet::serialization::primitive::PrimitiveType;
use crate::fleet::serialization::SerializationError;
use std::fmt;

/// Which half of a record a codec applies to. Drives registry subject naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadRole {
    Key,
    Value,
}

impl PayloadRole {
    pub fn from_key_flag(is_key: bool) -> Self {
        if is_key {
            PayloadRole::Key
        } else {
            PayloadRole::Value
        }
    }

    /// Topic-name subject strategy.
    pub fn subject(&self, topic: &str) -> String {
        match self {
            PayloadRole::Key => format!("{}-key", topic),
            PayloadRole::Value => format!("{}-value", topic),
        }
    }
}

/// Enumeration of supported wire formats for message payloads.
///
/// The three `Schema*` variants are governed by the cluster's schema
/// registry; `EmbeddedAvro` is the self-describing object-container format
/// with no registry dependency; `Primitive` covers the fixed set of
/// schema-less scalar codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireFormat {
    SchemaAvro,
    SchemaJson,
    SchemaProtobuf,
    EmbeddedAvro,
    Primitive(PrimitiveType),
}

impl WireFormat {
    /// The registry schema format behind this wire format, if any.
    pub fn registry_format(&self) -> Option<SchemaFormat> {
        match self {
            WireFormat::SchemaAvro => Some(SchemaFormat::Avro),
            WireFormat::SchemaJson => Some(SchemaFormat::Json),
            WireFormat::SchemaProtobuf => Some(SchemaFormat::Protobuf),
            WireFormat::EmbeddedAvro | WireFormat::Primitive(_) => None,
        }
    }
}

/// Registry interaction mode for the schema-governed codecs.
///
/// Fixed, intentionally conservative: new schemas are never auto-registered
/// and subject resolution is always pinned to the latest registered version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrySerdeConfig {
    pub auto_register_schemas: bool,
    pub use_latest_version: bool,
}

impl Default for RegistrySerdeConfig {
    fn default() -> Self {
        Self {
            auto_register_schemas: false,
            use_latest_version: true,
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireFormat::SchemaAvro => write!(f, "avro"),
            WireFormat::SchemaJson => write!(f, "json-schema"),
            WireFormat::SchemaProtobuf => write!(f, "protobuf"),
            WireFormat::EmbeddedAvro => write!(f, "embedded-avro"),
            WireFormat::Primitive(primitive) => write!(f, "{}", primitive.type_name()),
        }
    }
}

impl std::str::FromStr for WireFormat {
    type Err = SerializationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "avro" => Ok(WireFormat::SchemaAvro),
            "json-schema" | "jsonschema" => Ok(WireFormat::SchemaJson),
            "protobuf" | "proto" => Ok(WireFormat::SchemaProtobuf),
            "embedded-avro" | "avro-container" => Ok(WireFormat::EmbeddedAvro),
            other => PrimitiveType::try_lookup(other)
                .map(WireFormat::Primitive)
                .ok_or_else(|| {
                    SerializationError::SchemaError(format!(
                        "Unsupported wire format: '{}'",
                        s
                    ))
                }),
        }
    }
}
