//! Schema-less primitive codecs.
//!
//! A fixed set of scalar wire types with no registry dependency, selected
//! from a static lookup by declared type name. Each codec converts between
//! the GUI's text form and the big-endian wire form. Looking up an undeclared
//! type name is a programming error and fails loudly; use
//! [`PrimitiveType::try_lookup`] when the name comes from user input.

use crate::fleet::serialization::SerializationError;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Text,
    Bytes,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Uuid,
}

/// The declared type names the static lookup recognizes.
const LOOKUP: &[(&str, PrimitiveType)] = &[
    ("string", PrimitiveType::Text),
    ("bytes", PrimitiveType::Bytes),
    ("int16", PrimitiveType::Int16),
    ("int32", PrimitiveType::Int32),
    ("int64", PrimitiveType::Int64),
    ("float32", PrimitiveType::Float32),
    ("float64", PrimitiveType::Float64),
    ("uuid", PrimitiveType::Uuid),
];

impl PrimitiveType {
    /// Static lookup by declared type name.
    ///
    /// # Panics
    ///
    /// Panics on an undeclared type name: that is a caller programming error,
    /// not a runtime condition, and must not produce a silent null codec.
    pub fn lookup(type_name: &str) -> PrimitiveType {
        match Self::try_lookup(type_name) {
            Some(primitive) => primitive,
            None => panic!("undeclared primitive wire type: {}", type_name),
        }
    }

    /// Fallible lookup for names that originate outside the program.
    pub fn try_lookup(type_name: &str) -> Option<PrimitiveType> {
        LOOKUP
            .iter()
            .find(|(name, _)| *name == type_name)
            .map(|(_, primitive)| *primitive)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            PrimitiveType::Text => "string",
            PrimitiveType::Bytes => "bytes",
            PrimitiveType::Int16 => "int16",
            PrimitiveType::Int32 => "int32",
            PrimitiveType::Int64 => "int64",
            PrimitiveType::Float32 => "float32",
            PrimitiveType::Float64 => "float64",
            PrimitiveType::Uuid => "uuid",
        }
    }

    pub fn codec(&self) -> PrimitiveCodec {
        PrimitiveCodec { primitive: *self }
    }
}

/// Stateless paired serializer/deserializer for one primitive type.
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveCodec {
    primitive: PrimitiveType,
}

impl PrimitiveCodec {
    pub fn primitive(&self) -> PrimitiveType {
        self.primitive
    }

    /// Encode the text form to wire bytes.
    pub fn serialize(&self, text: &str) -> Result<Vec<u8>, SerializationError> {
        match self.primitive {
            PrimitiveType::Text => Ok(text.as_bytes().to_vec()),
            PrimitiveType::Bytes => hex::decode(text.trim().trim_start_matches("0x"))
                .map_err(|e| SerializationError::serialize_error("invalid hex input", e)),
            PrimitiveType::Int16 => parse_number::<i16>(text).map(|v| v.to_be_bytes().to_vec()),
            PrimitiveType::Int32 => parse_number::<i32>(text).map(|v| v.to_be_bytes().to_vec()),
            PrimitiveType::Int64 => parse_number::<i64>(text).map(|v| v.to_be_bytes().to_vec()),
            PrimitiveType::Float32 => parse_number::<f32>(text).map(|v| v.to_be_bytes().to_vec()),
            PrimitiveType::Float64 => parse_number::<f64>(text).map(|v| v.to_be_bytes().to_vec()),
            PrimitiveType::Uuid => Uuid::parse_str(text.trim())
                .map(|uuid| uuid.as_bytes().to_vec())
                .map_err(|e| SerializationError::serialize_error("invalid uuid", e)),
        }
    }

    /// Decode wire bytes to the text form.
    pub fn deserialize(&self, bytes: &[u8]) -> Result<String, SerializationError> {
        match self.primitive {
            PrimitiveType::Text => String::from_utf8(bytes.to_vec())
                .map_err(|e| SerializationError::deserialize_error("invalid UTF-8", e)),
            PrimitiveType::Bytes => Ok(hex::encode(bytes)),
            PrimitiveType::Int16 => {
                fixed_bytes::<2>(self.primitive, bytes).map(|b| i16::from_be_bytes(b).to_string())
            }
            PrimitiveType::Int32 => {
                fixed_bytes::<4>(self.primitive, bytes).map(|b| i32::from_be_bytes(b).to_string())
            }
            PrimitiveType::Int64 => {
                fixed_bytes::<8>(self.primitive, bytes).map(|b| i64::from_be_bytes(b).to_string())
            }
            PrimitiveType::Float32 => {
                fixed_bytes::<4>(self.primitive, bytes).map(|b| f32::from_be_bytes(b).to_string())
            }
            PrimitiveType::Float64 => {
                fixed_bytes::<8>(self.primitive, bytes).map(|b| f64::from_be_bytes(b).to_string())
            }
            PrimitiveType::Uuid => fixed_bytes::<16>(self.primitive, bytes)
                .map(|b| Uuid::from_bytes(b).hyphenated().to_string()),
        }
    }
}

fn parse_number<T>(text: &str) -> Result<T, SerializationError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    text.trim()
        .parse::<T>()
        .map_err(|e| SerializationError::serialize_error("invalid number", e))
}

fn fixed_bytes<const N: usize>(
    primitive: PrimitiveType,
    bytes: &[u8],
) -> Result<[u8; N], SerializationError> {
    bytes.try_into().map_err(|_| {
        SerializationError::DeserializationFailed(format!(
            "{} payload must be {} bytes, got {}",
            primitive.type_name(),
            N,
            bytes.len()
        ))
    })
}
