//! Message payload serialization.
//!
//! Five wire formats behind one dispatch surface: three registry-governed
//! encodings (Avro, JSON Schema, Protobuf with Confluent framing), the
//! self-describing Avro container format, and the schema-less primitive
//! codecs. See [`factory::SerdeFactory`] for the per-cluster entry point.

pub mod avro;
pub mod container;
pub mod error;
pub mod factory;
pub mod format;
pub mod json_schema;
pub mod primitive;
pub mod protobuf;
pub mod wire;

pub use error::SerializationError;
pub use factory::{MessageDeserializer, MessageSerializer, SerdeFactory};
pub use format::{PayloadRole, RegistrySerdeConfig, WireFormat};
pub use primitive::{PrimitiveCodec, PrimitiveType};
