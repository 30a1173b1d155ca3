//! Error types for serialization

use crate::fleet::error::ClusterError;

/// Serialization error type
#[derive(Debug)]
pub enum SerializationError {
    SerializationFailed(String),
    DeserializationFailed(String),
    SchemaError(String),
    UnsupportedOperation(String),
    /// Registry lookup failed while resolving a schema
    Registry(ClusterError),
}

impl SerializationError {
    pub fn serialize_error(context: &str, err: impl std::fmt::Display) -> Self {
        SerializationError::SerializationFailed(format!("{}: {}", context, err))
    }

    pub fn deserialize_error(context: &str, err: impl std::fmt::Display) -> Self {
        SerializationError::DeserializationFailed(format!("{}: {}", context, err))
    }

    pub fn schema_error(context: &str, err: impl std::fmt::Display) -> Self {
        SerializationError::SchemaError(format!("{}: {}", context, err))
    }
}

impl std::fmt::Display for SerializationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SerializationError::SerializationFailed(msg) => {
                write!(f, "Serialization failed: {}", msg)
            }
            SerializationError::DeserializationFailed(msg) => {
                write!(f, "Deserialization failed: {}", msg)
            }
            SerializationError::SchemaError(msg) => {
                write!(f, "Schema error: {}", msg)
            }
            SerializationError::UnsupportedOperation(msg) => {
                write!(f, "Unsupported operation: {}", msg)
            }
            SerializationError::Registry(err) => {
                write!(f, "Registry error: {}", err)
            }
        }
    }
}

impl std::error::Error for SerializationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SerializationError::Registry(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ClusterError> for SerializationError {
    fn from(err: ClusterError) -> Self {
        SerializationError::Registry(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SerializationError::UnsupportedOperation(
            "container payloads cannot be serialized".to_string(),
        );
        assert_eq!(
            err.to_string(),
            "Unsupported operation: container payloads cannot be serialized"
        );
    }

    #[test]
    fn test_helper_constructors() {
        let err = SerializationError::deserialize_error("bad datum", "unexpected end");
        assert!(err.to_string().contains("bad datum"));
        assert!(err.to_string().contains("unexpected end"));
    }
}
