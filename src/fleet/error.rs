use rdkafka::error::KafkaError;

/// Unified error type for resource-manager operations.
///
/// Construction failures from the underlying protocol clients (rdkafka,
/// reqwest) are wrapped unmodified and surfaced to the caller; this layer
/// performs no retries and no backoff.
#[derive(Debug)]
pub enum ClusterError {
    /// The requested cluster id is not present in the catalog
    UnknownCluster(String),
    /// The requested connect instance is not declared for the cluster
    UnknownConnect { cluster: String, connect: String },
    /// The cluster has no schema registry declared
    RegistryNotDefined(String),
    /// A connection profile is missing a required entry or carries an
    /// unusable value
    InvalidProfile(String),
    /// The registry has no schema under the requested id or subject
    SchemaNotFound(String),
    /// The registry returned a schema the matching format provider rejects
    Schema(String),
    /// Underlying Kafka client library error
    Kafka(KafkaError),
    /// Underlying HTTP client error (registry or connect backends)
    Http(reqwest::Error),
    /// Non-success HTTP status from the registry or connect backend
    Rest { status: u16, body: String },
    /// TLS material could not be loaded or applied
    Tls(String),
    /// Key or trust store file could not be read
    Io(std::io::Error),
    /// Operation on a handle that was already closed
    ClientClosed,
}

impl std::fmt::Display for ClusterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterError::UnknownCluster(name) => write!(f, "Unknown cluster: {}", name),
            ClusterError::UnknownConnect { cluster, connect } => {
                write!(f, "Unknown connect '{}' on cluster '{}'", connect, cluster)
            }
            ClusterError::RegistryNotDefined(name) => {
                write!(f, "No schema registry defined for cluster: {}", name)
            }
            ClusterError::InvalidProfile(msg) => write!(f, "Invalid connection profile: {}", msg),
            ClusterError::SchemaNotFound(what) => write!(f, "Schema not found: {}", what),
            ClusterError::Schema(msg) => write!(f, "Schema error: {}", msg),
            ClusterError::Kafka(e) => write!(f, "Kafka error: {}", e),
            ClusterError::Http(e) => write!(f, "HTTP error: {}", e),
            ClusterError::Rest { status, body } => {
                write!(f, "Request failed with status {}: {}", status, body)
            }
            ClusterError::Tls(msg) => write!(f, "TLS configuration error: {}", msg),
            ClusterError::Io(e) => write!(f, "I/O error: {}", e),
            ClusterError::ClientClosed => write!(f, "Client handle is closed"),
        }
    }
}

impl std::error::Error for ClusterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClusterError::Kafka(e) => Some(e),
            ClusterError::Http(e) => Some(e),
            ClusterError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<KafkaError> for ClusterError {
    fn from(err: KafkaError) -> Self {
        ClusterError::Kafka(err)
    }
}

impl From<reqwest::Error> for ClusterError {
    fn from(err: reqwest::Error) -> Self {
        ClusterError::Http(err)
    }
}

impl From<std::io::Error> for ClusterError {
    fn from(err: std::io::Error) -> Self {
        ClusterError::Io(err)
    }
}
