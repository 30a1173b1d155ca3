//! Cluster catalog: the declarative description of every cluster the manager
//! can serve.
//!
//! The catalog is the upstream configuration collaborator. It supplies, per
//! cluster id, the broker endpoint, the authentication method and its
//! credentials, the optional schema-registry and connect-service definitions,
//! and free-form override maps for each backend. How those definitions are
//! stored (config files, encrypted user settings, a database) is the
//! embedder's concern; [`StaticCatalog`] is the in-memory implementation used
//! by tests and simple embeddings.

use async_trait::async_trait;
use std::collections::HashMap;

/// Transport variant for SASL authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaslProtocol {
    /// SASL over plaintext
    SaslPlaintext,
    /// SASL over TLS
    SaslSsl,
}

impl SaslProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaslProtocol::SaslPlaintext => "SASL_PLAINTEXT",
            SaslProtocol::SaslSsl => "SASL_SSL",
        }
    }
}

/// SASL mechanism selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaslMechanism {
    ScramSha256,
    ScramSha512,
    Plain,
}

impl SaslMechanism {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaslMechanism::ScramSha256 => "SCRAM-SHA-256",
            SaslMechanism::ScramSha512 => "SCRAM-SHA-512",
            SaslMechanism::Plain => "PLAIN",
        }
    }
}

/// SASL authentication parameters.
///
/// Blank credentials are legal: the transport and mechanism settings are still
/// emitted, only the credential entry is omitted.
#[derive(Debug, Clone)]
pub struct SaslConfig {
    pub protocol: SaslProtocol,
    pub mechanism: SaslMechanism,
    pub username: String,
    pub password: String,
}

/// TLS key and trust material locations.
///
/// Every field is independently optional (blank means absent); a truststore
/// without a keystore is a legal, intentional configuration.
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    pub keystore_location: String,
    pub keystore_password: String,
    pub key_password: String,
    pub truststore_location: String,
    pub truststore_password: String,
}

/// Authentication method declared for a cluster or a schema registry.
///
/// Selects which authentication profile builder, if any, contributes to the
/// connection profile.
#[derive(Debug, Clone, Default)]
pub enum ClusterAuth {
    #[default]
    None,
    Basic {
        username: String,
        password: String,
    },
    Token {
        token: String,
    },
    Sasl(SaslConfig),
    Ssl(TlsConfig),
}

/// Schema registry attached to a cluster.
#[derive(Debug, Clone)]
pub struct SchemaRegistryDefinition {
    pub url: String,
    pub auth: ClusterAuth,
    /// Free-form properties merged last into the registry profile
    pub overrides: HashMap<String, String>,
}

impl SchemaRegistryDefinition {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth: ClusterAuth::None,
            overrides: HashMap::new(),
        }
    }

    pub fn auth(mut self, auth: ClusterAuth) -> Self {
        self.auth = auth;
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }
}

/// One connect-service endpoint nested under a cluster.
#[derive(Debug, Clone)]
pub struct ConnectDefinition {
    pub name: String,
    pub url: String,
    pub basic_username: String,
    pub basic_password: String,
    pub tls: TlsConfig,
}

impl ConnectDefinition {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            basic_username: String::new(),
            basic_password: String::new(),
            tls: TlsConfig::default(),
        }
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_username = username.into();
        self.basic_password = password.into();
        self
    }

    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }
}

/// Complete declarative description of one cluster.
#[derive(Debug, Clone)]
pub struct ClusterDefinition {
    pub name: String,
    pub bootstrap_servers: String,
    pub auth: ClusterAuth,
    /// Free-form properties merged last into the broker profile
    pub broker_overrides: HashMap<String, String>,
    pub schema_registry: Option<SchemaRegistryDefinition>,
    pub connects: Vec<ConnectDefinition>,
}

impl ClusterDefinition {
    pub fn new(name: impl Into<String>, bootstrap_servers: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bootstrap_servers: bootstrap_servers.into(),
            auth: ClusterAuth::None,
            broker_overrides: HashMap::new(),
            schema_registry: None,
            connects: Vec::new(),
        }
    }

    pub fn auth(mut self, auth: ClusterAuth) -> Self {
        self.auth = auth;
        self
    }

    pub fn broker_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.broker_overrides.insert(key.into(), value.into());
        self
    }

    pub fn schema_registry(mut self, registry: SchemaRegistryDefinition) -> Self {
        self.schema_registry = Some(registry);
        self
    }

    pub fn connect(mut self, connect: ConnectDefinition) -> Self {
        self.connects.push(connect);
        self
    }

    /// Look up a connect definition by instance name.
    pub fn connect_by_name(&self, name: &str) -> Option<&ConnectDefinition> {
        self.connects.iter().find(|c| c.name == name)
    }
}

/// Source of cluster definitions.
///
/// The manager never decides definedness from its own cached state; the
/// catalog is the single authority for which clusters, registries and
/// connects exist.
#[async_trait]
pub trait ClusterCatalog: Send + Sync {
    /// Resolve a cluster definition by id, or `None` if undeclared.
    async fn cluster(&self, name: &str) -> Option<ClusterDefinition>;
}

/// In-memory catalog backed by a fixed set of definitions.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    clusters: HashMap<String, ClusterDefinition>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cluster(mut self, definition: ClusterDefinition) -> Self {
        self.clusters.insert(definition.name.clone(), definition);
        self
    }
}

#[async_trait]
impl ClusterCatalog for StaticCatalog {
    async fn cluster(&self, name: &str) -> Option<ClusterDefinition> {
        self.clusters.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_pattern() {
        let definition = ClusterDefinition::new("prod", "broker1:9092,broker2:9092")
            .auth(ClusterAuth::Basic {
                username: "admin".to_string(),
                password: "secret".to_string(),
            })
            .broker_property("client.id", "console")
            .schema_registry(SchemaRegistryDefinition::new("http://registry:8081"))
            .connect(ConnectDefinition::new("cdc", "http://connect:8083"));

        assert_eq!(definition.bootstrap_servers, "broker1:9092,broker2:9092");
        assert!(definition.schema_registry.is_some());
        assert!(definition.connect_by_name("cdc").is_some());
        assert!(definition.connect_by_name("missing").is_none());
    }

    #[tokio::test]
    async fn test_static_catalog_lookup() {
        let catalog =
            StaticCatalog::new().with_cluster(ClusterDefinition::new("local", "localhost:9092"));

        assert!(catalog.cluster("local").await.is_some());
        assert!(catalog.cluster("other").await.is_none());
    }
}
