//! Connection profiles and the per-backend assemblers that build them.
//!
//! A [`ConnectionProfile`] is a flat property map with replace-per-key merge
//! semantics: the endpoint entry is applied first, then the entries of the
//! matching authentication builder, then the caller's free-form overrides, so
//! a later entry always wins. Keys are namespaced under
//! [`keys::SCHEMA_REGISTRY_PREFIX`] for the schema registry backend only.

use crate::fleet::auth;
use crate::fleet::config::{ClusterAuth, ClusterDefinition, ConnectDefinition, SchemaRegistryDefinition};
use rdkafka::config::ClientConfig;
use std::collections::HashMap;

/// The configuration key surface. These strings are the interoperability
/// contract with the underlying protocol client libraries and must not drift.
pub mod keys {
    pub const BOOTSTRAP_SERVERS: &str = "bootstrap.servers";
    pub const SECURITY_PROTOCOL: &str = "security.protocol";
    pub const SASL_MECHANISM: &str = "sasl.mechanism";
    pub const SASL_JAAS_CONFIG: &str = "sasl.jaas.config";
    pub const GROUP_ID: &str = "group.id";

    pub const SSL_KEYSTORE_LOCATION: &str = "ssl.keystore.location";
    pub const SSL_KEYSTORE_PASSWORD: &str = "ssl.keystore.password";
    pub const SSL_KEY_PASSWORD: &str = "ssl.key.password";
    pub const SSL_TRUSTSTORE_LOCATION: &str = "ssl.truststore.location";
    pub const SSL_TRUSTSTORE_PASSWORD: &str = "ssl.truststore.password";
    pub const SSL_ENDPOINT_IDENTIFICATION_ALGORITHM: &str =
        "ssl.endpoint.identification.algorithm";

    pub const BASIC_AUTH_USERNAME: &str = "basic.username";
    pub const BASIC_AUTH_PASSWORD: &str = "basic.password";
    pub const BEARER_AUTH_TOKEN: &str = "bearer.auth.token";

    /// Namespace prefix for every schema-registry entry.
    pub const SCHEMA_REGISTRY_PREFIX: &str = "schema.registry.";
    /// Endpoint suffix under the registry prefix.
    pub const REGISTRY_URL: &str = "url";
    pub const BASIC_AUTH_CREDENTIALS_SOURCE: &str = "basic.auth.credentials.source";
    pub const BASIC_AUTH_USER_INFO: &str = "basic.auth.user.info";
    pub const BEARER_AUTH_CREDENTIALS_SOURCE: &str = "bearer.auth.credentials.source";
    pub const MISSING_CACHE_SIZE: &str = "missing.cache.size";
    pub const MISSING_ID_CACHE_TTL_MS: &str = "missing.id.cache.ttl.ms";
    pub const MISSING_SCHEMA_CACHE_TTL_MS: &str = "missing.schema.cache.ttl.ms";

    pub const CREDENTIALS_SOURCE_USER_INFO: &str = "USER_INFO";
    pub const CREDENTIALS_SOURCE_STATIC_TOKEN: &str = "STATIC_TOKEN";

    /// Connect-service endpoint key in the generic connect profile.
    pub const CONNECT_URL: &str = "url";
}

/// Default capacity of the registry's missing-schema-id cache.
pub const MISSING_CACHE_DEFAULT_SIZE: usize = 256;
/// Default TTL for negative missing-id cache entries.
pub const MISSING_ID_CACHE_DEFAULT_TTL_MS: u64 = 60_000;
/// Default TTL for negative missing-schema cache entries.
pub const MISSING_SCHEMA_CACHE_DEFAULT_TTL_MS: u64 = 60_000;

/// A flat, ordered configuration map for one backend of one cluster.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionProfile {
    entries: HashMap<String, String>,
}

impl ConnectionProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one entry, replacing any previous value for the key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|v| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    /// Merge a property map; incoming entries replace existing ones per key.
    pub fn merge(&mut self, properties: HashMap<String, String>) -> &mut Self {
        self.entries.extend(properties);
        self
    }

    /// Merge a property map with every key re-prefixed.
    pub fn merge_prefixed(
        &mut self,
        properties: HashMap<String, String>,
        prefix: &str,
    ) -> &mut Self {
        for (key, value) in properties {
            self.entries.insert(format!("{}{}", prefix, key), value);
        }
        self
    }

    /// Entries whose keys start with `prefix`, with the prefix stripped.
    /// Entries outside the namespace are dropped.
    pub fn strip_prefix(&self, prefix: &str) -> HashMap<String, String> {
        self.entries
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(prefix)
                    .map(|stripped| (stripped.to_string(), value.clone()))
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hand every entry verbatim to an rdkafka client configuration.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        for (key, value) in &self.entries {
            config.set(key, value);
        }
        config
    }
}

impl From<HashMap<String, String>> for ConnectionProfile {
    fn from(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }
}

/// Hostname verification policy derived from the endpoint-identification
/// setting. `AcceptAnyHost` is the trust-bypass knob for self-signed lab
/// deployments: it is selected explicitly by a blank value or the literal
/// `none` (any case), never reached as an implicit default of the TLS stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostnameVerification {
    Standard,
    AcceptAnyHost,
}

impl HostnameVerification {
    pub fn from_setting(algorithm: Option<&str>) -> Self {
        let disabled = match algorithm {
            None => true,
            Some(value) => value.trim().is_empty() || value.trim().eq_ignore_ascii_case("none"),
        };
        if disabled {
            HostnameVerification::AcceptAnyHost
        } else {
            HostnameVerification::Standard
        }
    }

    pub fn accepts_any_host(&self) -> bool {
        matches!(self, HostnameVerification::AcceptAnyHost)
    }
}

/// Assemble the broker connection profile for a cluster: endpoint, then the
/// SASL or SSL authentication profile when declared, then overrides.
pub fn broker_profile(definition: &ClusterDefinition) -> ConnectionProfile {
    let mut profile = ConnectionProfile::new();
    profile.set(keys::BOOTSTRAP_SERVERS, definition.bootstrap_servers.as_str());

    match &definition.auth {
        ClusterAuth::Sasl(sasl) => {
            profile.merge(auth::sasl_properties(sasl));
        }
        ClusterAuth::Ssl(tls) => {
            profile.merge(auth::ssl_properties(tls));
        }
        ClusterAuth::None | ClusterAuth::Basic { .. } | ClusterAuth::Token { .. } => {}
    }

    profile.merge(definition.broker_overrides.clone());
    profile
}

/// Assemble the schema-registry connection profile: namespaced endpoint,
/// credentials, the three cache-tuning defaults, then overrides (so overrides
/// may still change the defaults).
pub fn registry_profile(definition: &SchemaRegistryDefinition) -> ConnectionProfile {
    let prefix = keys::SCHEMA_REGISTRY_PREFIX;
    let mut profile = ConnectionProfile::new();
    profile.set(
        format!("{}{}", prefix, keys::REGISTRY_URL),
        definition.url.as_str(),
    );

    match &definition.auth {
        ClusterAuth::Basic { username, password } => {
            if !username.trim().is_empty() && !password.trim().is_empty() {
                profile.set(
                    format!("{}{}", prefix, keys::BASIC_AUTH_CREDENTIALS_SOURCE),
                    keys::CREDENTIALS_SOURCE_USER_INFO,
                );
                profile.set(
                    format!("{}{}", prefix, keys::BASIC_AUTH_USER_INFO),
                    format!("{}:{}", username, password),
                );
            }
        }
        ClusterAuth::Token { token } => {
            let token_props = auth::token_properties(token);
            if !token_props.is_empty() {
                profile.set(
                    format!("{}{}", prefix, keys::BEARER_AUTH_CREDENTIALS_SOURCE),
                    keys::CREDENTIALS_SOURCE_STATIC_TOKEN,
                );
                profile.merge_prefixed(token_props, prefix);
            }
        }
        ClusterAuth::Ssl(tls) => {
            profile.merge_prefixed(auth::ssl_properties(tls), prefix);
        }
        ClusterAuth::None | ClusterAuth::Sasl(_) => {}
    }

    profile.set(
        format!("{}{}", prefix, keys::MISSING_CACHE_SIZE),
        MISSING_CACHE_DEFAULT_SIZE.to_string(),
    );
    profile.set(
        format!("{}{}", prefix, keys::MISSING_ID_CACHE_TTL_MS),
        MISSING_ID_CACHE_DEFAULT_TTL_MS.to_string(),
    );
    profile.set(
        format!("{}{}", prefix, keys::MISSING_SCHEMA_CACHE_TTL_MS),
        MISSING_SCHEMA_CACHE_DEFAULT_TTL_MS.to_string(),
    );

    profile.merge(definition.overrides.clone());
    profile
}

/// Assemble the generic connect-service profile: flat `url`, the optional
/// basic-auth pair, and the broker-named SSL key/trust store entries. The
/// reduction to named client fields happens at construction time in
/// `create_connect_client`, not here.
pub fn connect_profile(definition: &ConnectDefinition) -> ConnectionProfile {
    let mut profile = ConnectionProfile::new();
    profile.set(keys::CONNECT_URL, definition.url.as_str());
    profile.merge(auth::basic_properties(
        &definition.basic_username,
        &definition.basic_password,
    ));

    let tls = &definition.tls;
    let optional = [
        (keys::SSL_KEYSTORE_LOCATION, &tls.keystore_location),
        (keys::SSL_KEYSTORE_PASSWORD, &tls.keystore_password),
        (keys::SSL_KEY_PASSWORD, &tls.key_password),
        (keys::SSL_TRUSTSTORE_LOCATION, &tls.truststore_location),
        (keys::SSL_TRUSTSTORE_PASSWORD, &tls.truststore_password),
    ];
    for (key, value) in optional {
        if !value.trim().is_empty() {
            profile.set(key, value.as_str());
        }
    }

    profile
}
