//! Low-level schema registry REST service.
//!
//! Built from a registry connection profile: the `schema.registry.` namespace
//! is stripped, the credential entries select basic or bearer authentication,
//! the SSL entries configure the TLS socket, and a blank or `none`
//! endpoint-identification setting installs the accept-any-host verifier.

use crate::fleet::error::ClusterError;
use crate::fleet::profile::{keys, ConnectionProfile, HostnameVerification};
use reqwest::{Certificate, Client, Identity};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

const CONTENT_TYPE: &str = "application/vnd.schemaregistry.v1+json";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Authentication mode resolved from the registry profile.
#[derive(Debug, Clone)]
pub enum RegistryAuth {
    None,
    Basic { username: String, password: String },
    Bearer { token: String },
}

/// Schema payload as returned by `GET /schemas/ids/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaResponse {
    pub schema: String,
    #[serde(default, rename = "schemaType")]
    pub schema_type: Option<String>,
}

/// Schema payload as returned by the subject-version endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct SubjectVersionResponse {
    pub subject: String,
    pub version: i32,
    pub id: u32,
    pub schema: String,
    #[serde(default, rename = "schemaType")]
    pub schema_type: Option<String>,
}

pub struct RegistryRestService {
    base_url: String,
    auth: RegistryAuth,
    http: Client,
}

impl RegistryRestService {
    /// Build the REST service from a namespaced registry profile.
    pub fn from_profile(profile: &ConnectionProfile) -> Result<Self, ClusterError> {
        let props = profile.strip_prefix(keys::SCHEMA_REGISTRY_PREFIX);

        let base_url = props
            .get(keys::REGISTRY_URL)
            .map(|url| url.trim_end_matches('/').to_string())
            .ok_or_else(|| {
                ClusterError::InvalidProfile("registry profile has no url entry".to_string())
            })?;

        let auth = resolve_auth(&props);

        let mut builder = Client::builder().timeout(HTTP_TIMEOUT);

        if let Some(location) = props.get(keys::SSL_TRUSTSTORE_LOCATION) {
            builder = builder.add_root_certificate(load_trust_root(location)?);
        }
        if let Some(location) = props.get(keys::SSL_KEYSTORE_LOCATION) {
            let password = props
                .get(keys::SSL_KEYSTORE_PASSWORD)
                .or_else(|| props.get(keys::SSL_KEY_PASSWORD))
                .map(|p| p.as_str())
                .unwrap_or("");
            builder = builder.identity(load_identity(location, password)?);
        }

        let verification = HostnameVerification::from_setting(
            props
                .get(keys::SSL_ENDPOINT_IDENTIFICATION_ALGORITHM)
                .map(|v| v.as_str()),
        );
        if verification.accepts_any_host() {
            log::debug!("Registry {}: hostname verification disabled", base_url);
            builder = builder.danger_accept_invalid_hostnames(true);
        }

        let http = builder.build()?;
        Ok(Self {
            base_url,
            auth,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth(&self) -> &RegistryAuth {
        &self.auth
    }

    /// List every subject in the registry.
    pub async fn subjects(&self) -> Result<Vec<String>, ClusterError> {
        self.get_json("/subjects").await
    }

    /// List all versions of a subject.
    pub async fn subject_versions(&self, subject: &str) -> Result<Vec<i32>, ClusterError> {
        self.get_json(&format!("/subjects/{}/versions", subject)).await
    }

    /// Fetch a schema by its registry id.
    pub async fn schema_by_id(&self, id: u32) -> Result<SchemaResponse, ClusterError> {
        self.get_json(&format!("/schemas/ids/{}", id)).await
    }

    /// Fetch the latest registered version of a subject.
    pub async fn latest_subject_version(
        &self,
        subject: &str,
    ) -> Result<SubjectVersionResponse, ClusterError> {
        self.get_json(&format!("/subjects/{}/versions/latest", subject))
            .await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClusterError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, CONTENT_TYPE);

        request = match &self.auth {
            RegistryAuth::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
            RegistryAuth::Bearer { token } => request.bearer_auth(token),
            RegistryAuth::None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClusterError::Rest {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }
}

fn resolve_auth(props: &std::collections::HashMap<String, String>) -> RegistryAuth {
    let source_is = |key: &str, expected: &str| {
        props
            .get(key)
            .map(|source| source == expected)
            .unwrap_or(false)
    };

    if source_is(
        keys::BASIC_AUTH_CREDENTIALS_SOURCE,
        keys::CREDENTIALS_SOURCE_USER_INFO,
    ) {
        if let Some((username, password)) = props
            .get(keys::BASIC_AUTH_USER_INFO)
            .and_then(|info| info.split_once(':'))
        {
            return RegistryAuth::Basic {
                username: username.to_string(),
                password: password.to_string(),
            };
        }
    }

    if source_is(
        keys::BEARER_AUTH_CREDENTIALS_SOURCE,
        keys::CREDENTIALS_SOURCE_STATIC_TOKEN,
    ) {
        if let Some(token) = props.get(keys::BEARER_AUTH_TOKEN) {
            return RegistryAuth::Bearer {
                token: token.clone(),
            };
        }
    }

    RegistryAuth::None
}

/// Load a trust root from a PEM bundle, falling back to DER. PKCS#12 trust
/// stores are not supported by the HTTP stack; the truststore password entry
/// is therefore never consulted here.
fn load_trust_root(location: &str) -> Result<Certificate, ClusterError> {
    let bytes = std::fs::read(location)?;
    Certificate::from_pem(&bytes)
        .or_else(|_| Certificate::from_der(&bytes))
        .map_err(|e| ClusterError::Tls(format!("unreadable trust store {}: {}", location, e)))
}

/// Load a client identity from a PKCS#12 keystore.
fn load_identity(location: &str, password: &str) -> Result<Identity, ClusterError> {
    let bytes = std::fs::read(location)?;
    Identity::from_pkcs12_der(&bytes, password)
        .map_err(|e| ClusterError::Tls(format!("unreadable key store {}: {}", location, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::config::{ClusterAuth, SchemaRegistryDefinition};
    use crate::fleet::profile::registry_profile;

    #[test]
    fn test_from_profile_resolves_basic_auth() {
        let profile = registry_profile(&SchemaRegistryDefinition::new("http://registry:8081/").auth(
            ClusterAuth::Basic {
                username: "u".to_string(),
                password: "p".to_string(),
            },
        ));
        let service = RegistryRestService::from_profile(&profile).unwrap();

        assert_eq!(service.base_url(), "http://registry:8081");
        match service.auth() {
            RegistryAuth::Basic { username, password } => {
                assert_eq!(username, "u");
                assert_eq!(password, "p");
            }
            other => panic!("expected basic auth, got {:?}", other),
        }
    }

    #[test]
    fn test_from_profile_resolves_bearer_auth() {
        let profile =
            registry_profile(&SchemaRegistryDefinition::new("http://registry:8081").auth(
                ClusterAuth::Token {
                    token: "t".to_string(),
                },
            ));
        let service = RegistryRestService::from_profile(&profile).unwrap();

        match service.auth() {
            RegistryAuth::Bearer { token } => assert_eq!(token, "t"),
            other => panic!("expected bearer auth, got {:?}", other),
        }
    }

    #[test]
    fn test_from_profile_without_url_fails() {
        let profile = ConnectionProfile::new();
        match RegistryRestService::from_profile(&profile) {
            Err(ClusterError::InvalidProfile(_)) => {}
            other => panic!("expected InvalidProfile, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_credential_marker_without_value_falls_back_to_anonymous() {
        let mut profile = ConnectionProfile::new();
        profile.set("schema.registry.url", "http://registry:8081");
        profile.set(
            "schema.registry.basic.auth.credentials.source",
            "USER_INFO",
        );
        let service = RegistryRestService::from_profile(&profile).unwrap();
        assert!(matches!(service.auth(), RegistryAuth::None));
    }
}
