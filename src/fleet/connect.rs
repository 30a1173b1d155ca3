//! Connect-service client.
//!
//! Built from the generic connect profile (flat `url`, optional basic-auth
//! pair, optional key/trust store entries named like the broker's SSL keys).
//! The reduction from profile entries to named client fields happens here, at
//! construction time. The trust-bypass policy mirrors the registry builder's
//! hostname check but is expressed as accepting any certificate.

use crate::fleet::error::ClusterError;
use crate::fleet::profile::{keys, ConnectionProfile, HostnameVerification};
use reqwest::{Certificate, Client, Identity};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Connector definition as reported by `GET /connectors/{name}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectorInfo {
    pub name: String,
    #[serde(default)]
    pub config: HashMap<String, String>,
    #[serde(default)]
    pub tasks: Vec<ConnectorTaskRef>,
    #[serde(rename = "type", default)]
    pub connector_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectorTaskRef {
    pub connector: String,
    pub task: i32,
}

/// Connector runtime state as reported by `GET /connectors/{name}/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectorStatus {
    pub name: String,
    pub connector: ConnectorState,
    #[serde(default)]
    pub tasks: Vec<TaskState>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectorState {
    pub state: String,
    pub worker_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskState {
    pub id: i32,
    pub state: String,
    pub worker_id: String,
    #[serde(default)]
    pub trace: Option<String>,
}

pub struct ConnectClient {
    base_url: String,
    basic_auth: Option<(String, String)>,
    http: Client,
}

impl ConnectClient {
    /// Build a connect client from a generic connect profile.
    pub fn from_profile(profile: &ConnectionProfile) -> Result<Self, ClusterError> {
        let base_url = profile
            .get(keys::CONNECT_URL)
            .map(|url| url.trim_end_matches('/').to_string())
            .ok_or_else(|| {
                ClusterError::InvalidProfile("connect profile has no url entry".to_string())
            })?;

        let basic_auth = match (
            profile.get(keys::BASIC_AUTH_USERNAME),
            profile.get(keys::BASIC_AUTH_PASSWORD),
        ) {
            (Some(username), Some(password)) => {
                Some((username.to_string(), password.to_string()))
            }
            _ => None,
        };

        let mut builder = Client::builder().timeout(HTTP_TIMEOUT);

        if let Some(location) = profile.get(keys::SSL_TRUSTSTORE_LOCATION) {
            let bytes = std::fs::read(location)?;
            let certificate = Certificate::from_pem(&bytes)
                .or_else(|_| Certificate::from_der(&bytes))
                .map_err(|e| {
                    ClusterError::Tls(format!("unreadable trust store {}: {}", location, e))
                })?;
            builder = builder.add_root_certificate(certificate);
        }
        if let Some(location) = profile.get(keys::SSL_KEYSTORE_LOCATION) {
            let password = profile
                .get(keys::SSL_KEYSTORE_PASSWORD)
                .or_else(|| profile.get(keys::SSL_KEY_PASSWORD))
                .unwrap_or("");
            let bytes = std::fs::read(location)?;
            let identity = Identity::from_pkcs12_der(&bytes, password).map_err(|e| {
                ClusterError::Tls(format!("unreadable key store {}: {}", location, e))
            })?;
            builder = builder.identity(identity);
        }

        let verification = HostnameVerification::from_setting(
            profile.get(keys::SSL_ENDPOINT_IDENTIFICATION_ALGORITHM),
        );
        if verification.accepts_any_host() {
            log::debug!(
                "Connect service {}: certificate verification disabled",
                base_url
            );
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder.build()?;
        Ok(Self {
            base_url,
            basic_auth,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_basic_auth(&self) -> bool {
        self.basic_auth.is_some()
    }

    /// List the names of every deployed connector.
    pub async fn connectors(&self) -> Result<Vec<String>, ClusterError> {
        self.get_json("/connectors").await
    }

    pub async fn connector_info(&self, name: &str) -> Result<ConnectorInfo, ClusterError> {
        self.get_json(&format!("/connectors/{}", name)).await
    }

    pub async fn connector_status(&self, name: &str) -> Result<ConnectorStatus, ClusterError> {
        self.get_json(&format!("/connectors/{}/status", name)).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClusterError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.get(&url);
        if let Some((username, password)) = &self.basic_auth {
            request = request.basic_auth(username, Some(password));
        }

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::config::ConnectDefinition;
    use crate::fleet::profile::connect_profile;

    #[test]
    fn test_from_profile_reduces_named_fields() {
        let profile = connect_profile(
            &ConnectDefinition::new("cdc", "http://connect:8083/").basic_auth("u", "p"),
        );
        let client = ConnectClient::from_profile(&profile).unwrap();

        assert_eq!(client.base_url(), "http://connect:8083");
        assert!(client.has_basic_auth());
    }

    #[test]
    fn test_from_profile_without_credentials() {
        let profile = connect_profile(&ConnectDefinition::new("cdc", "http://connect:8083"));
        let client = ConnectClient::from_profile(&profile).unwrap();
        assert!(!client.has_basic_auth());
    }

    #[test]
    fn test_from_profile_without_url_fails() {
        match ConnectClient::from_profile(&ConnectionProfile::new()) {
            Err(ClusterError::InvalidProfile(_)) => {}
            other => panic!("expected InvalidProfile, got {:?}", other.map(|_| ())),
        }
    }
}
