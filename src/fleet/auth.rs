//! Authentication profile builders.
//!
//! One pure builder per authentication method. Each returns the flat property
//! entries that method contributes to a connection profile. The builders never
//! fail: a blank optional input means the corresponding entry is omitted, so
//! callers must not assume any key exists.

use crate::fleet::config::{SaslConfig, SaslMechanism, TlsConfig};
use crate::fleet::profile::keys;
use std::collections::HashMap;

/// JAAS login-module template for the PLAIN mechanism. Username and password
/// are embedded verbatim; credentials containing `"` or `;` will corrupt the
/// entry.
const PLAIN_JAAS_TEMPLATE: &str =
    "org.apache.kafka.common.security.plain.PlainLoginModule required username=\"{USERNAME}\" password=\"{PASSWORD}\";";

/// JAAS login-module template shared by both SCRAM mechanisms.
const SCRAM_JAAS_TEMPLATE: &str =
    "org.apache.kafka.common.security.scram.ScramLoginModule required username=\"{USERNAME}\" password=\"{PASSWORD}\";";

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Basic authentication: both entries or neither.
pub fn basic_properties(username: &str, password: &str) -> HashMap<String, String> {
    let mut props = HashMap::new();
    if !is_blank(username) && !is_blank(password) {
        props.insert(keys::BASIC_AUTH_USERNAME.to_string(), username.to_string());
        props.insert(keys::BASIC_AUTH_PASSWORD.to_string(), password.to_string());
    }
    props
}

/// Bearer-token authentication: one entry, only when the token is non-blank.
pub fn token_properties(token: &str) -> HashMap<String, String> {
    let mut props = HashMap::new();
    if !is_blank(token) {
        props.insert(keys::BEARER_AUTH_TOKEN.to_string(), token.to_string());
    }
    props
}

/// SASL authentication.
///
/// The transport protocol and mechanism entries are always emitted. The
/// credential entry is emitted only when both username and password are
/// non-blank, using the fixed per-mechanism-family template.
pub fn sasl_properties(sasl: &SaslConfig) -> HashMap<String, String> {
    let mut props = HashMap::new();
    props.insert(
        keys::SECURITY_PROTOCOL.to_string(),
        sasl.protocol.as_str().to_string(),
    );
    props.insert(
        keys::SASL_MECHANISM.to_string(),
        sasl.mechanism.as_str().to_string(),
    );

    if !is_blank(&sasl.username) && !is_blank(&sasl.password) {
        let template = match sasl.mechanism {
            SaslMechanism::Plain => PLAIN_JAAS_TEMPLATE,
            SaslMechanism::ScramSha256 | SaslMechanism::ScramSha512 => SCRAM_JAAS_TEMPLATE,
        };
        let jaas = template
            .replace("{USERNAME}", &sasl.username)
            .replace("{PASSWORD}", &sasl.password);
        props.insert(keys::SASL_JAAS_CONFIG.to_string(), jaas);
    }

    props
}

/// TLS authentication.
///
/// The security protocol is always set to SSL; each of the five key/trust
/// store fields is included independently of the others, so a truststore
/// without a keystore is a legal partial configuration.
pub fn ssl_properties(tls: &TlsConfig) -> HashMap<String, String> {
    let mut props = HashMap::new();
    props.insert(keys::SECURITY_PROTOCOL.to_string(), "SSL".to_string());

    let optional = [
        (keys::SSL_KEYSTORE_LOCATION, &tls.keystore_location),
        (keys::SSL_KEYSTORE_PASSWORD, &tls.keystore_password),
        (keys::SSL_KEY_PASSWORD, &tls.key_password),
        (keys::SSL_TRUSTSTORE_LOCATION, &tls.truststore_location),
        (keys::SSL_TRUSTSTORE_PASSWORD, &tls.truststore_password),
    ];
    for (key, value) in optional {
        if !is_blank(value) {
            props.insert(key.to_string(), value.to_string());
        }
    }

    props
}
