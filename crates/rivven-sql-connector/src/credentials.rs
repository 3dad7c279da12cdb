//! Credential records and their sources
//!
//! A credential is fetched once per client construction from a
//! [`CredentialSource`]. The password is kept in a [`SensitiveString`] so it
//! never reaches logs, `Debug` output or serialized dumps.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::value::MapDeserializer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{Error, Result};

/// A string that is redacted in `Debug`, `Display` and serialization.
///
/// ```
/// use rivven_sql_connector::SensitiveString;
///
/// let secret = SensitiveString::new("hunter2");
/// assert_eq!(format!("{:?}", secret), "[REDACTED]");
/// assert_eq!(secret.expose_secret(), "hunter2");
/// ```
#[derive(Clone)]
pub struct SensitiveString(SecretString);

impl SensitiveString {
    /// Create a new sensitive string from any string-like value
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::new(value.into().into_boxed_str()))
    }

    /// Expose the secret value.
    ///
    /// Use only where the actual value is needed (authentication).
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for SensitiveString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for SensitiveString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl From<String> for SensitiveString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SensitiveString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Serialize for SensitiveString {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str("***REDACTED***")
    }
}

impl<'de> Deserialize<'de> for SensitiveString {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::new(value))
    }
}

/// Secret keys recognized in a credential record
pub mod keys {
    /// Driver tag (`mysql`, `mariadb`, `tidb`)
    pub const DRIVER: &str = "driver";
    /// Database host
    pub const HOSTNAME: &str = "hostname";
    /// Database port
    pub const PORT: &str = "port";
    /// Database (schema) name
    pub const DATABASE: &str = "database";
    /// Login user
    pub const USERNAME: &str = "username";
    /// Login password
    pub const PASSWORD: &str = "password";
    /// `Yes` to require TLS
    pub const TLS: &str = "tls";
}

/// Connection credential fetched from a secret store
#[derive(Clone, Debug, Serialize)]
pub struct Credential {
    /// Driver tag selecting the client implementation
    pub driver: String,
    /// Database host
    pub hostname: String,
    /// Database port
    pub port: u16,
    /// Database name
    pub database: String,
    /// Login user
    pub username: String,
    /// Login password
    pub password: SensitiveString,
    /// Require TLS
    pub tls: bool,
}

/// Credential record as stored in the secret store
#[derive(Deserialize)]
struct CredentialPayload {
    driver: String,
    hostname: String,
    port: PortValue,
    database: String,
    username: String,
    password: SensitiveString,
    #[serde(default)]
    tls: String,
}

/// Secret stores hand out the port as text or as a JSON number
#[derive(Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u64),
    Text(String),
}

impl PortValue {
    fn to_port(&self) -> Result<u16> {
        fn invalid(shown: impl std::fmt::Display) -> Error {
            Error::config(format!("credential port '{}' is not a valid port", shown))
        }
        match self {
            Self::Number(n) => u16::try_from(*n).map_err(|_| invalid(n)),
            Self::Text(text) => text.trim().parse::<u16>().map_err(|_| invalid(text)),
        }
    }
}

impl CredentialPayload {
    fn into_credential(self) -> Result<Credential> {
        let required = |key: &str, value: String| -> Result<String> {
            let value = value.trim();
            if value.is_empty() {
                return Err(Error::config(format!(
                    "credential is missing required key '{}'",
                    key
                )));
            }
            Ok(value.to_string())
        };

        Ok(Credential {
            driver: required(keys::DRIVER, self.driver)?,
            hostname: required(keys::HOSTNAME, self.hostname)?,
            port: self.port.to_port()?,
            database: required(keys::DATABASE, self.database)?,
            username: required(keys::USERNAME, self.username)?,
            password: self.password,
            tls: self.tls.trim().eq_ignore_ascii_case("yes"),
        })
    }
}

impl Credential {
    /// Build a credential from a secret map.
    ///
    /// `tls` is enabled only when the value equals `Yes` ignoring case; an
    /// absent `tls` key disables TLS.
    pub fn from_secret_map(secrets: &HashMap<String, String>) -> Result<Self> {
        let entries = secrets.iter().map(|(k, v)| (k.as_str(), v.as_str()));
        let deserializer = MapDeserializer::<_, serde::de::value::Error>::new(entries);
        CredentialPayload::deserialize(deserializer)
            .map_err(|e| Error::config(format!("invalid credential: {}", e)))?
            .into_credential()
    }

    /// Build a credential from a JSON secret payload.
    ///
    /// `port` may be a string or a number.
    pub fn from_json(payload: &str) -> Result<Self> {
        serde_json::from_str::<CredentialPayload>(payload)
            .map_err(|e| Error::config(format!("invalid credential payload: {}", e)))?
            .into_credential()
    }
}

/// Supplier of the credential record
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Fetch the credential
    async fn fetch(&self) -> Result<Credential>;
}

/// Credential source backed by an in-memory secret map
#[derive(Clone)]
pub struct StaticCredentialSource {
    secrets: HashMap<String, String>,
}

impl StaticCredentialSource {
    /// Create a source from key/value pairs
    pub fn new<K, V>(secrets: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            secrets: secrets
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl CredentialSource for StaticCredentialSource {
    async fn fetch(&self) -> Result<Credential> {
        Credential::from_secret_map(&self.secrets)
    }
}

/// Credential source backed by a JSON secret payload
#[derive(Clone)]
pub struct JsonCredentialSource {
    payload: SensitiveString,
}

impl JsonCredentialSource {
    /// Wrap a secret-store JSON payload
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: SensitiveString::new(payload),
        }
    }
}

#[async_trait]
impl CredentialSource for JsonCredentialSource {
    async fn fetch(&self) -> Result<Credential> {
        let credential = Credential::from_json(self.payload.expose_secret())?;
        debug!(
            driver = %credential.driver,
            host = %credential.hostname,
            database = %credential.database,
            "Credential loaded"
        );
        Ok(credential)
    }
}
