//! Connector configuration descriptor
//!
//! Static capability declaration consumed by the hosting layer: supported
//! modes and API versions, the credential parameters it must collect, and the
//! JSON schema of [`ClientConfig`].

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::credentials::keys;
use crate::metadata::WriteOperationType;
use crate::registry::DriverRegistry;

/// Authentication type reported for credential-based access
pub const AUTHENTICATION_TYPE: &str = "JDBC";

/// API versions served by this connector
pub const SUPPORTED_API_VERSIONS: &[&str] = &["v1"];

/// Direction of data movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectorMode {
    /// Read from the database
    Source,
    /// Write to the database
    Destination,
}

/// A credential parameter the host must collect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AuthParameter {
    /// Secret key
    pub key: String,
    /// Display label
    pub label: String,
    /// Help text
    pub description: String,
    /// Must be provided
    pub required: bool,
    /// Must be masked and stored as a secret
    pub sensitive_field: bool,
    /// Allowed values offered by the connector, empty for free text
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connector_supplied_values: Vec<String>,
}

impl AuthParameter {
    fn new(key: &str, label: &str, description: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            description: description.to_string(),
            required: true,
            sensitive_field: false,
            connector_supplied_values: Vec::new(),
        }
    }

    fn sensitive(mut self) -> Self {
        self.sensitive_field = true;
        self
    }

    fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.connector_supplied_values = values.into_iter().map(Into::into).collect();
        self
    }
}

/// Custom authentication declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CustomAuthConfig {
    /// Authentication type name
    pub authentication_type: String,
    /// Parameters to collect, in display order
    pub auth_parameters: Vec<AuthParameter>,
}

/// Everything the host needs to know before creating a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorDescriptor {
    /// Connector version
    pub connector_version: String,
    /// Supported modes
    pub connector_modes: Vec<ConnectorMode>,
    /// Supported API versions
    pub supported_api_versions: Vec<String>,
    /// Whether custom authentication is supported
    pub is_custom_auth_supported: bool,
    /// Custom authentication declarations
    pub custom_auth_configs: Vec<CustomAuthConfig>,
    /// Driver tags accepted in the `driver` credential key
    pub supported_drivers: Vec<String>,
    /// Write operations accepted by `write`
    pub supported_write_operations: Vec<WriteOperationType>,
    /// JSON schema of the client configuration
    pub client_config_schema: serde_json::Value,
}

/// Credential parameters in the order the host displays them
pub fn auth_parameters(registry: &DriverRegistry) -> Vec<AuthParameter> {
    vec![
        AuthParameter::new(keys::DRIVER, "Driver", "Database driver").with_values(registry.drivers()),
        AuthParameter::new(keys::HOSTNAME, "Hostname", "Database hostname - must be reachable"),
        AuthParameter::new(keys::PORT, "Port", "Database port"),
        AuthParameter::new(keys::USERNAME, "Username", "Database username"),
        AuthParameter::new(keys::PASSWORD, "Password", "Database password").sensitive(),
        AuthParameter::new(keys::DATABASE, "Database Name", "Database name"),
        AuthParameter::new(keys::TLS, "TLS", "If using TLS to connect").with_values(["Yes", "No"]),
    ]
}

/// Describe the connector for the drivers in `registry`
pub fn describe_configuration(registry: &DriverRegistry) -> ConnectorDescriptor {
    let schema = schemars::schema_for!(ClientConfig);

    ConnectorDescriptor {
        connector_version: env!("CARGO_PKG_VERSION").to_string(),
        connector_modes: vec![ConnectorMode::Source, ConnectorMode::Destination],
        supported_api_versions: SUPPORTED_API_VERSIONS.iter().map(|v| v.to_string()).collect(),
        is_custom_auth_supported: true,
        custom_auth_configs: vec![CustomAuthConfig {
            authentication_type: AUTHENTICATION_TYPE.to_string(),
            auth_parameters: auth_parameters(registry),
        }],
        supported_drivers: registry.drivers().into_iter().map(String::from).collect(),
        supported_write_operations: WriteOperationType::ALL.to_vec(),
        client_config_schema: serde_json::to_value(schema).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockConnectionFactory;
    use std::sync::Arc;

    fn registry() -> DriverRegistry {
        let mut registry = DriverRegistry::new();
        registry.register("tidb", Arc::new(MockConnectionFactory::new()));
        registry
    }

    #[test]
    fn test_modes_and_versions() {
        let descriptor = describe_configuration(&registry());
        assert_eq!(
            descriptor.connector_modes,
            vec![ConnectorMode::Source, ConnectorMode::Destination]
        );
        assert_eq!(descriptor.supported_api_versions, vec!["v1"]);
        assert!(descriptor.is_custom_auth_supported);
        assert_eq!(descriptor.supported_drivers, vec!["tidb"]);
    }

    #[test]
    fn test_auth_parameters() {
        let descriptor = describe_configuration(&registry());
        let auth = &descriptor.custom_auth_configs[0];
        assert_eq!(auth.authentication_type, "JDBC");

        let keys: Vec<&str> = auth.auth_parameters.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["driver", "hostname", "port", "username", "password", "database", "tls"]
        );

        let sensitive: Vec<&str> = auth
            .auth_parameters
            .iter()
            .filter(|p| p.sensitive_field)
            .map(|p| p.key.as_str())
            .collect();
        assert_eq!(sensitive, vec!["password"]);

        let tls = auth.auth_parameters.iter().find(|p| p.key == "tls").unwrap();
        assert_eq!(tls.connector_supplied_values, vec!["Yes", "No"]);
        assert!(auth.auth_parameters.iter().all(|p| p.required));
    }

    #[test]
    fn test_config_schema() {
        let descriptor = describe_configuration(&registry());
        let properties = &descriptor.client_config_schema["properties"];
        assert!(properties.get("connect_timeout_ms").is_some());
        assert!(properties.get("filter_policy").is_some());
        assert!(properties.get("release_after_call").is_some());
    }

    #[test]
    fn test_mode_serde() {
        let json = serde_json::to_string(&ConnectorMode::Destination).unwrap();
        assert_eq!(json, "\"DESTINATION\"");
    }
}
