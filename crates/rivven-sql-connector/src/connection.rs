//! Connection traits for rivven-sql-connector
//!
//! Core abstractions for database connectivity:
//! - Connection: statement execution, liveness probe and close
//! - ConnectionFactory: opens connections for one driver family
//! - ConnectOptions: secure connection parameters built from a credential

use async_trait::async_trait;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::credentials::{Credential, SensitiveString};
use crate::dialect::Statement;
use crate::error::{Error, Result};
use crate::types::{Row, Value};

/// A connection to a database
#[async_trait]
pub trait Connection: Send + Sync {
    /// Execute a query that returns rows
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Execute a statement that modifies data, returns affected row count
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Execute a batch of statements, returns affected counts per statement
    async fn execute_batch(&self, statements: &[(&str, &[Value])]) -> Result<Vec<u64>> {
        let mut results = Vec::with_capacity(statements.len());
        for (sql, params) in statements {
            results.push(self.execute(sql, params).await?);
        }
        Ok(results)
    }

    /// Run a built statement and return its rows
    async fn query_statement(&self, statement: &Statement) -> Result<Vec<Row>> {
        let sql = statement.sql();
        self.query(&sql, &statement.params())
            .await
            .map_err(|e| e.with_sql(sql))
    }

    /// Check if connection is valid/alive
    async fn is_valid(&self) -> bool;

    /// Close the connection
    async fn close(&self) -> Result<()>;
}

/// Factory for creating connections
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Open a new connection
    async fn connect(&self, options: &ConnectOptions) -> Result<Box<dyn Connection>>;

    /// Driver family served by this factory
    fn driver(&self) -> &'static str;
}

/// Transport security requested by the credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsMode {
    /// Plain TCP
    Disabled,
    /// TLS required, restricted to the listed protocol versions
    Required {
        /// Allowed protocol versions, e.g. `TLSv1.2`
        protocols: Vec<String>,
    },
}

impl TlsMode {
    /// Whether TLS is required
    pub fn is_required(&self) -> bool {
        matches!(self, Self::Required { .. })
    }
}

/// Parameters for opening a connection.
///
/// The password stays wrapped in [`SensitiveString`]; `Debug` and
/// [`ConnectOptions::redacted_uri`] never reveal it.
#[derive(Clone)]
pub struct ConnectOptions {
    /// Driver tag (URI scheme)
    pub driver: String,
    /// Database host
    pub host: String,
    /// Database port
    pub port: u16,
    /// Database name
    pub database: String,
    /// Login user
    pub username: String,
    /// Login password
    pub password: SensitiveString,
    /// Transport security
    pub tls: TlsMode,
    /// Connection establishment timeout
    pub connect_timeout: Duration,
    /// Per-statement timeout
    pub query_timeout: Option<Duration>,
}

impl ConnectOptions {
    /// Build options from a credential and client configuration
    pub fn from_credential(credential: &Credential, config: &ClientConfig) -> Self {
        let tls = if credential.tls {
            TlsMode::Required {
                protocols: config.tls_protocols.clone(),
            }
        } else {
            TlsMode::Disabled
        };

        Self {
            driver: credential.driver.to_ascii_lowercase(),
            host: credential.hostname.clone(),
            port: credential.port,
            database: credential.database.clone(),
            username: credential.username.clone(),
            password: credential.password.clone(),
            tls,
            connect_timeout: config.connect_timeout(),
            query_timeout: config.query_timeout(),
        }
    }

    /// Full connection URI including the password.
    ///
    /// `driver://host:port/database?user=..&password=..` with
    /// `sslMode=REQUIRED&enabledTLSProtocols=..` appended when TLS is
    /// required.
    pub fn connection_uri(&self) -> Result<SensitiveString> {
        self.build_uri(self.password.expose_secret())
            .map(SensitiveString::new)
    }

    /// Connection URI with the password masked, safe to log
    pub fn redacted_uri(&self) -> String {
        self.build_uri("***")
            .unwrap_or_else(|_| format!("{}://***", self.driver))
    }

    fn build_uri(&self, password: &str) -> Result<String> {
        let mut uri = url::Url::parse(&format!("{}://{}:{}", self.driver, self.host, self.port))
            .map_err(|e| Error::config(format!("invalid connection address: {}", e)))?;
        uri.set_path(&self.database);

        let encode = |s: &str| url::form_urlencoded::byte_serialize(s.as_bytes()).collect::<String>();
        let mut query = format!("user={}&password={}", encode(&self.username), encode(password));
        if let TlsMode::Required { protocols } = &self.tls {
            query.push_str("&sslMode=REQUIRED&enabledTLSProtocols=");
            query.push_str(&protocols.join(","));
        }
        uri.set_query(Some(&query));

        Ok(uri.to_string())
    }
}

impl std::fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("uri", &self.redacted_uri())
            .field("tls", &self.tls)
            .field("connect_timeout", &self.connect_timeout)
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}
