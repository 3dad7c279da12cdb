//! Driver registry
//!
//! Maps a credential's driver tag to the connection factory that serves it
//! and the SQL dialect spoken over it. The built-in registry covers the MySQL
//! family:
//!
//! | Tag | Factory | Dialect |
//! |-----|---------|---------|
//! | `mysql` | `MySqlConnectionFactory` | `MySqlDialect` |
//! | `mariadb` | `MySqlConnectionFactory` | `MySqlDialect` |
//! | `tidb` | `MySqlConnectionFactory` | `MySqlDialect` |
//!
//! Tags are matched case-insensitively. Anything else fails with
//! [`Error::UnsupportedDriver`].

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::client::SqlClient;
use crate::config::ClientConfig;
use crate::connection::ConnectionFactory;
use crate::credentials::{Credential, CredentialSource};
use crate::dialect::{dialect_for, MySqlDialect, SqlDialect};
use crate::error::{Error, Result};

#[derive(Clone)]
struct Driver {
    factory: Arc<dyn ConnectionFactory>,
    dialect: Arc<dyn SqlDialect>,
}

/// Registry of connection factories and dialects keyed by driver tag
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, Driver>,
}

impl DriverRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every driver compiled into this build
    pub fn builtin() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "mysql")]
        {
            let factory: Arc<dyn ConnectionFactory> =
                Arc::new(crate::mysql::MySqlConnectionFactory);
            for tag in ["mysql", "mariadb", "tidb"] {
                if let Ok(dialect) = dialect_for(tag) {
                    registry.register_with_dialect(tag, Arc::clone(&factory), dialect);
                }
            }
        }
        registry
    }

    /// Register a factory speaking the MySQL dialect, replacing any previous
    /// registration of the tag
    pub fn register(&mut self, tag: &str, factory: Arc<dyn ConnectionFactory>) {
        self.register_with_dialect(tag, factory, Arc::new(MySqlDialect));
    }

    /// Register a factory together with the dialect used over its connections
    pub fn register_with_dialect(
        &mut self,
        tag: &str,
        factory: Arc<dyn ConnectionFactory>,
        dialect: Arc<dyn SqlDialect>,
    ) {
        self.drivers
            .insert(tag.to_ascii_lowercase(), Driver { factory, dialect });
    }

    /// Get the factory for a tag
    pub fn get(&self, tag: &str) -> Option<&Arc<dyn ConnectionFactory>> {
        self.driver(tag).map(|d| &d.factory)
    }

    /// Get the dialect for a tag
    pub fn dialect(&self, tag: &str) -> Option<&Arc<dyn SqlDialect>> {
        self.driver(tag).map(|d| &d.dialect)
    }

    fn driver(&self, tag: &str) -> Option<&Driver> {
        self.drivers.get(&tag.to_ascii_lowercase())
    }

    /// Check if a tag is registered
    pub fn contains(&self, tag: &str) -> bool {
        self.driver(tag).is_some()
    }

    /// Registered tags, sorted
    pub fn drivers(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// Number of registered tags
    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    /// Build a client for a credential
    pub fn create(&self, credential: Credential, config: ClientConfig) -> Result<SqlClient> {
        let Driver { factory, dialect } = self
            .driver(&credential.driver)
            .cloned()
            .ok_or_else(|| Error::unsupported_driver(&credential.driver))?;
        debug!(driver = %credential.driver, dialect = dialect.name(), "Creating client");
        SqlClient::new(credential, config, factory, dialect)
    }

    /// Fetch the credential once and build a client for it
    pub async fn create_from_source(
        &self,
        source: &dyn CredentialSource,
        config: ClientConfig,
    ) -> Result<SqlClient> {
        let credential = source.fetch().await?;
        self.create(credential, config)
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.drivers())
            .finish()
    }
}
