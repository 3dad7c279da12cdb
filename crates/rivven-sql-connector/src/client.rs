//! Connector client
//!
//! [`SqlClient`] is the surface the request-handling layer talks to. One
//! client owns one [`ConnectionProvider`]; every method takes `&mut self`,
//! so a client is never used by two calls at once.
//!
//! With `release_after_call` (the default) the connection is closed at the
//! end of every call. Otherwise it stays open and is probed on the next call.
//!
//! # Example
//!
//! ```rust,ignore
//! use rivven_sql_connector::prelude::*;
//!
//! let registry = DriverRegistry::builtin();
//! let source = JsonCredentialSource::new(secret_payload);
//! let mut client = registry.create_from_source(&source, ClientConfig::default()).await?;
//!
//! let page = client
//!     .query(&QueryRequest::new("orders", ["id", "total"]).with_page_size(1000))
//!     .await?;
//! ```

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::connection::{ConnectOptions, ConnectionFactory};
use crate::credentials::Credential;
use crate::dialect::SqlDialect;
use crate::error::{ErrorCategory, Result};
use crate::metadata::{Entity, FieldDefinition, WriteOperationType};
use crate::provider::{ConnectionProvider, ConnectionState};
use crate::query::{PagedQueryExecutor, QueryPage, QueryRequest};
use crate::schema::SchemaIntrospector;
use crate::write::{BatchWriter, WriteRequest};

/// Client for one MySQL-family database
#[derive(Debug)]
pub struct SqlClient {
    driver: String,
    config: ClientConfig,
    dialect: Arc<dyn SqlDialect>,
    provider: ConnectionProvider,
    introspector: SchemaIntrospector,
    executor: PagedQueryExecutor,
    writer: BatchWriter,
}

impl SqlClient {
    /// Create a client; no connection is opened until the first call.
    ///
    /// `factory` and `dialect` are the pair registered for the credential's
    /// driver tag.
    pub fn new(
        credential: Credential,
        config: ClientConfig,
        factory: Arc<dyn ConnectionFactory>,
        dialect: Arc<dyn SqlDialect>,
    ) -> Result<Self> {
        let config = config.validated()?;
        let options = ConnectOptions::from_credential(&credential, &config);

        Ok(Self {
            driver: credential.driver.to_ascii_lowercase(),
            introspector: SchemaIntrospector::new(Arc::clone(&dialect)),
            executor: PagedQueryExecutor::new(Arc::clone(&dialect))
                .with_filter_policy(config.filter_policy),
            writer: BatchWriter::new(Arc::clone(&dialect)),
            provider: ConnectionProvider::new(factory, options),
            dialect,
            config,
        })
    }

    /// Driver tag of the credential
    pub fn driver(&self) -> &str {
        &self.driver
    }

    /// SQL dialect in use
    pub fn dialect(&self) -> &dyn SqlDialect {
        self.dialect.as_ref()
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Lifecycle state of the underlying connection
    pub fn connection_state(&self) -> ConnectionState {
        self.provider.state()
    }

    /// Write operations this connector supports
    pub fn list_write_operations(&self) -> Vec<WriteOperationType> {
        WriteOperationType::ALL.to_vec()
    }

    /// Open a connection to prove the credential works
    pub async fn validate_credentials(&mut self) -> Result<()> {
        let result = self.provider.get_connection().await.map(|_| ());
        if result.is_ok() {
            info!(driver = %self.driver, "Credentials validated");
        }
        self.finish("validate_credentials", result).await
    }

    /// List base tables
    pub async fn list_entities(&mut self) -> Result<Vec<Entity>> {
        let result = match self.provider.get_connection().await {
            Ok(conn) => self.introspector.list_entities(conn).await,
            Err(e) => Err(e),
        };
        self.finish("list_entities", result).await
    }

    /// Describe the columns of an entity
    pub async fn describe_fields(&mut self, entity: &str) -> Result<Vec<FieldDefinition>> {
        let result = match self.provider.get_connection().await {
            Ok(conn) => self.introspector.describe_fields(conn, entity).await,
            Err(e) => Err(e),
        };
        self.finish("describe_fields", result).await
    }

    /// Count rows of an entity matching an optional filter
    pub async fn count(&mut self, entity: &str, filter: Option<&str>) -> Result<u64> {
        let result = match self.provider.get_connection().await {
            Ok(conn) => self.executor.count(conn, entity, filter).await,
            Err(e) => Err(e),
        };
        self.finish("count", result).await
    }

    /// Fetch one page of rows
    pub async fn query(&mut self, request: &QueryRequest) -> Result<QueryPage> {
        let result = match self.provider.get_connection().await {
            Ok(conn) => self.executor.query(conn, request).await,
            Err(e) => Err(e),
        };
        self.finish("query", result).await
    }

    /// Write a batch of records; returns affected rows per record
    pub async fn write(&mut self, request: &WriteRequest) -> Result<Vec<u64>> {
        // reject bad records before touching the network
        let statements = self.writer.build_statements(request)?;
        let result = match self.provider.get_connection().await {
            Ok(conn) => self.writer.execute(conn, request, &statements).await,
            Err(e) => Err(e),
        };
        self.finish("write", result).await
    }

    /// Close the connection, if open
    pub async fn close(&mut self) -> Result<()> {
        self.provider.close().await
    }

    async fn finish<T>(&mut self, operation: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if matches!(e.category(), ErrorCategory::Connectivity | ErrorCategory::Timeout) {
                e.log_chain(operation);
            }
        }
        if self.config.release_after_call {
            if let Err(e) = self.provider.close().await {
                warn!(operation, error = %e, "Failed to release connection");
            }
        }
        result
    }
}
