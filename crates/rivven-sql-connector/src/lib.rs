//! # rivven-sql-connector
//!
//! Connector core exposing a MySQL-family database (MySQL, MariaDB, TiDB)
//! through a uniform, paginated, schema-introspecting data-access contract.
//!
//! ## Features
//!
//! - **Schema Discovery**: list base tables, describe columns as portable field types
//! - **Paged Queries**: `COUNT` plus `LIMIT offset, size` paging with a numeric cursor
//! - **Batch Writes**: INSERT, UPSERT (`REPLACE`) and UPDATE from JSON records
//! - **Connection Lifecycle**: one lazily opened, probed and reopened connection per client
//! - **Secret Hygiene**: passwords stay in [`SensitiveString`] and never reach logs
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rivven_sql_connector::prelude::*;
//!
//! let registry = DriverRegistry::builtin();
//! let source = JsonCredentialSource::new(secret_payload);
//! let mut client = registry.create_from_source(&source, ClientConfig::default()).await?;
//!
//! for entity in client.list_entities().await? {
//!     let fields = client.describe_fields(&entity.entity_identifier).await?;
//!     println!("{}: {} fields", entity.label, fields.len());
//! }
//!
//! let mut request = QueryRequest::new("orders", ["id", "total"]).with_page_size(1000);
//! loop {
//!     let page = client.query(&request).await?;
//!     handle(page.records);
//!     match page.next_cursor {
//!         Some(cursor) => request = request.with_cursor(cursor.to_string()),
//!         None => break,
//!     }
//! }
//! ```
//!
//! ## Filter expressions
//!
//! Filters are copied into the `WHERE` clause verbatim. See [`security`].
//!
//! ## Feature Flags
//!
//! - `mysql` (default) - MySQL, MariaDB and TiDB support via mysql_async

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod connection;
pub mod credentials;
pub mod descriptor;
pub mod dialect;
pub mod error;
pub mod metadata;
pub mod provider;
pub mod query;
pub mod registry;
pub mod schema;
pub mod security;
pub mod testing;
pub mod type_map;
pub mod types;
pub mod write;

#[cfg(feature = "mysql")]
pub mod mysql;

/// Prelude module for convenient imports
pub mod prelude {
    // Error types
    pub use crate::error::{Error, ErrorCategory, Result};

    // Values
    pub use crate::types::{Row, Value};

    // Client surface
    pub use crate::client::SqlClient;
    pub use crate::config::ClientConfig;
    pub use crate::registry::DriverRegistry;

    // Credentials
    pub use crate::credentials::{
        Credential, CredentialSource, JsonCredentialSource, SensitiveString,
        StaticCredentialSource,
    };

    // Connections
    pub use crate::connection::{ConnectOptions, Connection, ConnectionFactory, TlsMode};
    pub use crate::provider::{ConnectionProvider, ConnectionState};

    // Portable metadata
    pub use crate::metadata::{
        Entity, FieldDefinition, ReadOperationProperty, WriteOperationProperty,
        WriteOperationType,
    };
    pub use crate::type_map::{map_native_type, FieldDataType};

    // Requests and results
    pub use crate::query::{Cursor, PagedQueryExecutor, QueryPage, QueryRequest};
    pub use crate::write::{BatchWriter, WriteRequest};

    // SQL generation
    pub use crate::dialect::{dialect_for, MySqlDialect, SqlDialect, Statement};
    pub use crate::schema::SchemaIntrospector;
    pub use crate::security::FilterPolicy;

    // Descriptor
    pub use crate::descriptor::{describe_configuration, ConnectorDescriptor, ConnectorMode};

    #[cfg(feature = "mysql")]
    pub use crate::mysql::{MySqlConnection, MySqlConnectionFactory};
}

// Re-export commonly used items at crate root
pub use credentials::SensitiveString;
pub use error::{Error, Result};
pub use types::Value;

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_imports() {
        let _value = Value::Int64(42);
        let _config = ClientConfig::default();
        let _policy = FilterPolicy::DenyList;
        let _mode = WriteOperationType::Upsert;
    }

    #[test]
    fn test_error_types() {
        let err = Error::connection("test error");
        assert!(err.is_retriable());
        assert_eq!(err.category(), ErrorCategory::Connectivity);
    }

    #[test]
    fn test_dialect_selection() {
        assert_eq!(dialect_for("mysql").unwrap().name(), "MySQL");
        assert!(dialect_for("sqlserver").is_err());
    }

    #[test]
    fn test_type_mapping_reexport() {
        assert_eq!(map_native_type("varchar(32)"), FieldDataType::String);
    }
}
