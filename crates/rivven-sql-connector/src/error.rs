//! Error types for rivven-sql-connector
//!
//! Errors are classified so the glue layer can map them onto response codes:
//! - Connectivity and timeouts (retriable by the caller, never by the core)
//! - Catalog shape problems and missing entities
//! - Invalid arguments detected before any statement runs
//! - Execution failures reported by the database

use std::fmt;
use thiserror::Error;

/// Result type for rivven-sql-connector operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connection cannot be established or died mid-operation
    Connectivity,
    /// Schema introspection returned an unexpected shape
    Catalog,
    /// Malformed request input (record JSON, cursor, id fields)
    InvalidArgument,
    /// Statement failed at the database
    Execution,
    /// Configuration or credential problems
    Configuration,
    /// Operation timed out
    Timeout,
    /// Driver tag is not registered
    Unsupported,
}

impl ErrorCategory {
    /// Whether errors in this category are generally retriable
    #[inline]
    pub const fn is_retriable(self) -> bool {
        matches!(self, Self::Connectivity | Self::Timeout)
    }
}

/// Main error type for rivven-sql-connector
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    /// Connection failed or became unusable
    #[error("connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Catalog metadata did not have the expected shape
    #[error("catalog error: {message}")]
    Catalog { message: String },

    /// Entity does not exist in the connected database
    #[error("entity not found: {entity}")]
    EntityNotFound { entity: String },

    /// Request input rejected before execution
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Statement execution failed
    #[error("execution error: {message}")]
    Execution {
        message: String,
        sql: Option<String>,
        sql_state: Option<String>,
        vendor_code: Option<u16>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Operation timed out
    #[error("timeout: {message}")]
    Timeout { message: String },

    /// Driver tag has no registered implementation
    #[error("unsupported driver: {driver}")]
    UnsupportedDriver { driver: String },
}

impl Error {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Connection { .. } => ErrorCategory::Connectivity,
            Self::Catalog { .. } | Self::EntityNotFound { .. } => ErrorCategory::Catalog,
            Self::InvalidArgument { .. } => ErrorCategory::InvalidArgument,
            Self::Execution { .. } => ErrorCategory::Execution,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::UnsupportedDriver { .. } => ErrorCategory::Unsupported,
        }
    }

    /// Whether this error is retriable
    #[inline]
    pub fn is_retriable(&self) -> bool {
        self.category().is_retriable()
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection error with source
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a catalog error
    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog {
            message: message.into(),
        }
    }

    /// Create an entity-not-found error
    pub fn entity_not_found(entity: impl Into<String>) -> Self {
        Self::EntityNotFound {
            entity: entity.into(),
        }
    }

    /// Create an invalid-argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            sql: None,
            sql_state: None,
            vendor_code: None,
            source: None,
        }
    }

    /// Create an execution error carrying the failed SQL
    pub fn execution_with_sql(message: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            sql: Some(sql.into()),
            sql_state: None,
            vendor_code: None,
            source: None,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create an unsupported-driver error
    pub fn unsupported_driver(driver: impl Into<String>) -> Self {
        Self::UnsupportedDriver {
            driver: driver.into(),
        }
    }

    /// Attach the SQL text to an execution error. Other variants are returned unchanged.
    pub fn with_sql(mut self, statement: impl Into<String>) -> Self {
        if let Self::Execution { sql, .. } = &mut self {
            *sql = Some(statement.into());
        }
        self
    }

    /// Messages of this error and every linked cause, outermost first.
    pub fn chain(&self) -> Vec<String> {
        let mut messages = vec![self.to_string()];
        let mut current = std::error::Error::source(self);
        while let Some(cause) = current {
            messages.push(cause.to_string());
            current = cause.source();
        }
        messages
    }

    /// Log every link of the error chain, then the server diagnostics if any.
    pub fn log_chain(&self, operation: &str) {
        for (depth, message) in self.chain().iter().enumerate() {
            tracing::error!(operation, depth, error = %message, "Error chain");
        }
        if let Self::Execution {
            sql_state: Some(state),
            vendor_code,
            ..
        } = self
        {
            tracing::error!(operation, sql_state = %state, vendor_code = ?vendor_code, "Server diagnostics");
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connectivity => write!(f, "connectivity"),
            Self::Catalog => write!(f, "catalog"),
            Self::InvalidArgument => write!(f, "invalid_argument"),
            Self::Execution => write!(f, "execution"),
            Self::Configuration => write!(f, "configuration"),
            Self::Timeout => write!(f, "timeout"),
            Self::Unsupported => write!(f, "unsupported"),
        }
    }
}
