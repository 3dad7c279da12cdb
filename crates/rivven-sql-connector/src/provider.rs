//! Connection lifecycle for a single client
//!
//! ```text
//!   Closed ──get_connection──▶ Connecting ──ok──▶ Open
//!     ▲                            │                │ probe fails
//!     │                          error              ▼
//!     └────────────────────────────┴──close──── Invalid
//! ```
//!
//! The provider owns at most one connection. A failed liveness probe moves it
//! to `Invalid`; the next [`ConnectionProvider::get_connection`] closes the
//! stale handle before reopening.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::connection::{ConnectOptions, Connection, ConnectionFactory};
use crate::error::{Error, Result};

/// Lifecycle state of the provider's connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection held
    Closed,
    /// A connection attempt is in progress
    Connecting,
    /// Connection held and last probe succeeded
    Open,
    /// Connection held but failed its liveness probe
    Invalid,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Invalid => write!(f, "invalid"),
        }
    }
}

/// Lazily opens, revalidates and reopens one connection
pub struct ConnectionProvider {
    factory: Arc<dyn ConnectionFactory>,
    options: ConnectOptions,
    state: ConnectionState,
    conn: Option<Box<dyn Connection>>,
}

impl ConnectionProvider {
    /// Create a provider; no connection is opened yet
    pub fn new(factory: Arc<dyn ConnectionFactory>, options: ConnectOptions) -> Self {
        Self {
            factory,
            options,
            state: ConnectionState::Closed,
            conn: None,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Options used for every connection attempt
    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    /// Probe the held connection, moving to `Invalid` if it is dead.
    pub async fn probe(&mut self) -> ConnectionState {
        if let Some(conn) = &self.conn {
            self.state = if conn.is_valid().await {
                ConnectionState::Open
            } else {
                warn!(uri = %self.options.redacted_uri(), "Connection failed liveness probe");
                ConnectionState::Invalid
            };
        }
        self.state
    }

    /// Return a live connection, opening or reopening one as needed.
    pub async fn get_connection(&mut self) -> Result<&dyn Connection> {
        match self.probe().await {
            ConnectionState::Open => {}
            ConnectionState::Invalid => {
                self.discard().await;
                self.open().await?;
            }
            ConnectionState::Closed | ConnectionState::Connecting => self.open().await?,
        }

        self.conn
            .as_deref()
            .ok_or_else(|| Error::connection("no connection available"))
    }

    /// Close the held connection, if any
    pub async fn close(&mut self) -> Result<()> {
        let result = match self.conn.take() {
            Some(conn) => {
                debug!(uri = %self.options.redacted_uri(), "Closing connection");
                conn.close().await
            }
            None => Ok(()),
        };
        self.state = ConnectionState::Closed;
        result
    }

    async fn discard(&mut self) {
        if let Some(stale) = self.conn.take() {
            if let Err(e) = stale.close().await {
                warn!(error = %e, "Failed to close invalid connection");
            }
        }
        self.state = ConnectionState::Closed;
    }

    async fn open(&mut self) -> Result<()> {
        self.state = ConnectionState::Connecting;
        debug!(
            uri = %self.options.redacted_uri(),
            driver = self.factory.driver(),
            "Opening connection"
        );

        let limit = self.options.connect_timeout;
        match tokio::time::timeout(limit, self.factory.connect(&self.options)).await {
            Ok(Ok(conn)) => {
                self.conn = Some(conn);
                self.state = ConnectionState::Open;
                debug!(uri = %self.options.redacted_uri(), "Connection open");
                Ok(())
            }
            Ok(Err(e)) => {
                self.state = ConnectionState::Closed;
                Err(e)
            }
            Err(_) => {
                self.state = ConnectionState::Closed;
                Err(Error::timeout(format!(
                    "connecting to {} exceeded {} ms",
                    self.options.redacted_uri(),
                    limit.as_millis()
                )))
            }
        }
    }
}

impl std::fmt::Debug for ConnectionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionProvider")
            .field("driver", &self.factory.driver())
            .field("options", &self.options)
            .field("state", &self.state)
            .finish()
    }
}
