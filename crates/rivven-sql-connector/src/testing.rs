//! Testing utilities for the connector
//!
//! Mock connections and factories for exercising the client without a
//! database server.
//!
//! # Example
//!
//! ```rust
//! use rivven_sql_connector::testing::*;
//! use rivven_sql_connector::types::{Row, Value};
//!
//! let conn = MockConnection::new()
//!     .with_rows("SELECT COUNT(*)", vec![Row::new(vec!["cnt".into()], vec![Value::Int64(3)])]);
//! let factory = MockConnectionFactory::new().with_connection(conn.clone());
//! assert_eq!(factory.connect_count(), 0);
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::connection::{ConnectOptions, Connection, ConnectionFactory};
use crate::error::{Error, Result};
use crate::types::{Row, Value};

// ============================================================================
// Mock Connection
// ============================================================================

#[derive(Debug)]
struct MockConnectionState {
    results: Vec<(String, Vec<Row>)>,
    failures: Vec<(String, String)>,
    statements: Vec<(String, Vec<Value>)>,
    batches: usize,
    affected_rows: u64,
    valid: bool,
    closed: bool,
    fail_close: bool,
}

/// A scripted in-memory connection.
///
/// Results and failures are matched by SQL prefix, first registration wins.
/// Clones share state, so a test can keep a handle after boxing one.
#[derive(Debug, Clone)]
pub struct MockConnection {
    state: Arc<Mutex<MockConnectionState>>,
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnection {
    /// Create a valid connection with no scripted results
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockConnectionState {
                results: Vec::new(),
                failures: Vec::new(),
                statements: Vec::new(),
                batches: 0,
                affected_rows: 1,
                valid: true,
                closed: false,
                fail_close: false,
            })),
        }
    }

    /// Return `rows` for queries starting with `prefix`
    pub fn with_rows(self, prefix: impl Into<String>, rows: Vec<Row>) -> Self {
        self.state.lock().results.push((prefix.into(), rows));
        self
    }

    /// Fail statements starting with `prefix` with an execution error
    pub fn with_failure(self, prefix: impl Into<String>, message: impl Into<String>) -> Self {
        self.state
            .lock()
            .failures
            .push((prefix.into(), message.into()));
        self
    }

    /// Affected row count reported by every `execute`
    pub fn with_affected_rows(self, rows: u64) -> Self {
        self.state.lock().affected_rows = rows;
        self
    }

    /// Make `close` return an error
    pub fn with_failing_close(self) -> Self {
        self.state.lock().fail_close = true;
        self
    }

    /// Flip the liveness probe result
    pub fn set_valid(&self, valid: bool) {
        self.state.lock().valid = valid;
    }

    /// SQL text of every statement seen, in order
    pub fn executed_sql(&self) -> Vec<String> {
        self.state
            .lock()
            .statements
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    /// Every statement seen with its bound values
    pub fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.state.lock().statements.clone()
    }

    /// Number of `execute_batch` calls
    pub fn batch_count(&self) -> usize {
        self.state.lock().batches
    }

    /// Whether `close` was called
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn record(&self, sql: &str, params: &[Value]) -> Result<()> {
        let mut state = self.state.lock();
        state.statements.push((sql.to_string(), params.to_vec()));
        match state.failures.iter().find(|(prefix, _)| sql.starts_with(prefix.as_str())) {
            Some((_, message)) => Err(Error::execution_with_sql(message.clone(), sql)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.record(sql, params)?;
        let state = self.state.lock();
        Ok(state
            .results
            .iter()
            .find(|(prefix, _)| sql.starts_with(prefix.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.record(sql, params)?;
        Ok(self.state.lock().affected_rows)
    }

    async fn execute_batch(&self, statements: &[(&str, &[Value])]) -> Result<Vec<u64>> {
        self.state.lock().batches += 1;
        let mut results = Vec::with_capacity(statements.len());
        for (sql, params) in statements {
            results.push(self.execute(sql, params).await?);
        }
        Ok(results)
    }

    async fn is_valid(&self) -> bool {
        let state = self.state.lock();
        state.valid && !state.closed
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.closed = true;
        if state.fail_close {
            return Err(Error::connection("mock close failure"));
        }
        Ok(())
    }
}

// ============================================================================
// Mock Connection Factory
// ============================================================================

/// A factory handing out queued [`MockConnection`]s.
///
/// When the queue is empty a fresh `MockConnection` is created.
#[derive(Debug, Clone, Default)]
pub struct MockConnectionFactory {
    queued: Arc<Mutex<VecDeque<MockConnection>>>,
    opened: Arc<Mutex<Vec<MockConnection>>>,
    seen_options: Arc<Mutex<Vec<ConnectOptions>>>,
    fail_message: Arc<Mutex<Option<String>>>,
    delay: Arc<Mutex<Option<Duration>>>,
}

impl MockConnectionFactory {
    /// Create a factory with an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a connection for the next `connect`
    pub fn with_connection(self, conn: MockConnection) -> Self {
        self.queued.lock().push_back(conn);
        self
    }

    /// Make every `connect` fail with a connection error
    pub fn fail_with(self, message: impl Into<String>) -> Self {
        *self.fail_message.lock() = Some(message.into());
        self
    }

    /// Delay every `connect`
    pub fn with_connect_delay(self, delay: Duration) -> Self {
        *self.delay.lock() = Some(delay);
        self
    }

    /// Number of successful connects
    pub fn connect_count(&self) -> usize {
        self.opened.lock().len()
    }

    /// Connections handed out, in order
    pub fn opened(&self) -> Vec<MockConnection> {
        self.opened.lock().clone()
    }

    /// Options passed to each `connect` attempt
    pub fn seen_options(&self) -> Vec<ConnectOptions> {
        self.seen_options.lock().clone()
    }
}

#[async_trait]
impl ConnectionFactory for MockConnectionFactory {
    async fn connect(&self, options: &ConnectOptions) -> Result<Box<dyn Connection>> {
        self.seen_options.lock().push(options.clone());

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.fail_message.lock().clone() {
            return Err(Error::connection(message));
        }

        let conn = self.queued.lock().pop_front().unwrap_or_default();
        self.opened.lock().push(conn.clone());
        Ok(Box::new(conn))
    }

    fn driver(&self) -> &'static str {
        "mock"
    }
}
