//! MySQL-family backend
//!
//! One `mysql_async` connection per [`MySqlConnection`]. MariaDB and TiDB
//! speak the same wire protocol and share this backend.
//!
//! Statements without bound values go over the text protocol; statements
//! with values are prepared and executed over the binary protocol.

use async_trait::async_trait;
use chrono::{Datelike, Timelike};
use mysql_async::prelude::*;
use mysql_async::{Conn, OptsBuilder, SslOpts};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::connection::{ConnectOptions, Connection, ConnectionFactory, TlsMode};
use crate::error::{Error, Result};
use crate::types::{Row, Value};

/// Convert a connector value to a MySQL parameter
fn value_to_sql(value: &Value) -> mysql_async::Value {
    match value {
        Value::Null => mysql_async::Value::NULL,
        Value::Bool(b) => mysql_async::Value::from(*b),
        Value::Int64(n) => mysql_async::Value::from(*n),
        Value::UInt64(n) => mysql_async::Value::from(*n),
        Value::Float32(n) => mysql_async::Value::from(*n),
        Value::Float64(n) => mysql_async::Value::from(*n),
        Value::String(s) => mysql_async::Value::from(s.as_str()),
        Value::Bytes(b) => mysql_async::Value::from(b.clone()),
        Value::Date(d) => {
            mysql_async::Value::Date(d.year() as u16, d.month() as u8, d.day() as u8, 0, 0, 0, 0)
        }
        Value::Time(t) => mysql_async::Value::Time(
            false,
            0,
            t.hour() as u8,
            t.minute() as u8,
            t.second() as u8,
            t.nanosecond() / 1000,
        ),
        Value::DateTime(dt) => mysql_async::Value::Date(
            dt.year() as u16,
            dt.month() as u8,
            dt.day() as u8,
            dt.hour() as u8,
            dt.minute() as u8,
            dt.second() as u8,
            dt.nanosecond() / 1000,
        ),
    }
}

/// Convert a MySQL value to a connector value
fn mysql_value_to_value(val: mysql_async::Value) -> Value {
    match val {
        mysql_async::Value::NULL => Value::Null,
        mysql_async::Value::Bytes(b) => match String::from_utf8(b) {
            Ok(s) => Value::String(s),
            Err(e) => Value::Bytes(e.into_bytes()),
        },
        mysql_async::Value::Int(n) => Value::Int64(n),
        mysql_async::Value::UInt(n) => Value::UInt64(n),
        mysql_async::Value::Float(f) => Value::Float32(f),
        mysql_async::Value::Double(d) => Value::Float64(d),
        mysql_async::Value::Date(year, month, day, hour, min, sec, micro) => {
            let Some(date) = chrono::NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
            else {
                return Value::Null;
            };
            if hour == 0 && min == 0 && sec == 0 && micro == 0 {
                Value::Date(date)
            } else {
                chrono::NaiveTime::from_hms_micro_opt(hour as u32, min as u32, sec as u32, micro)
                    .map(|time| Value::DateTime(chrono::NaiveDateTime::new(date, time)))
                    .unwrap_or(Value::Null)
            }
        }
        mysql_async::Value::Time(neg, days, hour, min, sec, micro) => {
            let total_hours = days * 24 + hour as u32;
            if neg || total_hours >= 24 {
                // TIME spans -838:59:59..838:59:59; keep out-of-day values as text
                let sign = if neg { "-" } else { "" };
                Value::String(format!("{}{:02}:{:02}:{:02}", sign, total_hours, min, sec))
            } else {
                chrono::NaiveTime::from_hms_micro_opt(total_hours, min as u32, sec as u32, micro)
                    .map(Value::Time)
                    .unwrap_or(Value::Null)
            }
        }
    }
}

/// Convert a driver row, keeping column order
fn convert_row(row: mysql_async::Row) -> Row {
    let columns: Vec<String> = row
        .columns_ref()
        .iter()
        .map(|c| c.name_str().to_string())
        .collect();
    let values: Vec<Value> = (0..row.len())
        .map(|i| mysql_value_to_value(row.get(i).unwrap_or(mysql_async::Value::NULL)))
        .collect();
    Row::new(columns, values)
}

/// Map a driver error, keeping server diagnostics
fn map_driver_error(err: mysql_async::Error, sql: &str) -> Error {
    match err {
        mysql_async::Error::Server(server) => Error::Execution {
            message: server.message.clone(),
            sql: Some(sql.to_string()),
            sql_state: Some(server.state.clone()),
            vendor_code: Some(server.code),
            source: Some(Box::new(server)),
        },
        err @ (mysql_async::Error::Io(_) | mysql_async::Error::Driver(_)) => {
            Error::connection_with_source("connection failed during statement", err)
        }
        other => Error::Execution {
            message: other.to_string(),
            sql: Some(sql.to_string()),
            sql_state: None,
            vendor_code: None,
            source: Some(Box::new(other)),
        },
    }
}

/// MySQL connection implementation
pub struct MySqlConnection {
    conn: Arc<Mutex<Option<Conn>>>,
    database: String,
    query_timeout: Option<Duration>,
    created_at: Instant,
}

impl MySqlConnection {
    /// Wrap an established driver connection
    pub fn new(conn: Conn, database: String, query_timeout: Option<Duration>) -> Self {
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            database,
            query_timeout,
            created_at: Instant::now(),
        }
    }

    /// Open a connection with the given options
    pub async fn connect(options: &ConnectOptions) -> Result<Self> {
        let mut opts = OptsBuilder::default()
            .ip_or_hostname(options.host.as_str())
            .tcp_port(options.port)
            .db_name(Some(options.database.as_str()))
            .user(Some(options.username.as_str()))
            .pass(Some(options.password.expose_secret()));

        if let TlsMode::Required { protocols } = &options.tls {
            // SslOpts has no protocol version setting
            debug!(protocols = ?protocols, "Requiring TLS");
            opts = opts.ssl_opts(SslOpts::default());
        }

        let conn = Conn::new(opts).await.map_err(|e| {
            Error::connection_with_source(
                format!("failed to connect to {}", options.redacted_uri()),
                e,
            )
        })?;

        debug!(database = %options.database, "MySQL connection established");
        Ok(Self::new(conn, options.database.clone(), options.query_timeout))
    }

    /// Database this connection is bound to
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Time since the connection was opened
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    async fn take_conn(&self) -> Result<Conn> {
        self.conn
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::connection("connection not available"))
    }

    async fn put_conn(&self, conn: Conn) {
        *self.conn.lock().await = Some(conn);
    }

    /// Run a driver call under the statement timeout.
    ///
    /// On timeout the driver connection is dropped, leaving this connection
    /// invalid.
    async fn run<T, F, Fut>(&self, sql: &str, call: F) -> Result<T>
    where
        F: FnOnce(Conn) -> Fut,
        Fut: Future<Output = (Conn, std::result::Result<T, mysql_async::Error>)>,
    {
        let conn = self.take_conn().await?;
        let outcome = match self.query_timeout {
            Some(limit) => match tokio::time::timeout(limit, call(conn)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(timeout_ms = limit.as_millis() as u64, "Statement timed out");
                    return Err(Error::timeout(format!(
                        "statement exceeded {} ms",
                        limit.as_millis()
                    )));
                }
            },
            None => call(conn).await,
        };

        let (conn, result) = outcome;
        self.put_conn(conn).await;
        result.map_err(|e| map_driver_error(e, sql))
    }
}

#[async_trait]
impl Connection for MySqlConnection {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let mysql_params: Vec<mysql_async::Value> = params.iter().map(value_to_sql).collect();
        let rows: Vec<mysql_async::Row> = self
            .run(sql, |mut conn| async move {
                let result = if mysql_params.is_empty() {
                    conn.query::<mysql_async::Row, _>(sql).await
                } else {
                    conn.exec::<mysql_async::Row, _, _>(sql, mysql_params).await
                };
                (conn, result)
            })
            .await?;

        Ok(rows.into_iter().map(convert_row).collect())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let mysql_params: Vec<mysql_async::Value> = params.iter().map(value_to_sql).collect();
        self.run(sql, |mut conn| async move {
            let result = if mysql_params.is_empty() {
                conn.query_drop(sql).await
            } else {
                conn.exec_drop(sql, mysql_params).await
            };
            let affected = conn.affected_rows();
            (conn, result.map(|_| affected))
        })
        .await
    }

    async fn is_valid(&self) -> bool {
        match self.conn.lock().await.as_mut() {
            Some(conn) => conn.ping().await.is_ok(),
            None => false,
        }
    }

    async fn close(&self) -> Result<()> {
        if let Some(conn) = self.conn.lock().await.take() {
            conn.disconnect()
                .await
                .map_err(|e| Error::connection_with_source("failed to close connection", e))?;
        }
        Ok(())
    }
}

/// Factory for MySQL, MariaDB and TiDB connections
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlConnectionFactory;

#[async_trait]
impl ConnectionFactory for MySqlConnectionFactory {
    async fn connect(&self, options: &ConnectOptions) -> Result<Box<dyn Connection>> {
        let conn = MySqlConnection::connect(options).await?;
        Ok(Box::new(conn))
    }

    fn driver(&self) -> &'static str {
        "mysql"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    #[test]
    fn test_text_protocol_values() {
        assert_eq!(
            mysql_value_to_value(mysql_async::Value::Bytes(b"Ann".to_vec())),
            Value::String("Ann".into())
        );
        assert_eq!(
            mysql_value_to_value(mysql_async::Value::Bytes(vec![0xff, 0xfe])),
            Value::Bytes(vec![0xff, 0xfe])
        );
        assert_eq!(mysql_value_to_value(mysql_async::Value::NULL), Value::Null);
    }

    #[test]
    fn test_binary_protocol_values() {
        assert_eq!(
            mysql_value_to_value(mysql_async::Value::UInt(u64::MAX)),
            Value::UInt64(u64::MAX)
        );
        assert_eq!(
            mysql_value_to_value(mysql_async::Value::Date(2024, 2, 29, 0, 0, 0, 0)),
            Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
        assert!(matches!(
            mysql_value_to_value(mysql_async::Value::Date(2024, 2, 29, 13, 5, 0, 0)),
            Value::DateTime(_)
        ));
        assert_eq!(
            mysql_value_to_value(mysql_async::Value::Date(2023, 2, 30, 0, 0, 0, 0)),
            Value::Null
        );
    }

    #[test]
    fn test_time_values() {
        assert_eq!(
            mysql_value_to_value(mysql_async::Value::Time(false, 0, 8, 30, 0, 0)),
            Value::Time(NaiveTime::from_hms_opt(8, 30, 0).unwrap())
        );
        assert_eq!(
            mysql_value_to_value(mysql_async::Value::Time(true, 1, 2, 3, 4, 0)),
            Value::String("-26:03:04".into())
        );
    }

    #[test]
    fn test_params() {
        assert_eq!(value_to_sql(&Value::Null), mysql_async::Value::NULL);
        assert_eq!(
            value_to_sql(&Value::String("x".into())),
            mysql_async::Value::Bytes(b"x".to_vec())
        );
        let date = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
        assert_eq!(
            value_to_sql(&Value::Date(date)),
            mysql_async::Value::Date(2020, 1, 2, 0, 0, 0, 0)
        );
    }

    #[test]
    fn test_server_error_keeps_diagnostics() {
        let server = mysql_async::ServerError {
            code: 1146,
            message: "Table 'shop.nope' doesn't exist".into(),
            state: "42S02".into(),
        };
        let err = map_driver_error(mysql_async::Error::Server(server), "SELECT 1 FROM `nope`");
        match err {
            Error::Execution {
                sql_state,
                vendor_code,
                sql,
                ..
            } => {
                assert_eq!(sql_state.as_deref(), Some("42S02"));
                assert_eq!(vendor_code, Some(1146));
                assert_eq!(sql.as_deref(), Some("SELECT 1 FROM `nope`"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
