//! Batch writes from JSON records
//!
//! Each record is a flat JSON object. Keys become columns in the order they
//! appear in the record; values are bound as parameters. Every record is
//! parsed and turned into a statement before anything runs, so one bad
//! record rejects the whole batch.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::connection::Connection;
use crate::dialect::{ColumnValue, SqlDialect, Statement};
use crate::error::{Error, Result};
use crate::metadata::WriteOperationType;
use crate::types::Value;

/// A batch of records to write to one entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    /// Target table
    pub entity_identifier: String,
    /// Write operation
    pub operation: WriteOperationType,
    /// JSON object strings, one per row
    pub records: Vec<String>,
    /// Identifying fields; UPDATE requires exactly one
    #[serde(default)]
    pub id_field_names: Vec<String>,
}

impl WriteRequest {
    /// Create a request without id fields
    pub fn new<I, S>(entity: impl Into<String>, operation: WriteOperationType, records: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entity_identifier: entity.into(),
            operation,
            records: records.into_iter().map(Into::into).collect(),
            id_field_names: Vec::new(),
        }
    }

    /// Add an identifying field
    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field_names.push(field.into());
        self
    }
}

/// Parse one record into column/value pairs in key order.
///
/// Empty strings and JSON `null` become SQL NULL. Numbers and booleans keep
/// their JSON text.
pub fn parse_record(record: &str) -> Result<Vec<ColumnValue>> {
    let parsed: serde_json::Value = serde_json::from_str(record)
        .map_err(|e| Error::invalid_argument(format!("Record must be valid JSON: {}", e)))?;
    let serde_json::Value::Object(object) = parsed else {
        return Err(Error::invalid_argument(
            "Record must be valid JSON: expected an object",
        ));
    };

    object
        .into_iter()
        .map(|(key, value)| {
            let text = match value {
                serde_json::Value::Null => None,
                serde_json::Value::String(s) if s.is_empty() => None,
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Number(n) => Some(n.to_string()),
                serde_json::Value::Bool(b) => Some(b.to_string()),
                serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                    return Err(Error::invalid_argument(format!(
                        "field '{}' must be a scalar value",
                        key
                    )))
                }
            };
            Ok(ColumnValue { name: key, value: text })
        })
        .collect()
}

/// Turns write requests into statement batches and runs them
#[derive(Debug, Clone)]
pub struct BatchWriter {
    dialect: Arc<dyn SqlDialect>,
}

impl BatchWriter {
    /// Create a writer for a dialect
    pub fn new(dialect: Arc<dyn SqlDialect>) -> Self {
        Self { dialect }
    }

    /// Build one statement per record, failing on the first bad record
    pub fn build_statements(&self, request: &WriteRequest) -> Result<Vec<Statement>> {
        let id_field = match request.operation {
            WriteOperationType::Update => match request.id_field_names.as_slice() {
                [id] => Some(id.as_str()),
                ids => {
                    return Err(Error::invalid_argument(format!(
                        "UPDATE requires exactly one id field, got {}",
                        ids.len()
                    )))
                }
            },
            WriteOperationType::Insert | WriteOperationType::Upsert => None,
        };

        request
            .records
            .iter()
            .map(|record| {
                let values = parse_record(record)?;
                match (request.operation, id_field) {
                    (WriteOperationType::Update, Some(id)) => {
                        self.dialect
                            .update_sql(&request.entity_identifier, &values, id)
                    }
                    (WriteOperationType::Upsert, _) => {
                        self.dialect
                            .insert_sql(&request.entity_identifier, &values, true)
                    }
                    _ => self
                        .dialect
                        .insert_sql(&request.entity_identifier, &values, false),
                }
            })
            .collect()
    }

    /// Write every record as one batch.
    ///
    /// Returns the affected row count of each record, in input order.
    pub async fn write(&self, conn: &dyn Connection, request: &WriteRequest) -> Result<Vec<u64>> {
        let statements = self.build_statements(request)?;
        self.execute(conn, request, &statements).await
    }

    /// Run statements built for `request` as one batch
    pub async fn execute(
        &self,
        conn: &dyn Connection,
        request: &WriteRequest,
        statements: &[Statement],
    ) -> Result<Vec<u64>> {
        if statements.is_empty() {
            return Ok(Vec::new());
        }

        let prepared: Vec<(String, Vec<Value>)> = statements
            .iter()
            .map(|stmt| (stmt.sql(), stmt.params()))
            .collect();
        let batch: Vec<(&str, &[Value])> = prepared
            .iter()
            .map(|(sql, params)| (sql.as_str(), params.as_slice()))
            .collect();

        debug!(
            entity = %request.entity_identifier,
            operation = %request.operation,
            statements = batch.len(),
            "Executing write batch"
        );
        let affected = conn
            .execute_batch(&batch)
            .await
            .inspect_err(|e| e.log_chain("write"))?;

        info!(
            entity = %request.entity_identifier,
            operation = %request.operation,
            rows = affected.iter().sum::<u64>(),
            "Write batch applied"
        );
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::MySqlDialect;
    use crate::testing::MockConnection;

    fn writer() -> BatchWriter {
        BatchWriter::new(Arc::new(MySqlDialect))
    }

    #[test]
    fn test_parse_record_keeps_key_order() {
        let values = parse_record(r#"{"name":"Ann","id":"1","age":31,"active":true}"#).unwrap();
        let names: Vec<&str> = values.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["name", "id", "age", "active"]);
        assert_eq!(values[2].value.as_deref(), Some("31"));
        assert_eq!(values[3].value.as_deref(), Some("true"));
    }

    #[test]
    fn test_parse_record_nulls() {
        let values = parse_record(r#"{"a":"","b":null}"#).unwrap();
        assert_eq!(values[0].value, None);
        assert_eq!(values[1].value, None);
    }

    #[test]
    fn test_parse_record_rejects_bad_input() {
        let err = parse_record("{not json").unwrap_err();
        assert!(err.to_string().contains("Record must be valid JSON"));
        assert!(parse_record("[1,2]").is_err());
        assert!(parse_record(r#"{"tags":["a"]}"#).is_err());
    }

    #[test]
    fn test_insert_render() {
        let request = WriteRequest::new(
            "employees",
            WriteOperationType::Insert,
            [r#"{"id":"1","name":"Ann"}"#],
        );
        let stmts = writer().build_statements(&request).unwrap();
        assert_eq!(
            stmts[0].render(),
            r#"INSERT INTO `employees` (id,name) VALUES ("1", "Ann")"#
        );
    }

    #[test]
    fn test_upsert_render_and_empty_string() {
        let request = WriteRequest::new(
            "employees",
            WriteOperationType::Upsert,
            [r#"{"id":"1","name":""}"#],
        );
        let stmts = writer().build_statements(&request).unwrap();
        assert_eq!(
            stmts[0].render(),
            r#"REPLACE INTO `employees` (id,name) VALUES ("1", NULL)"#
        );
    }

    #[test]
    fn test_update_requires_one_id_field() {
        let records = [r#"{"id":"7","name":"Bo"}"#];
        let none = WriteRequest::new("employees", WriteOperationType::Update, records);
        assert!(matches!(
            writer().build_statements(&none),
            Err(Error::InvalidArgument { .. })
        ));

        let two = none.clone().with_id_field("id").with_id_field("name");
        assert!(matches!(
            writer().build_statements(&two),
            Err(Error::InvalidArgument { .. })
        ));

        let one = none.with_id_field("id");
        let stmts = writer().build_statements(&one).unwrap();
        assert_eq!(
            stmts[0].render(),
            r#"UPDATE `employees` SET id = "7", name = "Bo" WHERE id = 7"#
        );
    }

    #[tokio::test]
    async fn test_missing_key_executes_nothing() {
        let conn = MockConnection::new();
        let request = WriteRequest::new(
            "employees",
            WriteOperationType::Update,
            [r#"{"id":"1","name":"Ann"}"#, r#"{"name":"Bo"}"#],
        )
        .with_id_field("id");

        let err = writer().write(&conn, &request).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
        assert!(err
            .to_string()
            .contains("id key is missing from JSON record but is required"));
        assert!(conn.executed_sql().is_empty());
        assert_eq!(conn.batch_count(), 0);
    }

    #[tokio::test]
    async fn test_write_runs_one_batch() {
        let conn = MockConnection::new().with_affected_rows(1);
        let request = WriteRequest::new(
            "employees",
            WriteOperationType::Insert,
            [r#"{"id":"1","name":"Ann"}"#, r#"{"id":"2","name":"Bo"}"#],
        );

        let affected = writer().write(&conn, &request).await.unwrap();
        assert_eq!(affected, vec![1, 1]);
        assert_eq!(conn.batch_count(), 1);

        let statements = conn.statements();
        assert_eq!(statements[0].0, "INSERT INTO `employees` (id,name) VALUES (?, ?)");
        assert_eq!(
            statements[1].1,
            vec![Value::String("2".into()), Value::String("Bo".into())]
        );
    }

    #[tokio::test]
    async fn test_execution_error_aborts() {
        let conn = MockConnection::new().with_failure("INSERT", "Duplicate entry '1'");
        let request = WriteRequest::new(
            "employees",
            WriteOperationType::Insert,
            [r#"{"id":"1"}"#, r#"{"id":"2"}"#],
        );
        let err = writer().write(&conn, &request).await.unwrap_err();
        assert!(matches!(err, Error::Execution { .. }));
        assert_eq!(conn.executed_sql().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let conn = MockConnection::new();
        let request = WriteRequest::new("employees", WriteOperationType::Insert, Vec::<String>::new());
        assert!(writer().write(&conn, &request).await.unwrap().is_empty());
        assert_eq!(conn.batch_count(), 0);
    }
}
