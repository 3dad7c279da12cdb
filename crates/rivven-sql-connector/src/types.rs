//! Value types for rivven-sql-connector
//!
//! A compact value model covering what MySQL-family servers return over the
//! text and binary protocols, plus the ordered [`Row`] wrapper.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// SQL value exchanged with a connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// SQL NULL
    Null,
    /// Boolean value
    Bool(bool),
    /// Signed integer
    Int64(i64),
    /// Unsigned integer (BIGINT UNSIGNED)
    UInt64(u64),
    /// 32-bit floating point (FLOAT)
    Float32(f32),
    /// 64-bit floating point (DOUBLE)
    Float64(f64),
    /// Text (also DECIMAL, which servers send as text)
    String(String),
    /// Binary data that is not valid UTF-8
    Bytes(Vec<u8>),
    /// Date without time
    Date(NaiveDate),
    /// Time of day
    Time(NaiveTime),
    /// Timestamp without timezone (DATETIME, TIMESTAMP)
    DateTime(NaiveDateTime),
}

impl Value {
    /// Check if value is NULL
    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Try to convert to i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int64(n) => Some(*n),
            Self::UInt64(n) => i64::try_from(*n).ok(),
            Self::Bool(b) => Some(i64::from(*b)),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Borrow the text of a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Text representation, `None` for NULL.
    ///
    /// Binary values that are not UTF-8 are rendered lossily.
    pub fn as_string(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::Int64(n) => Some(n.to_string()),
            Self::UInt64(n) => Some(n.to_string()),
            Self::Float32(n) => Some(n.to_string()),
            Self::Float64(n) => Some(n.to_string()),
            Self::String(s) => Some(s.clone()),
            Self::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
            Self::Date(d) => Some(d.to_string()),
            Self::Time(t) => Some(t.to_string()),
            Self::DateTime(dt) => Some(dt.to_string()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::UInt64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Self::Null,
        }
    }
}

/// Database row as ordered column values
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Create a new row
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Get column count
    #[inline]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if row is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Get column names
    #[inline]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Get all values
    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Get value by column index
    #[inline]
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Get value by column name (case-insensitive)
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .and_then(|idx| self.values.get(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_null() {
        assert!(Value::Null.is_null());
        assert!(!Value::Int64(0).is_null());
        assert_eq!(Value::Null.as_string(), None);
    }

    #[test]
    fn test_value_text() {
        assert_eq!(Value::Int64(-7).as_string().as_deref(), Some("-7"));
        assert_eq!(Value::UInt64(7).as_string().as_deref(), Some("7"));
        assert_eq!(
            Value::String("12.50".into()).as_string().as_deref(),
            Some("12.50")
        );

        let dt = NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(8, 30, 0))
            .unwrap();
        assert_eq!(
            Value::DateTime(dt).as_string().as_deref(),
            Some("2024-03-01 08:30:00")
        );
    }

    #[test]
    fn test_value_as_i64() {
        assert_eq!(Value::String(" 42 ".into()).as_i64(), Some(42));
        assert_eq!(Value::UInt64(u64::MAX).as_i64(), None);
        assert_eq!(Value::Bytes(vec![1]).as_i64(), None);
    }

    #[test]
    fn test_value_from_impl() {
        let v: Value = "hello".into();
        assert_eq!(v.as_str(), Some("hello"));

        let v: Value = None::<i64>.into();
        assert!(v.is_null());
    }

    #[test]
    fn test_row_operations() {
        let row = Row::new(
            vec!["Field".into(), "Key".into()],
            vec![Value::String("id".into()), Value::String("PRI".into())],
        );

        assert_eq!(row.len(), 2);
        assert_eq!(row.get(0), Some(&Value::String("id".into())));
        assert_eq!(row.get_by_name("key"), Some(&Value::String("PRI".into())));
        assert_eq!(row.get_by_name("Extra"), None);
    }
}
