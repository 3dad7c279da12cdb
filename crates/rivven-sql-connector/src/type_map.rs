//! Native column type to portable field type mapping
//!
//! `DESCRIBE` reports column types such as `varchar(255)`, `decimal(10,2)` or
//! `int unsigned`. [`map_native_type`] reduces them to the [`FieldDataType`]
//! taxonomy shared by every dialect. The mapping is total: anything
//! unrecognized is a [`FieldDataType::String`].

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Portable field type exposed across all dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum FieldDataType {
    /// Text
    String,
    /// 32-bit integer family
    Integer,
    /// Arbitrary or 64-bit integers
    BigInteger,
    /// Single precision floating point
    Float,
    /// Double precision and fixed point decimals
    Double,
    /// Long values
    Long,
    /// Boolean
    Boolean,
    /// Calendar date
    Date,
    /// Time or timestamp
    DateTime,
    /// Binary payload
    ByteArray,
    /// Structured value
    Struct,
    /// Key/value object
    Map,
}

impl fmt::Display for FieldDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Column attribute words that may trail a MySQL type name
const TYPE_ATTRIBUTES: &[&str] = &["UNSIGNED", "SIGNED", "ZEROFILL"];

/// Reduce a native type name to its upper-cased base token.
///
/// `decimal(10,2) unsigned zerofill` becomes `DECIMAL`.
pub fn normalize_type_name(native: &str) -> String {
    let base = native.split('(').next().unwrap_or_default();
    let mut words: Vec<String> = base
        .split_whitespace()
        .map(|w| w.to_ascii_uppercase())
        .collect();
    while words.len() > 1
        && words
            .last()
            .is_some_and(|w| TYPE_ATTRIBUTES.contains(&w.as_str()))
    {
        words.pop();
    }
    words.join(" ")
}

/// Map a native column type name to its portable type.
pub fn map_native_type(native: &str) -> FieldDataType {
    match normalize_type_name(native).as_str() {
        "ARRAY" | "STRUCT" => FieldDataType::Struct,
        "BIGINT" | "NUMERIC" => FieldDataType::BigInteger,
        "BINARY" | "VARBINARY" | "LONGVARBINARY" => FieldDataType::ByteArray,
        "BIT" | "SMALLINT" | "INTEGER" | "INT" | "TINYINT" | "MEDIUMINT" => {
            FieldDataType::Integer
        }
        "BOOLEAN" | "BOOL" => FieldDataType::Boolean,
        "DATE" => FieldDataType::Date,
        "DECIMAL" | "DOUBLE" => FieldDataType::Double,
        "FLOAT" => FieldDataType::Float,
        "JAVA_OBJECT" => FieldDataType::Map,
        "REAL" => FieldDataType::Long,
        "TIME" | "TIME_WITH_TIMEZONE" | "TIMESTAMP" | "TIMESTAMP_WITH_TIMEZONE" | "DATETIME" => {
            FieldDataType::DateTime
        }
        _ => FieldDataType::String,
    }
}
