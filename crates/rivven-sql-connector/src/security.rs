//! SQL safety helpers for rivven-sql-connector.
//!
//! Provides:
//! - Field name validation for names interpolated without quoting
//! - Entity identifier quoting (backticks, doubled when embedded)
//! - Escaping of values rendered inside double-quoted MySQL literals
//! - The filter expression policy
//!
//! # Filter expressions are a trust boundary
//!
//! The filter expression of a query or count is copied verbatim into the
//! `WHERE` clause. It cannot be parameterized, and under the default
//! [`FilterPolicy::PassThrough`] it is not inspected at all: the caller (or a
//! request validator in front of the connector) is responsible for ensuring
//! it only comes from a trusted source. [`FilterPolicy::DenyList`] rejects the
//! most common injection shapes but is best-effort only.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Maximum identifier length accepted by MySQL
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Maximum filter length accepted by [`FilterPolicy::DenyList`]
pub const MAX_FILTER_LEN: usize = 4096;

/// Validate a field name that is interpolated into SQL without quoting.
///
/// Column lists are rendered bare (`(id,name)`), so names are restricted to
/// the MySQL unquoted identifier set: ASCII letters, digits, `_`, `$` and
/// characters U+0080 to U+FFFF. At most 64 characters, not digits only.
///
/// ```
/// use rivven_sql_connector::security::validate_field_name;
///
/// assert!(validate_field_name("customer_id").is_ok());
/// assert!(validate_field_name("1st_line").is_ok());
/// assert!(validate_field_name("prénom").is_ok());
///
/// assert!(validate_field_name("id) VALUES (1); DROP TABLE t; --").is_err());
/// assert!(validate_field_name("").is_err());
/// assert!(validate_field_name("42").is_err());
/// ```
pub fn validate_field_name(name: &str) -> crate::Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_argument("field name cannot be empty"));
    }

    let len = name.chars().count();
    if len > MAX_IDENTIFIER_LEN {
        return Err(Error::invalid_argument(format!(
            "field name too long: {} chars (max {})",
            len, MAX_IDENTIFIER_LEN
        )));
    }

    if let Some(c) = name.chars().find(|c| !is_unquoted_identifier_char(*c)) {
        return Err(Error::invalid_argument(format!(
            "invalid field name '{}': contains invalid character '{}'",
            name, c
        )));
    }

    if name.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::invalid_argument(format!(
            "invalid field name '{}': must not be purely numeric",
            name
        )));
    }

    Ok(())
}

fn is_unquoted_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$' || ('\u{80}'..='\u{FFFF}').contains(&c)
}

/// Validate an entity identifier before it is quoted.
///
/// Any character is allowed inside a backtick-quoted identifier except NUL;
/// length is capped at 64 characters.
pub fn validate_entity_identifier(name: &str) -> crate::Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_argument("entity identifier cannot be empty"));
    }

    if name.chars().count() > MAX_IDENTIFIER_LEN {
        return Err(Error::invalid_argument(format!(
            "entity identifier too long: {} chars (max {})",
            name.chars().count(),
            MAX_IDENTIFIER_LEN
        )));
    }

    if name.contains('\0') {
        return Err(Error::invalid_argument(
            "entity identifier contains a NUL byte",
        ));
    }

    Ok(())
}

/// Quote an identifier with backticks, doubling embedded backticks.
///
/// ```
/// use rivven_sql_connector::security::quote_identifier;
///
/// assert_eq!(quote_identifier("orders"), "`orders`");
/// assert_eq!(quote_identifier("we`ird"), "`we``ird`");
/// ```
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Escape a value for embedding inside a double-quoted MySQL string literal.
///
/// Backslashes, both quote characters and control characters are escaped
/// with MySQL backslash sequences. Non-ASCII text is kept as is.
///
/// ```
/// use rivven_sql_connector::security::escape_double_quoted;
///
/// assert_eq!(escape_double_quoted("Ann"), "Ann");
/// assert_eq!(escape_double_quoted(r#"say "hi""#), r#"say \"hi\""#);
/// assert_eq!(escape_double_quoted("a\\b"), "a\\\\b");
/// ```
pub fn escape_double_quoted(value: &str) -> String {
    if !value
        .chars()
        .any(|c| matches!(c, '\\' | '"' | '\'' | '\n' | '\r' | '\t' | '\0' | '\u{8}' | '\u{1a}'))
    {
        return value.to_string();
    }

    let mut escaped = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\'' => escaped.push_str("\\'"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            '\0' => escaped.push_str("\\0"),
            '\u{8}' => escaped.push_str("\\b"),
            '\u{1a}' => escaped.push_str("\\Z"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// How filter expressions are screened before interpolation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FilterPolicy {
    /// Interpolate verbatim; the caller guarantees the filter is trusted
    #[default]
    PassThrough,
    /// Reject statement stacking, comments and backslash escapes
    DenyList,
}

impl FilterPolicy {
    /// Check a filter expression against this policy.
    pub fn check(self, filter: &str) -> crate::Result<()> {
        match self {
            Self::PassThrough => Ok(()),
            Self::DenyList => validate_filter_expression(filter),
        }
    }
}

/// Deny-list screening of a filter expression.
///
/// Rejects semicolons, `--` and `/* */` comments, `#` comments and
/// backslashes. This is a best-effort safeguard, not a guarantee.
///
/// ```
/// use rivven_sql_connector::security::validate_filter_expression;
///
/// assert!(validate_filter_expression("status = 'active'").is_ok());
/// assert!(validate_filter_expression("1=1; DROP TABLE users").is_err());
/// assert!(validate_filter_expression("1=1 -- bypass").is_err());
/// ```
pub fn validate_filter_expression(filter: &str) -> crate::Result<()> {
    if filter.trim().is_empty() {
        return Err(Error::invalid_argument("filter expression cannot be empty"));
    }

    if filter.len() > MAX_FILTER_LEN {
        return Err(Error::invalid_argument(format!(
            "filter expression too long: {} chars (max {})",
            filter.len(),
            MAX_FILTER_LEN
        )));
    }

    let prohibited = [
        (";", "statement terminator ';'"),
        ("--", "line comment '--'"),
        ("#", "line comment '#'"),
        ("/*", "block comment"),
        ("*/", "block comment"),
        ("\\", "backslash escape"),
    ];
    for (pattern, label) in prohibited {
        if filter.contains(pattern) {
            return Err(Error::invalid_argument(format!(
                "filter expression contains prohibited {}: {}",
                label, filter
            )));
        }
    }

    Ok(())
}
