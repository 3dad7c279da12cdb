//! SQL dialect abstraction for rivven-sql-connector
//!
//! The builder turns structured requests into [`Statement`]s:
//! - COUNT / SELECT with a verbatim filter and `LIMIT offset, size` paging
//! - DESCRIBE for column introspection
//! - INSERT / REPLACE / UPDATE for batch writes
//! - catalog queries over `INFORMATION_SCHEMA` (built with sea-query)
//!
//! Record values are bound as parameters. [`Statement::render`] produces the
//! equivalent literal SQL text (values escaped inside double quotes) for
//! diagnostics and for asserting exact SQL in tests.

use sea_query::{Alias, Expr, MysqlQueryBuilder, Query};
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::security::{escape_double_quoted, validate_entity_identifier, validate_field_name};
use crate::types::Value;

/// One piece of a statement
#[derive(Debug, Clone, PartialEq)]
enum Fragment {
    /// SQL text emitted as is
    Sql(String),
    /// Bound value rendered as a double-quoted literal
    Quoted(Value),
    /// Bound value rendered without quoting or escaping
    Raw(Value),
}

/// A SQL statement with bound values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    fragments: Vec<Fragment>,
}

impl Statement {
    /// Statement consisting of SQL text only
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            fragments: vec![Fragment::Sql(sql.into())],
        }
    }

    /// Append SQL text
    pub fn push_sql(&mut self, sql: impl AsRef<str>) -> &mut Self {
        match self.fragments.last_mut() {
            Some(Fragment::Sql(text)) => text.push_str(sql.as_ref()),
            _ => self.fragments.push(Fragment::Sql(sql.as_ref().to_string())),
        }
        self
    }

    /// Append a value rendered as a quoted literal
    pub fn push_quoted(&mut self, value: impl Into<Value>) -> &mut Self {
        self.fragments.push(Fragment::Quoted(value.into()));
        self
    }

    /// Append a value rendered verbatim
    pub fn push_raw(&mut self, value: impl Into<Value>) -> &mut Self {
        self.fragments.push(Fragment::Raw(value.into()));
        self
    }

    /// SQL text with `?` placeholders for bound values
    pub fn sql(&self) -> String {
        self.fragments
            .iter()
            .map(|f| match f {
                Fragment::Sql(text) => text.as_str(),
                Fragment::Quoted(_) | Fragment::Raw(_) => "?",
            })
            .collect()
    }

    /// Bound values in placeholder order
    pub fn params(&self) -> Vec<Value> {
        self.fragments
            .iter()
            .filter_map(|f| match f {
                Fragment::Sql(_) => None,
                Fragment::Quoted(v) | Fragment::Raw(v) => Some(v.clone()),
            })
            .collect()
    }

    /// Whether the statement carries bound values
    pub fn has_params(&self) -> bool {
        self.fragments
            .iter()
            .any(|f| !matches!(f, Fragment::Sql(_)))
    }

    /// Literal SQL text with every bound value inlined.
    ///
    /// NULL renders as `NULL`; quoted values are escaped for a double-quoted
    /// literal; raw values are inserted unchanged.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for fragment in &self.fragments {
            match fragment {
                Fragment::Sql(text) => out.push_str(text),
                Fragment::Quoted(value) => match value.as_string() {
                    Some(text) => {
                        out.push('"');
                        out.push_str(&escape_double_quoted(&text));
                        out.push('"');
                    }
                    None => out.push_str("NULL"),
                },
                Fragment::Raw(value) => match value.as_string() {
                    Some(text) => out.push_str(&text),
                    None => out.push_str("NULL"),
                },
            }
        }
        out
    }
}

/// A column name paired with the value to write; `None` is SQL NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnValue {
    /// Column name
    pub name: String,
    /// Value text, `None` for NULL
    pub value: Option<String>,
}

impl ColumnValue {
    /// Create a column/value pair
    pub fn new(name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            value: value.map(Into::into),
        }
    }
}

/// Row window of a paged SELECT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Rows to skip
    pub offset: u64,
    /// Maximum rows to return
    pub size: u64,
}

/// SQL dialect for vendor-specific SQL generation
pub trait SqlDialect: Send + Sync + fmt::Debug {
    /// Get the dialect name
    fn name(&self) -> &'static str;

    /// Quote an identifier (table name)
    fn quote_identifier(&self, name: &str) -> String;

    /// Get the LIMIT clause for a page, including the leading space
    fn limit_offset_sql(&self, page: Page) -> String;

    /// Catalog query listing base tables of the current database
    fn list_tables_sql(&self) -> String;

    /// Catalog query counting tables named `entity` in the current database
    fn table_exists_sql(&self, entity: &str) -> String;

    /// Column introspection for an entity
    fn describe_sql(&self, entity: &str) -> Result<Statement>;

    /// Row count with an optional verbatim filter
    fn count_sql(&self, entity: &str, filter: Option<&str>) -> Result<Statement>;

    /// Projection with an optional verbatim filter and page window
    fn select_sql(
        &self,
        entity: &str,
        fields: &[String],
        filter: Option<&str>,
        page: Option<Page>,
    ) -> Result<Statement>;

    /// INSERT, or a replace-semantics insert when `replace` is set
    fn insert_sql(&self, entity: &str, values: &[ColumnValue], replace: bool)
        -> Result<Statement>;

    /// UPDATE of every given column, keyed by the raw value of `id_field`
    fn update_sql(&self, entity: &str, values: &[ColumnValue], id_field: &str)
        -> Result<Statement>;
}

/// MySQL dialect, shared by MariaDB and TiDB
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    fn table(&self, entity: &str) -> Result<String> {
        validate_entity_identifier(entity)?;
        Ok(self.quote_identifier(entity))
    }

    fn push_filter(stmt: &mut Statement, filter: Option<&str>) {
        if let Some(filter) = filter.filter(|f| !f.trim().is_empty()) {
            stmt.push_sql(" WHERE ").push_sql(filter);
        }
    }
}

impl SqlDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "MySQL"
    }

    fn quote_identifier(&self, name: &str) -> String {
        crate::security::quote_identifier(name)
    }

    fn limit_offset_sql(&self, page: Page) -> String {
        format!(" LIMIT {}, {}", page.offset, page.size)
    }

    fn list_tables_sql(&self) -> String {
        let mut stmt = Query::select();
        stmt.column(Alias::new("TABLE_NAME"))
            .from((Alias::new("INFORMATION_SCHEMA"), Alias::new("TABLES")))
            .and_where(Expr::col(Alias::new("TABLE_SCHEMA")).eq(Expr::cust("DATABASE()")))
            .and_where(Expr::col(Alias::new("TABLE_TYPE")).eq("BASE TABLE"));
        stmt.to_string(MysqlQueryBuilder)
    }

    fn table_exists_sql(&self, entity: &str) -> String {
        let mut stmt = Query::select();
        stmt.expr_as(Expr::cust("COUNT(*)"), Alias::new("cnt"))
            .from((Alias::new("INFORMATION_SCHEMA"), Alias::new("TABLES")))
            .and_where(Expr::col(Alias::new("TABLE_SCHEMA")).eq(Expr::cust("DATABASE()")))
            .and_where(Expr::col(Alias::new("TABLE_NAME")).eq(entity));
        stmt.to_string(MysqlQueryBuilder)
    }

    fn describe_sql(&self, entity: &str) -> Result<Statement> {
        Ok(Statement::new(format!("DESCRIBE {}", self.table(entity)?)))
    }

    fn count_sql(&self, entity: &str, filter: Option<&str>) -> Result<Statement> {
        let mut stmt = Statement::new(format!("SELECT COUNT(*) as cnt FROM {}", self.table(entity)?));
        Self::push_filter(&mut stmt, filter);
        Ok(stmt)
    }

    fn select_sql(
        &self,
        entity: &str,
        fields: &[String],
        filter: Option<&str>,
        page: Option<Page>,
    ) -> Result<Statement> {
        if fields.is_empty() {
            return Err(Error::invalid_argument(
                "at least one selected field is required",
            ));
        }
        for field in fields {
            validate_field_name(field)?;
        }

        let mut stmt = Statement::new(format!(
            "SELECT {} FROM {}",
            fields.join(","),
            self.table(entity)?
        ));
        Self::push_filter(&mut stmt, filter);
        if let Some(page) = page {
            stmt.push_sql(self.limit_offset_sql(page));
        }
        Ok(stmt)
    }

    fn insert_sql(
        &self,
        entity: &str,
        values: &[ColumnValue],
        replace: bool,
    ) -> Result<Statement> {
        for column in values {
            validate_field_name(&column.name)?;
        }
        let verb = if replace { "REPLACE" } else { "INSERT" };
        let columns: Vec<&str> = values.iter().map(|c| c.name.as_str()).collect();

        let mut stmt = Statement::new(format!(
            "{} INTO {} ({}) VALUES (",
            verb,
            self.table(entity)?,
            columns.join(",")
        ));
        for (i, column) in values.iter().enumerate() {
            if i > 0 {
                stmt.push_sql(", ");
            }
            stmt.push_quoted(column.value.clone());
        }
        stmt.push_sql(")");
        Ok(stmt)
    }

    fn update_sql(
        &self,
        entity: &str,
        values: &[ColumnValue],
        id_field: &str,
    ) -> Result<Statement> {
        validate_field_name(id_field)?;
        for column in values {
            validate_field_name(&column.name)?;
        }
        let id = values
            .iter()
            .find(|c| c.name == id_field)
            .ok_or_else(|| {
                Error::invalid_argument(format!(
                    "{} key is missing from JSON record but is required",
                    id_field
                ))
            })?;

        let mut stmt = Statement::new(format!("UPDATE {} SET ", self.table(entity)?));
        for (i, column) in values.iter().enumerate() {
            if i > 0 {
                stmt.push_sql(", ");
            }
            stmt.push_sql(format!("{} = ", column.name));
            stmt.push_quoted(column.value.clone());
        }
        stmt.push_sql(format!(" WHERE {} = ", id_field));
        stmt.push_raw(id.value.clone());
        Ok(stmt)
    }
}

/// Get the dialect for a driver tag.
///
/// MySQL, MariaDB and TiDB share the MySQL dialect.
pub fn dialect_for(driver: &str) -> Result<Arc<dyn SqlDialect>> {
    match driver.to_ascii_lowercase().as_str() {
        "mysql" | "mariadb" | "tidb" => Ok(Arc::new(MySqlDialect)),
        _ => Err(Error::unsupported_driver(driver)),
    }
}
