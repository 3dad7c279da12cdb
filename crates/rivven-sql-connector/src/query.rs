//! Paged queries
//!
//! A query runs `COUNT` then `SELECT ... LIMIT offset, size` and hands back
//! one JSON object string per row plus the cursor of the next page.
//!
//! Pagination is offset based. Rows inserted or deleted between two page
//! fetches shift later pages, so a reader can see a row twice or miss one.
//!
//! The filter expression is copied into the `WHERE` clause verbatim; see
//! [`crate::security`] for the trust boundary this implies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::connection::Connection;
use crate::dialect::{Page, SqlDialect};
use crate::error::{Error, Result};
use crate::security::FilterPolicy;

/// Continuation token of a paged query: the offset of the next page.
///
/// On the wire it is the offset as a decimal string.
///
/// ```
/// use rivven_sql_connector::query::Cursor;
///
/// let cursor: Cursor = "1000".parse().unwrap();
/// assert_eq!(cursor.offset(), 1000);
/// assert_eq!(cursor.to_string(), "1000");
/// assert!("next".parse::<Cursor>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cursor(u64);

impl Cursor {
    /// Cursor pointing at `offset`
    pub const fn new(offset: u64) -> Self {
        Self(offset)
    }

    /// Row offset
    pub const fn offset(self) -> u64 {
        self.0
    }

    /// Cursor of the page after the one starting at `offset`.
    ///
    /// `None` once `offset + page_size` reaches `total_rows`.
    pub fn next_page(offset: u64, page_size: u64, total_rows: u64) -> Option<Self> {
        let next = offset.saturating_add(page_size);
        (next < total_rows).then_some(Self(next))
    }
}

impl FromStr for Cursor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim().parse::<u64>().map(Self).map_err(|_| {
            Error::invalid_argument(format!("cursor '{}' is not a numeric offset", s))
        })
    }
}

impl TryFrom<String> for Cursor {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Cursor> for String {
    fn from(cursor: Cursor) -> Self {
        cursor.to_string()
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A paged query over one entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Table to read
    pub entity_identifier: String,
    /// Columns to return, in output order
    pub selected_field_names: Vec<String>,
    /// Raw predicate for the `WHERE` clause
    #[serde(default)]
    pub filter_expression: Option<String>,
    /// Rows per page; `None` reads everything in one page
    #[serde(default)]
    pub page_size: Option<u64>,
    /// Wire form of the cursor returned by the previous page
    #[serde(default)]
    pub cursor: Option<String>,
}

impl QueryRequest {
    /// Create a request for `fields` of `entity`
    pub fn new<I, S>(entity: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entity_identifier: entity.into(),
            selected_field_names: fields.into_iter().map(Into::into).collect(),
            filter_expression: None,
            page_size: None,
            cursor: None,
        }
    }

    /// Set the filter expression
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter_expression = Some(filter.into());
        self
    }

    /// Set the page size
    pub fn with_page_size(mut self, size: u64) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Continue from a previous page
    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    fn parsed_cursor(&self) -> Result<Option<Cursor>> {
        self.cursor.as_deref().map(str::parse).transpose()
    }
}

/// One page of query results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPage {
    /// One JSON object string per row
    pub records: Vec<String>,
    /// Cursor of the next page, `None` at the end
    pub next_cursor: Option<Cursor>,
}

/// Runs counts and paged selects
#[derive(Debug, Clone)]
pub struct PagedQueryExecutor {
    dialect: Arc<dyn SqlDialect>,
    filter_policy: FilterPolicy,
}

impl PagedQueryExecutor {
    /// Create an executor with the pass-through filter policy
    pub fn new(dialect: Arc<dyn SqlDialect>) -> Self {
        Self {
            dialect,
            filter_policy: FilterPolicy::default(),
        }
    }

    /// Screen filters with `policy` before interpolation
    pub fn with_filter_policy(mut self, policy: FilterPolicy) -> Self {
        self.filter_policy = policy;
        self
    }

    /// Count rows of `entity` matching `filter`
    pub async fn count(
        &self,
        conn: &dyn Connection,
        entity: &str,
        filter: Option<&str>,
    ) -> Result<u64> {
        self.count_rows(conn, entity, filter).await.inspect_err(|e| e.log_chain("count"))
    }

    /// Fetch one page
    pub async fn query(&self, conn: &dyn Connection, request: &QueryRequest) -> Result<QueryPage> {
        self.fetch_page(conn, request)
            .await
            .inspect_err(|e| e.log_chain("query"))
    }

    async fn count_rows(
        &self,
        conn: &dyn Connection,
        entity: &str,
        filter: Option<&str>,
    ) -> Result<u64> {
        let filter = self.screen_filter(filter)?;
        let stmt = self.dialect.count_sql(entity, filter)?;
        debug!(sql = %stmt.sql(), "Counting rows");

        let rows = conn.query_statement(&stmt).await?;
        let count = rows
            .first()
            .and_then(|row| row.get(0))
            .and_then(|v| v.as_i64())
            .ok_or_else(|| Error::execution_with_sql("count returned no value", stmt.sql()))?;
        u64::try_from(count)
            .map_err(|_| Error::execution_with_sql(format!("count returned {}", count), stmt.sql()))
    }

    async fn fetch_page(&self, conn: &dyn Connection, request: &QueryRequest) -> Result<QueryPage> {
        let cursor = request.parsed_cursor()?;
        if request.page_size == Some(0) {
            return Err(Error::invalid_argument("page size must be positive"));
        }
        let filter = request.filter_expression.as_deref();
        let page = request.page_size.map(|size| Page {
            offset: cursor.map_or(0, Cursor::offset),
            size,
        });

        let stmt = self.dialect.select_sql(
            &request.entity_identifier,
            &request.selected_field_names,
            self.screen_filter(filter)?,
            page,
        )?;

        let next_cursor = match page {
            Some(page) => {
                let total = self
                    .count_rows(conn, &request.entity_identifier, filter)
                    .await?;
                Cursor::next_page(page.offset, page.size, total)
            }
            None => None,
        };

        debug!(sql = %stmt.sql(), "Selecting rows");
        let rows = conn.query_statement(&stmt).await?;

        let records = rows
            .iter()
            .map(|row| {
                let mut object = serde_json::Map::with_capacity(request.selected_field_names.len());
                for (i, field) in request.selected_field_names.iter().enumerate() {
                    let value = row
                        .get(i)
                        .and_then(|v| v.as_string())
                        .map_or(serde_json::Value::Null, serde_json::Value::String);
                    object.insert(field.clone(), value);
                }
                serde_json::to_string(&object)
                    .map_err(|e| Error::execution(format!("failed to encode row: {}", e)))
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            entity = %request.entity_identifier,
            rows = records.len(),
            next_cursor = ?next_cursor.map(Cursor::offset),
            "Query page fetched"
        );
        Ok(QueryPage {
            records,
            next_cursor,
        })
    }

    fn screen_filter<'a>(&self, filter: Option<&'a str>) -> Result<Option<&'a str>> {
        match filter.filter(|f| !f.trim().is_empty()) {
            Some(f) => {
                self.filter_policy.check(f)?;
                Ok(Some(f))
            }
            None => Ok(None),
        }
    }
}
