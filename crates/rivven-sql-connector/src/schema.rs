//! Schema discovery
//!
//! Lists base tables of the connected database and describes their columns
//! as portable [`FieldDefinition`]s. Nothing is cached: every call reads the
//! live catalog.

use std::sync::Arc;
use tracing::debug;

use crate::connection::Connection;
use crate::dialect::SqlDialect;
use crate::error::{Error, Result};
use crate::metadata::{Entity, FieldDefinition};
use crate::types::Row;

/// Column of a `DESCRIBE` row holding the column name
const DESCRIBE_FIELD: &str = "Field";
/// Column of a `DESCRIBE` row holding the native type
const DESCRIBE_TYPE: &str = "Type";
/// Column of a `DESCRIBE` row holding the key indicator
const DESCRIBE_KEY: &str = "Key";
/// Key indicator of primary key columns
const PRIMARY_KEY: &str = "PRI";

/// Reads entities and fields from the catalog
#[derive(Debug, Clone)]
pub struct SchemaIntrospector {
    dialect: Arc<dyn SqlDialect>,
}

impl SchemaIntrospector {
    /// Create an introspector for a dialect
    pub fn new(dialect: Arc<dyn SqlDialect>) -> Self {
        Self { dialect }
    }

    /// List base tables of the current database.
    ///
    /// Order follows the catalog and carries no meaning.
    pub async fn list_entities(&self, conn: &dyn Connection) -> Result<Vec<Entity>> {
        let sql = self.dialect.list_tables_sql();
        debug!(sql = %sql, "Listing entities");

        let rows = conn.query(&sql, &[]).await.map_err(|e| e.with_sql(&sql))?;
        rows.iter()
            .map(|row| {
                row.get(0)
                    .and_then(|v| v.as_string())
                    .map(Entity::table)
                    .ok_or_else(|| Error::catalog("table listing returned a row without a name"))
            })
            .collect()
    }

    /// Describe the columns of `entity`, in catalog order.
    ///
    /// Fails with [`Error::EntityNotFound`] when no such table exists.
    pub async fn describe_fields(
        &self,
        conn: &dyn Connection,
        entity: &str,
    ) -> Result<Vec<FieldDefinition>> {
        let describe = self.dialect.describe_sql(entity)?;

        if !self.entity_exists(conn, entity).await? {
            return Err(Error::entity_not_found(entity));
        }

        debug!(entity = %entity, sql = %describe.sql(), "Describing entity");
        let rows = conn.query_statement(&describe).await?;
        let fields = rows
            .iter()
            .map(field_from_describe_row)
            .collect::<Result<Vec<_>>>()?;

        debug!(entity = %entity, fields = fields.len(), "Entity described");
        Ok(fields)
    }

    async fn entity_exists(&self, conn: &dyn Connection, entity: &str) -> Result<bool> {
        let sql = self.dialect.table_exists_sql(entity);
        let rows = conn.query(&sql, &[]).await.map_err(|e| e.with_sql(&sql))?;
        let count = rows
            .first()
            .and_then(|row| row.get(0))
            .and_then(|v| v.as_i64())
            .ok_or_else(|| Error::catalog("table existence probe returned no count"))?;
        Ok(count > 0)
    }
}

fn field_from_describe_row(row: &Row) -> Result<FieldDefinition> {
    let text = |column: &str| -> Result<String> {
        row.get_by_name(column)
            .and_then(|v| v.as_string())
            .ok_or_else(|| {
                Error::catalog(format!("column metadata is missing '{}'", column))
            })
    };

    let name = text(DESCRIBE_FIELD)?;
    let native_type = text(DESCRIBE_TYPE)?;
    // Key is empty, never NULL, for non-indexed columns
    let is_primary_key = row
        .get_by_name(DESCRIBE_KEY)
        .ok_or_else(|| Error::catalog(format!("column metadata is missing '{}'", DESCRIBE_KEY)))?
        .as_string()
        .is_some_and(|k| k.eq_ignore_ascii_case(PRIMARY_KEY));

    Ok(FieldDefinition::column(name, &native_type, is_primary_key))
}
