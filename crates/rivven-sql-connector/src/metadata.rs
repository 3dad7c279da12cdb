//! Portable entity and field descriptors
//!
//! These are the shapes the connector hands back to the glue layer after
//! introspecting the database.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::type_map::{map_native_type, FieldDataType};

/// Write operation kinds supported by the batch writer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteOperationType {
    /// Plain insert
    Insert,
    /// Update by a single identifying field
    Update,
    /// Replace-semantics insert
    Upsert,
}

impl WriteOperationType {
    /// Every supported write operation, in declaration order
    pub const ALL: [WriteOperationType; 3] = [Self::Insert, Self::Update, Self::Upsert];

    /// Upper-case operation name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Upsert => "UPSERT",
        }
    }
}

impl fmt::Display for WriteOperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queryable table-like object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Entity {
    /// Table name
    pub entity_identifier: String,
    /// Display label
    pub label: String,
    /// Human readable description
    pub description: String,
    /// Whether the entity has child entities (never for tables)
    pub has_nested_entities: bool,
}

impl Entity {
    /// Entity for a plain table; label and description repeat the name.
    pub fn table(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            description: name.clone(),
            entity_identifier: name,
            has_nested_entities: false,
        }
    }
}

/// Read capabilities of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReadOperationProperty {
    /// Usable in filter expressions
    pub is_queryable: bool,
    /// Returned by queries
    pub is_retrievable: bool,
}

/// Write capabilities of a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct WriteOperationProperty {
    /// Accepts NULL
    pub is_nullable: bool,
    /// May be changed by UPDATE
    pub is_updatable: bool,
    /// May be set on INSERT
    pub is_creatable: bool,
    /// Database assigns a value when omitted on create
    pub is_defaulted_on_create: bool,
    /// Operations this field participates in
    pub supported_write_operations: Vec<WriteOperationType>,
}

/// Description of one column of an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FieldDefinition {
    /// Column name
    pub field_name: String,
    /// Portable data type
    pub data_type: FieldDataType,
    /// Native type as reported by the catalog, e.g. `decimal(10,2)`
    pub data_type_label: String,
    /// Display label
    pub label: String,
    /// Column is part of the primary key
    pub is_primary_key: bool,
    /// Read capabilities
    pub read_properties: ReadOperationProperty,
    /// Write capabilities
    pub write_properties: WriteOperationProperty,
}

impl FieldDefinition {
    /// Build a column descriptor from its catalog type name.
    ///
    /// Primary keys are never defaulted on create; every other column is.
    pub fn column(name: impl Into<String>, native_type: &str, is_primary_key: bool) -> Self {
        let name = name.into();
        Self {
            data_type: map_native_type(native_type),
            data_type_label: native_type.to_string(),
            label: name.clone(),
            field_name: name,
            is_primary_key,
            read_properties: ReadOperationProperty {
                is_queryable: true,
                is_retrievable: true,
            },
            write_properties: WriteOperationProperty {
                is_nullable: true,
                is_updatable: true,
                is_creatable: true,
                is_defaulted_on_create: !is_primary_key,
                supported_write_operations: WriteOperationType::ALL.to_vec(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_table() {
        let entity = Entity::table("orders");
        assert_eq!(entity.entity_identifier, "orders");
        assert_eq!(entity.label, "orders");
        assert_eq!(entity.description, "orders");
        assert!(!entity.has_nested_entities);
    }

    #[test]
    fn test_primary_key_not_defaulted() {
        let pk = FieldDefinition::column("id", "int", true);
        assert!(pk.is_primary_key);
        assert_eq!(pk.data_type, FieldDataType::Integer);
        assert!(!pk.write_properties.is_defaulted_on_create);

        let col = FieldDefinition::column("total", "decimal(10,2)", false);
        assert!(col.write_properties.is_defaulted_on_create);
        assert_eq!(col.data_type, FieldDataType::Double);
        assert_eq!(col.data_type_label, "decimal(10,2)");
        assert_eq!(col.label, "total");
        assert_eq!(
            col.write_properties.supported_write_operations,
            vec![
                WriteOperationType::Insert,
                WriteOperationType::Update,
                WriteOperationType::Upsert
            ]
        );
    }

    #[test]
    fn test_write_operation_serde() {
        let json = serde_json::to_string(&WriteOperationType::Upsert).unwrap();
        assert_eq!(json, "\"UPSERT\"");
        let op: WriteOperationType = serde_json::from_str("\"UPDATE\"").unwrap();
        assert_eq!(op, WriteOperationType::Update);
    }
}
