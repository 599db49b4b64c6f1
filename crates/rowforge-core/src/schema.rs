use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::constraints::{Constraint, ForeignKey, PrimaryKey};
use crate::types::{ColumnType, EnumType, GeneratedExpression, IdentityGeneration};

/// Top-level schema snapshot for a database.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DatabaseSchema {
    /// Contract version for this snapshot format.
    pub schema_version: String,
    /// Database engine identifier (e.g. `postgres`).
    pub engine: String,
    /// Database name when available.
    pub database: Option<String>,
    /// Schemas captured from the database.
    pub schemas: Vec<Schema>,
    /// Enum types captured across schemas.
    pub enums: Vec<EnumType>,
    /// Foreign keys whose child table lives outside the captured schemas but whose
    /// parent is inside one of them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inbound_foreign_keys: Vec<InboundForeignKey>,
}

/// A Postgres namespace containing base tables.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Schema {
    pub name: String,
    pub tables: Vec<Table>,
}

/// A base table with its columns and constraints.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub constraints: Vec<Constraint>,
}

impl Table {
    pub fn primary_key(&self) -> Option<&PrimaryKey> {
        self.constraints.iter().find_map(|constraint| match constraint {
            Constraint::PrimaryKey(pk) => Some(pk),
            _ => None,
        })
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &ForeignKey> {
        self.constraints.iter().filter_map(|constraint| match constraint {
            Constraint::ForeignKey(fk) => Some(fk),
            _ => None,
        })
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }
}

/// A foreign key declared on a table that was not captured.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InboundForeignKey {
    pub schema: String,
    pub table: String,
    pub foreign_key: ForeignKey,
}

/// Column metadata for a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Column {
    pub ordinal_position: i16,
    pub name: String,
    pub column_type: ColumnType,
    pub is_nullable: bool,
    pub default: Option<String>,
    pub identity: Option<IdentityGeneration>,
    pub generated: Option<GeneratedExpression>,
}

impl Column {
    /// Returns true when the database computes the value itself: identity, stored
    /// generated, or serial (`nextval(...)` default) columns.
    pub fn is_database_generated(&self) -> bool {
        self.identity.is_some()
            || self.generated.is_some()
            || self
                .default
                .as_deref()
                .map(|default| default.trim_start().starts_with("nextval("))
                .unwrap_or(false)
    }
}
