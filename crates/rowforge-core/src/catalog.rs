use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constraints::{Constraint, ForeignKey};
use crate::error::Error;
use crate::schema::{Column, DatabaseSchema, Table};

/// `schema.table` identifier, unique across a catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TableKey {
    pub schema: String,
    pub table: String,
}

impl TableKey {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

impl FromStr for TableKey {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.split_once('.') {
            Some((schema, table)) if !schema.is_empty() && !table.is_empty() => {
                Ok(TableKey::new(schema, table))
            }
            _ => Err(Error::InvalidTableKey(value.to_string())),
        }
    }
}

impl From<TableKey> for String {
    fn from(key: TableKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for TableKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Column-level FK edge: `child.child_column -> parent.parent_column`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyEdge {
    pub constraint: Option<String>,
    pub child: TableKey,
    pub child_column: String,
    pub parent: TableKey,
    pub parent_column: String,
}

impl ForeignKeyEdge {
    pub fn is_self_reference(&self) -> bool {
        self.child == self.parent
    }
}

/// A (possibly composite) FK declared on a catalog table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableForeignKey {
    pub name: Option<String>,
    pub parent: TableKey,
    pub columns: Vec<String>,
    pub parent_columns: Vec<String>,
}

/// Everything the engine needs to know about one base table.
#[derive(Debug, Clone)]
pub struct TableEntry {
    pub key: TableKey,
    /// Columns in declaration order.
    pub columns: Vec<Column>,
    /// Identity, stored-generated and serial columns; never written.
    pub generated: BTreeSet<String>,
    pub primary_key: Vec<String>,
    /// Columns covered by a single-column unique or primary key constraint.
    pub unique_columns: BTreeSet<String>,
    /// Columns captured into the key pool after each insert: the primary key followed
    /// by any other column referenced by an incoming FK.
    pub key_columns: Vec<String>,
    pub foreign_keys: Vec<TableForeignKey>,
}

impl TableEntry {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Columns the engine may write, in declaration order.
    pub fn writable_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .filter(|column| !self.generated.contains(&column.name))
    }

    /// Returns true if `column` is the child side of any FK on this table.
    pub fn is_foreign_key_column(&self, column: &str) -> bool {
        self.foreign_keys
            .iter()
            .any(|fk| fk.columns.iter().any(|name| name == column))
    }
}

/// Introspected table/column/FK maps for a set of schemas.
#[derive(Debug, Clone)]
pub struct Catalog {
    order: Vec<TableKey>,
    tables: BTreeMap<TableKey, TableEntry>,
    edges: Vec<ForeignKeyEdge>,
    enums: BTreeMap<(String, String), Vec<String>>,
    fingerprint: String,
}

impl Catalog {
    /// Build the catalog maps from an introspected snapshot.
    pub fn from_schema(schema: &DatabaseSchema) -> Self {
        let mut order = Vec::new();
        let mut tables = BTreeMap::new();
        let mut edges = Vec::new();

        for db_schema in &schema.schemas {
            for table in &db_schema.tables {
                let key = TableKey::new(&db_schema.name, &table.name);
                for fk in table.foreign_keys() {
                    edges.extend(edges_for(&key, fk));
                }
                order.push(key.clone());
                tables.insert(key.clone(), build_entry(key, table));
            }
        }

        for inbound in &schema.inbound_foreign_keys {
            let child = TableKey::new(&inbound.schema, &inbound.table);
            edges.extend(edges_for(&child, &inbound.foreign_key));
        }

        for edge in &edges {
            if let Some(parent) = tables.get_mut(&edge.parent)
                && !parent.key_columns.contains(&edge.parent_column)
            {
                parent.key_columns.push(edge.parent_column.clone());
            }
        }

        let enums = schema
            .enums
            .iter()
            .map(|item| ((item.schema.clone(), item.name.clone()), item.labels.clone()))
            .collect();

        let fingerprint = fingerprint(&order, &tables, &edges);

        Self {
            order,
            tables,
            edges,
            enums,
            fingerprint,
        }
    }

    /// Table keys in discovery order.
    pub fn table_keys(&self) -> &[TableKey] {
        &self.order
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableEntry> {
        self.order.iter().filter_map(|key| self.tables.get(key))
    }

    pub fn table(&self, key: &TableKey) -> Option<&TableEntry> {
        self.tables.get(key)
    }

    pub fn contains(&self, key: &TableKey) -> bool {
        self.tables.contains_key(key)
    }

    pub fn columns(&self, key: &TableKey) -> &[Column] {
        self.tables
            .get(key)
            .map(|entry| entry.columns.as_slice())
            .unwrap_or(&[])
    }

    pub fn generated_columns(&self, key: &TableKey) -> Option<&BTreeSet<String>> {
        self.tables.get(key).map(|entry| &entry.generated)
    }

    pub fn primary_key(&self, key: &TableKey) -> &[String] {
        self.tables
            .get(key)
            .map(|entry| entry.primary_key.as_slice())
            .unwrap_or(&[])
    }

    pub fn key_columns(&self, key: &TableKey) -> &[String] {
        self.tables
            .get(key)
            .map(|entry| entry.key_columns.as_slice())
            .unwrap_or(&[])
    }

    pub fn foreign_keys(&self, child: &TableKey) -> &[TableForeignKey] {
        self.tables
            .get(child)
            .map(|entry| entry.foreign_keys.as_slice())
            .unwrap_or(&[])
    }

    /// Every FK edge touching the captured schemas, self references included.
    pub fn edges(&self) -> &[ForeignKeyEdge] {
        &self.edges
    }

    /// Parents of each catalog table in discovery order, self references removed.
    pub fn parent_map(&self) -> Vec<(TableKey, Vec<TableKey>)> {
        self.tables()
            .map(|entry| {
                let mut parents: Vec<TableKey> = Vec::new();
                for fk in &entry.foreign_keys {
                    if fk.parent != entry.key && !parents.contains(&fk.parent) {
                        parents.push(fk.parent.clone());
                    }
                }
                (entry.key.clone(), parents)
            })
            .collect()
    }

    pub fn enum_labels(&self, column: &Column) -> Option<&[String]> {
        self.enums
            .get(&(
                column.column_type.udt_schema.clone(),
                column.column_type.udt_name.clone(),
            ))
            .map(Vec::as_slice)
    }

    /// Stable SHA-256 digest of tables, columns and FK edges.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn build_entry(key: TableKey, table: &Table) -> TableEntry {
    let mut columns = table.columns.clone();
    columns.sort_by_key(|column| column.ordinal_position);

    let generated = columns
        .iter()
        .filter(|column| column.is_database_generated())
        .map(|column| column.name.clone())
        .collect();

    let primary_key = table
        .primary_key()
        .map(|pk| pk.columns.clone())
        .unwrap_or_default();

    let mut unique_columns = BTreeSet::new();
    for constraint in &table.constraints {
        let single = match constraint {
            Constraint::PrimaryKey(pk) if pk.columns.len() == 1 => pk.columns.first(),
            Constraint::Unique(unique) if unique.columns.len() == 1 => unique.columns.first(),
            _ => None,
        };
        if let Some(column) = single {
            unique_columns.insert(column.clone());
        }
    }

    let foreign_keys = table
        .foreign_keys()
        .map(|fk| TableForeignKey {
            name: fk.name.clone(),
            parent: TableKey::new(&fk.referenced_schema, &fk.referenced_table),
            columns: fk.columns.clone(),
            parent_columns: fk.referenced_columns.clone(),
        })
        .collect();

    TableEntry {
        key,
        columns,
        generated,
        key_columns: primary_key.clone(),
        primary_key,
        unique_columns,
        foreign_keys,
    }
}

fn edges_for(child: &TableKey, fk: &ForeignKey) -> Vec<ForeignKeyEdge> {
    let parent = TableKey::new(&fk.referenced_schema, &fk.referenced_table);
    fk.column_pairs()
        .map(|(child_column, parent_column)| ForeignKeyEdge {
            constraint: fk.name.clone(),
            child: child.clone(),
            child_column: child_column.clone(),
            parent: parent.clone(),
            parent_column: parent_column.clone(),
        })
        .collect()
}

fn fingerprint(
    order: &[TableKey],
    tables: &BTreeMap<TableKey, TableEntry>,
    edges: &[ForeignKeyEdge],
) -> String {
    let mut hasher = Sha256::new();
    for key in order {
        let Some(entry) = tables.get(key) else {
            continue;
        };
        hasher.update(key.to_string().as_bytes());
        for column in &entry.columns {
            hasher.update(
                format!(
                    "|{}:{}:{}",
                    column.name, column.column_type.data_type, column.is_nullable
                )
                .as_bytes(),
            );
        }
        hasher.update(b"\n");
    }
    for edge in edges {
        hasher.update(
            format!(
                "{}.{}>{}.{}\n",
                edge.child, edge.child_column, edge.parent, edge.parent_column
            )
            .as_bytes(),
        );
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::PrimaryKey;
    use crate::schema::Schema;
    use crate::types::{ColumnType, IdentityGeneration};

    fn column(position: i16, name: &str, data_type: &str, nullable: bool) -> Column {
        Column {
            ordinal_position: position,
            name: name.to_string(),
            column_type: ColumnType::simple(data_type),
            is_nullable: nullable,
            default: None,
            identity: None,
            generated: None,
        }
    }

    fn fk(columns: &[&str], table: &str, referenced: &[&str]) -> Constraint {
        Constraint::ForeignKey(ForeignKey {
            name: Some(format!("fk_{table}")),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            referenced_schema: "public".to_string(),
            referenced_table: table.to_string(),
            referenced_columns: referenced.iter().map(|c| c.to_string()).collect(),
            is_deferrable: false,
        })
    }

    fn snapshot() -> DatabaseSchema {
        let mut id = column(1, "id", "integer", false);
        id.default = Some("nextval('users_id_seq'::regclass)".to_string());
        let mut order_id = column(1, "id", "bigint", false);
        order_id.identity = Some(IdentityGeneration::Always);

        DatabaseSchema {
            schema_version: "0.1".to_string(),
            engine: "postgres".to_string(),
            database: None,
            schemas: vec![Schema {
                name: "public".to_string(),
                tables: vec![
                    Table {
                        name: "users".to_string(),
                        columns: vec![column(2, "email", "text", false), id],
                        constraints: vec![Constraint::PrimaryKey(PrimaryKey {
                            name: None,
                            columns: vec!["id".to_string()],
                        })],
                    },
                    Table {
                        name: "orders".to_string(),
                        columns: vec![
                            order_id,
                            column(2, "user_email", "text", true),
                            column(3, "parent_id", "bigint", true),
                        ],
                        constraints: vec![
                            fk(&["user_email"], "users", &["email"]),
                            fk(&["parent_id"], "orders", &["id"]),
                        ],
                    },
                ],
            }],
            enums: Vec::new(),
            inbound_foreign_keys: Vec::new(),
        }
    }

    #[test]
    fn table_key_round_trips_through_display() {
        let key: TableKey = "app.users".parse().expect("valid key");
        assert_eq!(key, TableKey::new("app", "users"));
        assert_eq!(key.to_string(), "app.users");
        assert!("users".parse::<TableKey>().is_err());
    }

    #[test]
    fn columns_keep_declaration_order_and_generated_set() {
        let catalog = Catalog::from_schema(&snapshot());
        let users = TableKey::new("public", "users");
        let names: Vec<&str> = catalog
            .columns(&users)
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["id", "email"]);
        assert!(catalog.generated_columns(&users).unwrap().contains("id"));

        let orders = TableKey::new("public", "orders");
        assert!(catalog.generated_columns(&orders).unwrap().contains("id"));
    }

    #[test]
    fn referenced_unique_columns_join_key_columns() {
        let catalog = Catalog::from_schema(&snapshot());
        let users = TableKey::new("public", "users");
        assert_eq!(catalog.key_columns(&users), &["id", "email"]);
    }

    #[test]
    fn parent_map_drops_self_references() {
        let catalog = Catalog::from_schema(&snapshot());
        let parents = catalog.parent_map();
        let orders = parents
            .iter()
            .find(|(key, _)| key.table == "orders")
            .map(|(_, parents)| parents.clone())
            .unwrap();
        assert_eq!(orders, vec![TableKey::new("public", "users")]);
        assert!(catalog.edges().iter().any(ForeignKeyEdge::is_self_reference));
    }

    #[test]
    fn fingerprint_is_stable() {
        let first = Catalog::from_schema(&snapshot());
        let second = Catalog::from_schema(&snapshot());
        assert_eq!(first.fingerprint(), second.fingerprint());
        assert_eq!(first.fingerprint().len(), 64);
    }
}
