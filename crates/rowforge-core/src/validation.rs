use std::collections::{BTreeMap, BTreeSet};

use crate::constraints::Constraint;
use crate::error::{Error, Result};
use crate::schema::DatabaseSchema;

/// Validate internal consistency of a schema snapshot before building a catalog.
///
/// Rejects duplicate tables/columns, PK/unique/FK columns that do not exist, and FKs
/// whose column lists differ in length. FKs may point outside the snapshot; only
/// references into captured tables are checked for column existence.
pub fn validate_schema(schema: &DatabaseSchema) -> Result<()> {
    let mut columns_by_table: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();

    for db_schema in &schema.schemas {
        for table in &db_schema.tables {
            let key = format!("{}.{}", db_schema.name, table.name);
            let mut names = BTreeSet::new();
            for column in &table.columns {
                if !names.insert(column.name.as_str()) {
                    return Err(Error::InvalidSchema(format!(
                        "duplicate column name: {key}.{}",
                        column.name
                    )));
                }
            }
            if columns_by_table.insert(key.clone(), names).is_some() {
                return Err(Error::InvalidSchema(format!("duplicate table name: {key}")));
            }
        }
    }

    for db_schema in &schema.schemas {
        for table in &db_schema.tables {
            let key = format!("{}.{}", db_schema.name, table.name);
            let own = &columns_by_table[&key];

            for constraint in &table.constraints {
                if let Some(missing) = constraint
                    .columns()
                    .iter()
                    .find(|c| !own.contains(c.as_str()))
                {
                    return Err(Error::InvalidSchema(format!(
                        "{} column not found: {key}.{missing}",
                        constraint.kind()
                    )));
                }

                let Constraint::ForeignKey(fk) = constraint else {
                    continue;
                };
                if fk.columns.len() != fk.referenced_columns.len() {
                    return Err(Error::InvalidSchema(format!(
                        "foreign key on {key} maps {} columns to {}",
                        fk.columns.len(),
                        fk.referenced_columns.len()
                    )));
                }
                let parent = format!("{}.{}", fk.referenced_schema, fk.referenced_table);
                if let Some(parent_columns) = columns_by_table.get(&parent)
                    && let Some(missing) = fk
                        .referenced_columns
                        .iter()
                        .find(|c| !parent_columns.contains(c.as_str()))
                {
                    return Err(Error::InvalidSchema(format!(
                        "referenced column not found: {parent}.{missing}"
                    )));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{ForeignKey, PrimaryKey};
    use crate::schema::{Column, Schema, Table};
    use crate::types::ColumnType;

    fn column(name: &str) -> Column {
        Column {
            ordinal_position: 1,
            name: name.to_string(),
            column_type: ColumnType::simple("integer"),
            is_nullable: false,
            default: None,
            identity: None,
            generated: None,
        }
    }

    fn snapshot(tables: Vec<Table>) -> DatabaseSchema {
        DatabaseSchema {
            schema_version: "0.1".to_string(),
            engine: "postgres".to_string(),
            database: None,
            schemas: vec![Schema {
                name: "public".to_string(),
                tables,
            }],
            enums: Vec::new(),
            inbound_foreign_keys: Vec::new(),
        }
    }

    #[test]
    fn rejects_missing_primary_key_column() {
        let schema = snapshot(vec![Table {
            name: "users".to_string(),
            columns: vec![column("id")],
            constraints: vec![Constraint::PrimaryKey(PrimaryKey {
                name: None,
                columns: vec!["uid".to_string()],
            })],
        }]);
        let err = validate_schema(&schema).expect_err("missing column");
        assert!(err.to_string().contains("public.users.uid"));
    }

    #[test]
    fn rejects_missing_referenced_column() {
        let schema = snapshot(vec![
            Table {
                name: "users".to_string(),
                columns: vec![column("id")],
                constraints: Vec::new(),
            },
            Table {
                name: "orders".to_string(),
                columns: vec![column("user_id")],
                constraints: vec![Constraint::ForeignKey(ForeignKey {
                    name: None,
                    columns: vec!["user_id".to_string()],
                    referenced_schema: "public".to_string(),
                    referenced_table: "users".to_string(),
                    referenced_columns: vec!["uuid".to_string()],
                    is_deferrable: false,
                })],
            },
        ]);
        assert!(validate_schema(&schema).is_err());
    }

    #[test]
    fn accepts_references_outside_snapshot() {
        let schema = snapshot(vec![Table {
            name: "orders".to_string(),
            columns: vec![column("tenant_id")],
            constraints: vec![Constraint::ForeignKey(ForeignKey {
                name: None,
                columns: vec!["tenant_id".to_string()],
                referenced_schema: "shared".to_string(),
                referenced_table: "tenants".to_string(),
                referenced_columns: vec!["id".to_string()],
                is_deferrable: false,
            })],
        }]);
        assert!(validate_schema(&schema).is_ok());
    }
}
