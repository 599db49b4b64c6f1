use std::collections::BTreeSet;

use rowforge_core::{
    Column, ColumnType, Constraint, EnumType, ForeignKey, GeneratedExpression, IdentityGeneration,
    InboundForeignKey, PrimaryKey, Schema, UniqueConstraint,
};

use crate::options::IntrospectOptions;

use super::queries::{RawColumn, RawEnumType, RawForeignKey, RawKeyConstraint};

fn is_system_schema(schema: &str) -> bool {
    schema.starts_with("pg_") || schema == "information_schema"
}

pub fn filter_schemas(raw: Vec<String>, opts: &IntrospectOptions) -> Vec<String> {
    raw.into_iter()
        .filter(|schema| match &opts.include_schemas {
            Some(list) => list.iter().any(|item| item == schema),
            None => opts.include_system_schemas || !is_system_schema(schema),
        })
        .filter(|schema| !opts.exclude_schemas.iter().any(|item| item == schema))
        .collect()
}

pub fn map_columns(raw: Vec<RawColumn>) -> Vec<Column> {
    raw.into_iter()
        .map(|col| Column {
            ordinal_position: col.ordinal_position,
            name: col.name,
            column_type: ColumnType {
                data_type: col.data_type,
                udt_schema: col.udt_schema,
                udt_name: col.udt_name,
                character_max_length: col.character_max_length,
                numeric_precision: col.numeric_precision,
                numeric_scale: col.numeric_scale,
            },
            is_nullable: col.is_nullable,
            default: col.column_default,
            identity: identity_from_text(col.identity_generation.as_deref()),
            generated: col.is_generated.then(|| GeneratedExpression {
                expression: col.generation_expression,
            }),
        })
        .collect()
}

fn identity_from_text(value: Option<&str>) -> Option<IdentityGeneration> {
    match value?.to_ascii_uppercase().as_str() {
        "ALWAYS" => Some(IdentityGeneration::Always),
        "BY DEFAULT" => Some(IdentityGeneration::ByDefault),
        _ => None,
    }
}

pub fn map_key_constraints(raw: Vec<RawKeyConstraint>) -> Vec<Constraint> {
    raw.into_iter()
        .filter_map(|key| match key.kind.as_str() {
            "p" => Some(Constraint::PrimaryKey(PrimaryKey {
                name: Some(key.name),
                columns: key.columns,
            })),
            "u" => Some(Constraint::Unique(UniqueConstraint {
                name: Some(key.name),
                columns: key.columns,
            })),
            _ => None,
        })
        .collect()
}

/// Attach each FK to its captured child table. FKs whose child lies outside the
/// captured schemas but whose parent is inside are returned as inbound references.
pub fn attach_foreign_keys(
    schemas: &mut [Schema],
    captured: &BTreeSet<&str>,
    raw: Vec<RawForeignKey>,
) -> Vec<InboundForeignKey> {
    let mut inbound = Vec::new();

    for fk in raw {
        let schema_name = fk.schema;
        let table_name = fk.table_name;
        let foreign_key = ForeignKey {
            name: Some(fk.name),
            columns: fk.columns,
            referenced_schema: fk.referenced_schema,
            referenced_table: fk.referenced_table,
            referenced_columns: fk.referenced_columns,
            is_deferrable: fk.is_deferrable,
        };

        let child = schemas
            .iter_mut()
            .filter(|schema| schema.name == schema_name)
            .flat_map(|schema| schema.tables.iter_mut())
            .find(|table| table.name == table_name);

        match child {
            Some(table) => table.constraints.push(Constraint::ForeignKey(foreign_key)),
            None if captured.contains(foreign_key.referenced_schema.as_str()) => {
                inbound.push(InboundForeignKey {
                    schema: schema_name,
                    table: table_name,
                    foreign_key,
                });
            }
            None => {}
        }
    }

    inbound
}

/// Enums are kept for every non-system schema so columns can resolve labels of
/// types declared outside the captured set.
pub fn map_enums(raw: Vec<RawEnumType>, opts: &IntrospectOptions) -> Vec<EnumType> {
    raw.into_iter()
        .filter(|en| opts.include_system_schemas || !is_system_schema(&en.schema))
        .map(|en| EnumType {
            schema: en.schema,
            name: en.name,
            labels: en.labels,
        })
        .collect()
}

pub fn sort_constraints(constraints: &mut [Constraint]) {
    constraints.sort_by_key(constraint_key);
}

fn constraint_key(constraint: &Constraint) -> (u8, String, String) {
    match constraint {
        Constraint::PrimaryKey(pk) => (
            0,
            pk.name.clone().unwrap_or_default(),
            pk.columns.join("|"),
        ),
        Constraint::Unique(unique) => (
            1,
            unique.name.clone().unwrap_or_default(),
            unique.columns.join("|"),
        ),
        Constraint::ForeignKey(fk) => (
            2,
            fk.name.clone().unwrap_or_default(),
            fk.columns.join("|"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowforge_core::Table;

    fn schema(name: &str, tables: &[&str]) -> Schema {
        Schema {
            name: name.to_string(),
            tables: tables
                .iter()
                .map(|table| Table {
                    name: table.to_string(),
                    columns: Vec::new(),
                    constraints: Vec::new(),
                })
                .collect(),
        }
    }

    fn raw_fk(schema: &str, table: &str, parent_schema: &str, parent: &str) -> RawForeignKey {
        RawForeignKey {
            name: format!("{table}_{parent}_fkey"),
            schema: schema.to_string(),
            table_name: table.to_string(),
            columns: vec![format!("{parent}_id")],
            referenced_schema: parent_schema.to_string(),
            referenced_table: parent.to_string(),
            referenced_columns: vec!["id".to_string()],
            is_deferrable: false,
        }
    }

    #[test]
    fn filters_system_and_excluded_schemas() {
        let raw = vec![
            "app".to_string(),
            "audit".to_string(),
            "information_schema".to_string(),
            "pg_catalog".to_string(),
            "public".to_string(),
        ];
        let opts = IntrospectOptions {
            exclude_schemas: vec!["audit".to_string()],
            ..IntrospectOptions::default()
        };
        assert_eq!(filter_schemas(raw, &opts), vec!["app", "public"]);
    }

    #[test]
    fn include_list_wins_over_system_filter() {
        let raw = vec!["app".to_string(), "public".to_string()];
        let opts = IntrospectOptions::with_schemas(vec!["public".to_string()], Vec::new());
        assert_eq!(filter_schemas(raw, &opts), vec!["public"]);
    }

    #[test]
    fn foreign_keys_attach_to_child_or_become_inbound() {
        let mut schemas = vec![schema("app", &["users", "orders"])];
        let captured: BTreeSet<&str> = ["app"].into_iter().collect();
        let inbound = attach_foreign_keys(
            &mut schemas,
            &captured,
            vec![
                raw_fk("app", "orders", "app", "users"),
                raw_fk("audit", "events", "app", "users"),
            ],
        );

        let orders = &schemas[0].tables[1];
        assert_eq!(orders.foreign_keys().count(), 1);
        assert_eq!(inbound.len(), 1);
        assert_eq!(inbound[0].table, "events");
        assert_eq!(inbound[0].foreign_key.referenced_table, "users");
    }

    #[test]
    fn maps_identity_and_generated_columns() {
        let columns = map_columns(vec![RawColumn {
            ordinal_position: 1,
            name: "id".to_string(),
            data_type: "bigint".to_string(),
            udt_schema: "pg_catalog".to_string(),
            udt_name: "int8".to_string(),
            is_nullable: false,
            column_default: None,
            identity_generation: Some("BY DEFAULT".to_string()),
            is_generated: false,
            generation_expression: None,
            character_max_length: None,
            numeric_precision: Some(64),
            numeric_scale: Some(0),
        }]);
        assert_eq!(columns[0].identity, Some(IdentityGeneration::ByDefault));
        assert!(columns[0].generated.is_none());
        assert!(columns[0].is_database_generated());
    }

    #[test]
    fn primary_key_sorts_before_foreign_keys() {
        let mut constraints = vec![
            Constraint::ForeignKey(ForeignKey {
                name: Some("a_fkey".to_string()),
                columns: vec!["user_id".to_string()],
                referenced_schema: "app".to_string(),
                referenced_table: "users".to_string(),
                referenced_columns: vec!["id".to_string()],
                is_deferrable: false,
            }),
            Constraint::PrimaryKey(PrimaryKey {
                name: Some("z_pkey".to_string()),
                columns: vec!["id".to_string()],
            }),
        ];
        sort_constraints(&mut constraints);
        assert!(matches!(constraints[0], Constraint::PrimaryKey(_)));
    }
}
