use std::collections::BTreeSet;

use sqlx::PgPool;

use rowforge_core::{DatabaseSchema, Result, SCHEMA_VERSION, Schema, Table};

use crate::adapter::Adapter;
use crate::options::IntrospectOptions;

mod mapper;
mod queries;

/// Adapter for PostgreSQL databases.
#[derive(Debug, Clone)]
pub struct PostgresAdapter {
    pool: PgPool,
}

impl PostgresAdapter {
    /// Create a new adapter using a pre-configured pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl Adapter for PostgresAdapter {
    fn engine(&self) -> &'static str {
        "postgres"
    }

    async fn introspect(&self, opts: &IntrospectOptions) -> Result<DatabaseSchema> {
        introspect(&self.pool, opts).await
    }
}

/// Introspect Postgres with default options.
pub async fn introspect_postgres(pool: &PgPool) -> Result<DatabaseSchema> {
    introspect_postgres_with_options(pool, IntrospectOptions::default()).await
}

/// Introspect Postgres with caller-provided options.
pub async fn introspect_postgres_with_options(
    pool: &PgPool,
    opts: IntrospectOptions,
) -> Result<DatabaseSchema> {
    introspect(pool, &opts).await
}

/// Introspect a Postgres database according to the provided options.
///
/// A failure while listing namespaces degrades to an empty snapshot; any later
/// metadata query failure aborts with `Error::Catalog`.
pub async fn introspect(pool: &PgPool, opts: &IntrospectOptions) -> Result<DatabaseSchema> {
    let database = queries::fetch_database_name(pool).await?;

    let raw_schemas = match queries::list_schemas(pool).await {
        Ok(schemas) => schemas,
        Err(err) => {
            tracing::warn!(error = %err, "schema discovery failed; continuing with no schemas");
            Vec::new()
        }
    };
    let schemas = mapper::filter_schemas(raw_schemas, opts);
    let enums = mapper::map_enums(queries::list_enums(pool).await?, opts);

    let mut schema_items = Vec::new();
    for schema_name in &schemas {
        let mut tables = Vec::new();
        for table_name in queries::list_base_tables(pool, schema_name).await? {
            let raw_columns = queries::list_columns(pool, schema_name, &table_name).await?;
            let raw_keys = queries::list_key_constraints(pool, schema_name, &table_name).await?;

            tables.push(Table {
                name: table_name,
                columns: mapper::map_columns(raw_columns),
                constraints: mapper::map_key_constraints(raw_keys),
            });
        }

        tracing::debug!(schema = %schema_name, tables = tables.len(), "introspected schema");
        schema_items.push(Schema {
            name: schema_name.clone(),
            tables,
        });
    }

    let inbound_foreign_keys = if schemas.is_empty() {
        Vec::new()
    } else {
        let captured: BTreeSet<&str> = schemas.iter().map(String::as_str).collect();
        let raw_fks = queries::list_foreign_keys(pool, &schemas).await?;
        mapper::attach_foreign_keys(&mut schema_items, &captured, raw_fks)
    };

    for schema in &mut schema_items {
        for table in &mut schema.tables {
            mapper::sort_constraints(&mut table.constraints);
        }
    }

    let table_count: usize = schema_items.iter().map(|schema| schema.tables.len()).sum();
    tracing::info!(
        schemas = schema_items.len(),
        tables = table_count,
        enums = enums.len(),
        "postgres introspection complete"
    );

    Ok(DatabaseSchema {
        schema_version: SCHEMA_VERSION.to_string(),
        engine: "postgres".to_string(),
        database: Some(database),
        schemas: schema_items,
        enums,
        inbound_foreign_keys,
    })
}
