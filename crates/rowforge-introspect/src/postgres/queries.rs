use sqlx::{FromRow, PgPool};

use rowforge_core::{Error, Result};

fn catalog_error(err: sqlx::Error) -> Error {
    Error::Catalog(err.to_string())
}

pub async fn fetch_database_name(pool: &PgPool) -> Result<String> {
    sqlx::query_scalar::<_, String>("select current_database()::text")
        .fetch_one(pool)
        .await
        .map_err(catalog_error)
}

pub async fn list_schemas(pool: &PgPool) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>("select nspname::text from pg_namespace order by nspname")
        .fetch_all(pool)
        .await
        .map_err(catalog_error)
}

/// Ordinary and partitioned tables; individual partitions are skipped since rows
/// are inserted through their parent.
pub async fn list_base_tables(pool: &PgPool, schema: &str) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        select c.relname::text
        from pg_class c
        join pg_namespace n on n.oid = c.relnamespace
        where n.nspname = $1
          and c.relkind in ('r', 'p')
          and not c.relispartition
        order by c.relname
        "#,
    )
    .bind(schema)
    .fetch_all(pool)
    .await
    .map_err(catalog_error)
}

#[derive(Debug, FromRow)]
pub struct RawColumn {
    pub ordinal_position: i16,
    pub name: String,
    pub data_type: String,
    pub udt_schema: String,
    pub udt_name: String,
    pub is_nullable: bool,
    pub column_default: Option<String>,
    pub identity_generation: Option<String>,
    pub is_generated: bool,
    pub generation_expression: Option<String>,
    pub character_max_length: Option<i32>,
    pub numeric_precision: Option<i32>,
    pub numeric_scale: Option<i32>,
}

pub async fn list_columns(pool: &PgPool, schema: &str, table: &str) -> Result<Vec<RawColumn>> {
    sqlx::query_as::<_, RawColumn>(
        r#"
        select
          c.ordinal_position::int2 as ordinal_position,
          c.column_name::text as name,
          pg_catalog.format_type(a.atttypid, a.atttypmod) as data_type,
          c.udt_schema::text as udt_schema,
          c.udt_name::text as udt_name,
          (c.is_nullable = 'YES') as is_nullable,
          c.column_default::text as column_default,
          c.identity_generation::text as identity_generation,
          (c.is_generated = 'ALWAYS') as is_generated,
          c.generation_expression::text as generation_expression,
          c.character_maximum_length::int4 as character_max_length,
          c.numeric_precision::int4 as numeric_precision,
          c.numeric_scale::int4 as numeric_scale
        from information_schema.columns c
        join pg_namespace n on n.nspname = c.table_schema
        join pg_class rel on rel.relnamespace = n.oid and rel.relname = c.table_name
        join pg_attribute a on a.attrelid = rel.oid and a.attname = c.column_name
        where c.table_schema = $1
          and c.table_name = $2
        order by c.ordinal_position
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(catalog_error)
}

#[derive(Debug, FromRow)]
pub struct RawKeyConstraint {
    pub name: String,
    /// `p` for primary keys, `u` for unique constraints.
    pub kind: String,
    pub columns: Vec<String>,
}

pub async fn list_key_constraints(
    pool: &PgPool,
    schema: &str,
    table: &str,
) -> Result<Vec<RawKeyConstraint>> {
    sqlx::query_as::<_, RawKeyConstraint>(
        r#"
        select
          con.conname::text as name,
          con.contype::text as kind,
          array_agg(att.attname::text order by ord.ordinality) as columns
        from pg_constraint con
        join pg_class rel on rel.oid = con.conrelid
        join pg_namespace nsp on nsp.oid = rel.relnamespace
        join unnest(con.conkey) with ordinality as ord(attnum, ordinality) on true
        join pg_attribute att on att.attrelid = rel.oid and att.attnum = ord.attnum
        where nsp.nspname = $1
          and rel.relname = $2
          and con.contype in ('p', 'u')
        group by con.conname, con.contype
        order by con.contype, con.conname
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(catalog_error)
}

#[derive(Debug, FromRow)]
pub struct RawForeignKey {
    pub name: String,
    pub schema: String,
    pub table_name: String,
    pub columns: Vec<String>,
    pub referenced_schema: String,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    pub is_deferrable: bool,
}

/// Every FK whose child or parent lives in one of `schemas`.
pub async fn list_foreign_keys(pool: &PgPool, schemas: &[String]) -> Result<Vec<RawForeignKey>> {
    sqlx::query_as::<_, RawForeignKey>(
        r#"
        select
          con.conname::text as name,
          src_nsp.nspname::text as schema,
          src_rel.relname::text as table_name,
          array_agg(src_att.attname::text order by cols.ordinality) as columns,
          ref_nsp.nspname::text as referenced_schema,
          ref_rel.relname::text as referenced_table,
          array_agg(ref_att.attname::text order by cols.ordinality) as referenced_columns,
          con.condeferrable as is_deferrable
        from pg_constraint con
        join pg_class src_rel on src_rel.oid = con.conrelid
        join pg_namespace src_nsp on src_nsp.oid = src_rel.relnamespace
        join pg_class ref_rel on ref_rel.oid = con.confrelid
        join pg_namespace ref_nsp on ref_nsp.oid = ref_rel.relnamespace
        join unnest(con.conkey, con.confkey) with ordinality
          as cols(src_attnum, ref_attnum, ordinality) on true
        join pg_attribute src_att
          on src_att.attrelid = src_rel.oid and src_att.attnum = cols.src_attnum
        join pg_attribute ref_att
          on ref_att.attrelid = ref_rel.oid and ref_att.attnum = cols.ref_attnum
        where con.contype = 'f'
          and (src_nsp.nspname = any($1) or ref_nsp.nspname = any($1))
        group by
          con.conname, src_nsp.nspname, src_rel.relname,
          ref_nsp.nspname, ref_rel.relname, con.condeferrable
        order by src_nsp.nspname, src_rel.relname, con.conname
        "#,
    )
    .bind(schemas.to_vec())
    .fetch_all(pool)
    .await
    .map_err(catalog_error)
}

#[derive(Debug, FromRow)]
pub struct RawEnumType {
    pub schema: String,
    pub name: String,
    pub labels: Vec<String>,
}

pub async fn list_enums(pool: &PgPool) -> Result<Vec<RawEnumType>> {
    sqlx::query_as::<_, RawEnumType>(
        r#"
        select
          n.nspname::text as schema,
          t.typname::text as name,
          array_agg(e.enumlabel::text order by e.enumsortorder) as labels
        from pg_type t
        join pg_namespace n on n.oid = t.typnamespace
        join pg_enum e on e.enumtypid = t.oid
        group by n.nspname, t.typname
        order by n.nspname, t.typname
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(catalog_error)
}
