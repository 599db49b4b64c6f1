use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Acquire, PgPool, Postgres, QueryBuilder, Row, Transaction};

use rowforge_core::{TableEntry, TableKey};

use super::{BatchSink, InsertOutcome};
use crate::batch::BatchBuffer;
use crate::errors::{BatchInsertError, PopulateError};
use crate::pool::PoolKey;
use crate::value::GeneratedValue;

/// Writes batches into PostgreSQL inside one long transaction. Each batch runs
/// under its own savepoint; `checkpoint` commits and opens a new transaction.
pub struct PostgresSink {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PostgresSink {
    pub async fn begin(pool: PgPool) -> Result<Self, PopulateError> {
        let tx = pool.begin().await.map_err(sink_error)?;
        Ok(Self { pool, tx: Some(tx) })
    }

    async fn commit(&mut self) -> Result<(), PopulateError> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await.map_err(sink_error)?;
        }
        Ok(())
    }
}

fn sink_error(err: sqlx::Error) -> PopulateError {
    PopulateError::Sink(err.to_string())
}

pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

pub fn qualified_name(table: &TableKey) -> String {
    format!("{}.{}", quote_ident(&table.schema), quote_ident(&table.table))
}

/// `WITH ins AS (INSERT ... RETURNING *) SELECT <key columns as text> FROM ins`.
/// Values are bound as text and cast to each column's declared type.
pub fn build_insert<'a>(table: &TableEntry, batch: &'a BatchBuffer) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::new("WITH ins AS (INSERT INTO ");
    builder.push(qualified_name(&table.key));

    if batch.columns.is_empty() {
        builder.push(" SELECT FROM generate_series(1, ");
        builder.push_bind(batch.rows.len() as i64);
        builder.push(")");
    } else {
        let casts: Vec<String> = batch
            .columns
            .iter()
            .map(|name| {
                let data_type = table
                    .column(name)
                    .map(|column| column.column_type.data_type.as_str())
                    .unwrap_or("text");
                format!("::{data_type}")
            })
            .collect();
        let column_list = batch
            .columns
            .iter()
            .map(|name| quote_ident(name))
            .collect::<Vec<_>>()
            .join(", ");
        builder.push(format!(" ({column_list}) "));
        builder.push_values(batch.rows.iter(), |mut separated, row| {
            for (value, cast) in row.iter().zip(&casts) {
                separated
                    .push_bind(value.to_sql_text())
                    .push_unseparated(cast.clone());
            }
        });
    }

    builder.push(" RETURNING *) SELECT ");
    if table.key_columns.is_empty() {
        builder.push("NULL::text AS k0");
    } else {
        let selected = table
            .key_columns
            .iter()
            .enumerate()
            .map(|(idx, name)| format!("ins.{}::text AS k{idx}", quote_ident(name)))
            .collect::<Vec<_>>()
            .join(", ");
        builder.push(selected);
    }
    builder.push(" FROM ins");
    builder
}

fn read_key(row: &PgRow, columns: usize) -> Result<PoolKey, sqlx::Error> {
    let mut values = Vec::with_capacity(columns);
    for idx in 0..columns {
        let value: Option<String> = row.try_get(idx)?;
        values.push(value.map(GeneratedValue::Text).unwrap_or(GeneratedValue::Null));
    }
    Ok(PoolKey::from_values(values))
}

#[async_trait]
impl BatchSink for PostgresSink {
    async fn insert_batch(
        &mut self,
        table: &TableEntry,
        batch: &BatchBuffer,
    ) -> Result<InsertOutcome, BatchInsertError> {
        let tx = self
            .tx
            .as_mut()
            .ok_or_else(|| BatchInsertError::new(&table.key, "transaction already closed"))?;
        let mut savepoint = tx
            .begin()
            .await
            .map_err(|err| BatchInsertError::new(&table.key, err.to_string()))?;

        let mut builder = build_insert(table, batch);
        let result = builder.build().fetch_all(&mut *savepoint).await;
        let rows = match result {
            Ok(rows) => rows,
            Err(err) => {
                if let Err(rollback) = savepoint.rollback().await {
                    tracing::warn!(
                        table = %table.key,
                        error = %rollback,
                        "savepoint rollback failed"
                    );
                }
                return Err(BatchInsertError::new(&table.key, err.to_string()));
            }
        };

        let keys = if table.key_columns.is_empty() {
            Vec::new()
        } else {
            rows.iter()
                .map(|row| read_key(row, table.key_columns.len()))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| BatchInsertError::new(&table.key, err.to_string()))?
        };
        savepoint
            .commit()
            .await
            .map_err(|err| BatchInsertError::new(&table.key, err.to_string()))?;

        Ok(InsertOutcome {
            rows_inserted: rows.len() as u64,
            keys,
        })
    }

    async fn checkpoint(&mut self) -> Result<(), PopulateError> {
        self.commit().await?;
        self.tx = Some(self.pool.begin().await.map_err(sink_error)?);
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), PopulateError> {
        self.commit().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowforge_core::{
        Catalog, Column, ColumnType, Constraint, DatabaseSchema, PrimaryKey, Schema, Table,
    };

    fn entry() -> TableEntry {
        let catalog = Catalog::from_schema(&DatabaseSchema {
            schema_version: "0.1".to_string(),
            engine: "postgres".to_string(),
            database: None,
            schemas: vec![Schema {
                name: "app".to_string(),
                tables: vec![Table {
                    name: "Items".to_string(),
                    columns: vec![
                        Column {
                            ordinal_position: 1,
                            name: "id".to_string(),
                            column_type: ColumnType::simple("integer"),
                            is_nullable: false,
                            default: Some("nextval('items_id_seq'::regclass)".to_string()),
                            identity: None,
                            generated: None,
                        },
                        Column {
                            ordinal_position: 2,
                            name: "price".to_string(),
                            column_type: ColumnType::simple("numeric(10,2)"),
                            is_nullable: false,
                            default: None,
                            identity: None,
                            generated: None,
                        },
                    ],
                    constraints: vec![Constraint::PrimaryKey(PrimaryKey {
                        name: None,
                        columns: vec!["id".to_string()],
                    })],
                }],
            }],
            enums: Vec::new(),
            inbound_foreign_keys: Vec::new(),
        });
        catalog
            .table(&TableKey::new("app", "Items"))
            .cloned()
            .expect("table")
    }

    #[test]
    fn builds_cast_multi_row_insert() {
        let entry = entry();
        let batch = BatchBuffer {
            table: entry.key.clone(),
            columns: vec!["price".to_string()],
            rows: vec![
                vec![GeneratedValue::Numeric("1.50".to_string())],
                vec![GeneratedValue::Null],
            ],
        };
        let mut builder = build_insert(&entry, &batch);
        assert_eq!(
            builder.sql(),
            concat!(
                "WITH ins AS (INSERT INTO \"app\".\"Items\" (\"price\") ",
                "VALUES ($1::numeric(10,2)), ($2::numeric(10,2)) RETURNING *) ",
                "SELECT ins.\"id\"::text AS k0 FROM ins"
            )
        );
        let _ = builder.build();
    }

    #[test]
    fn all_default_rows_use_generate_series() {
        let entry = entry();
        let batch = BatchBuffer {
            table: entry.key.clone(),
            columns: Vec::new(),
            rows: vec![Vec::new(), Vec::new()],
        };
        let builder = build_insert(&entry, &batch);
        assert!(builder.sql().contains("SELECT FROM generate_series(1, $1)"));
    }

    #[test]
    fn quotes_embedded_double_quotes() {
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
