//! Flushes assembled batches through a sink and pools the returned keys.

use tracing::debug;

use rowforge_core::TableEntry;

use crate::batch::BatchBuffer;
use crate::errors::BatchInsertError;
use crate::pool::PrimaryKeyPool;
use crate::sink::BatchSink;

/// Insert one batch and append its key values to `pool`. Keys are pooled only
/// after the sink reports success, so children never reference rolled-back rows.
pub async fn flush_batch<S: BatchSink + ?Sized>(
    sink: &mut S,
    pool: &mut PrimaryKeyPool,
    table: &TableEntry,
    batch: &BatchBuffer,
) -> Result<u64, BatchInsertError> {
    let outcome = sink.insert_batch(table, batch).await?;
    let pooled = if table.key_columns.is_empty() {
        0
    } else {
        let count = outcome.keys.len();
        pool.append(&table.key, outcome.keys);
        count
    };
    debug!(
        table = %table.key,
        rows = outcome.rows_inserted,
        columns = batch.columns.len(),
        pooled,
        "flushed batch"
    );
    Ok(outcome.rows_inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use crate::value::GeneratedValue;
    use rowforge_core::{
        Catalog, Column, ColumnType, Constraint, DatabaseSchema, PrimaryKey, Schema, Table,
        TableKey,
    };

    fn entry() -> TableEntry {
        let schema = DatabaseSchema {
            schema_version: "0.1".to_string(),
            engine: "postgres".to_string(),
            database: None,
            schemas: vec![Schema {
                name: "public".to_string(),
                tables: vec![Table {
                    name: "tags".to_string(),
                    columns: vec![
                        Column {
                            ordinal_position: 1,
                            name: "id".to_string(),
                            column_type: ColumnType::simple("integer"),
                            is_nullable: false,
                            default: Some("nextval('tags_id_seq'::regclass)".to_string()),
                            identity: None,
                            generated: None,
                        },
                        Column {
                            ordinal_position: 2,
                            name: "label".to_string(),
                            column_type: ColumnType::simple("text"),
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
        };
        Catalog::from_schema(&schema)
            .table(&TableKey::new("public", "tags"))
            .cloned()
            .expect("tags table")
    }

    fn batch(entry: &TableEntry, rows: usize) -> BatchBuffer {
        BatchBuffer {
            table: entry.key.clone(),
            columns: vec!["label".to_string()],
            rows: (0..rows)
                .map(|idx| vec![GeneratedValue::Text(format!("tag-{idx}"))])
                .collect(),
        }
    }

    #[tokio::test]
    async fn pools_keys_after_successful_insert() {
        let entry = entry();
        let mut sink = MemorySink::new();
        let mut pool = PrimaryKeyPool::new();

        let inserted = flush_batch(&mut sink, &mut pool, &entry, &batch(&entry, 3))
            .await
            .expect("flush");
        assert_eq!(inserted, 3);
        assert_eq!(pool.len(&entry.key), 3);
        assert_eq!(
            pool.keys(&entry.key)[2],
            crate::pool::PoolKey::Scalar(GeneratedValue::Int(3))
        );
    }

    #[tokio::test]
    async fn failed_insert_leaves_pool_untouched() {
        let entry = entry();
        let mut sink = MemorySink::new().fail_table(entry.key.clone());
        let mut pool = PrimaryKeyPool::new();

        let err = flush_batch(&mut sink, &mut pool, &entry, &batch(&entry, 2))
            .await
            .expect_err("simulated failure");
        assert_eq!(err.table, entry.key);
        assert!(pool.is_empty(&entry.key));
    }
}
