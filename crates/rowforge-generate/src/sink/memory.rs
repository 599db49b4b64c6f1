use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;

use rowforge_core::{TableEntry, TableKey, TypeFamily};

use super::{BatchSink, InsertOutcome};
use crate::batch::BatchBuffer;
use crate::errors::{BatchInsertError, PopulateError};
use crate::policy::RowValues;
use crate::pool::PoolKey;
use crate::value::GeneratedValue;

/// In-memory sink for dry runs and tests. Integer identity and serial columns
/// receive per-table sequence values, mimicking what the database would assign.
#[derive(Debug, Default)]
pub struct MemorySink {
    tables: BTreeMap<TableKey, Vec<RowValues>>,
    batch_sizes: Vec<(TableKey, usize)>,
    sequences: HashMap<(TableKey, String), i64>,
    failing: BTreeSet<TableKey>,
    checkpoints: usize,
    finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every batch for `table` fail, to exercise recovery paths.
    pub fn fail_table(mut self, table: TableKey) -> Self {
        self.failing.insert(table);
        self
    }

    pub fn rows(&self, table: &TableKey) -> &[RowValues] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Row count of every flushed batch, in flush order.
    pub fn batch_sizes(&self) -> &[(TableKey, usize)] {
        &self.batch_sizes
    }

    pub fn checkpoints(&self) -> usize {
        self.checkpoints
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn next_value(&mut self, table: &TableKey, column: &str) -> i64 {
        let counter = self
            .sequences
            .entry((table.clone(), column.to_string()))
            .or_insert(0);
        *counter += 1;
        *counter
    }
}

#[async_trait]
impl BatchSink for MemorySink {
    async fn insert_batch(
        &mut self,
        table: &TableEntry,
        batch: &BatchBuffer,
    ) -> Result<InsertOutcome, BatchInsertError> {
        if self.failing.contains(&table.key) {
            return Err(BatchInsertError::new(&table.key, "simulated failure"));
        }

        let mut inserted = Vec::with_capacity(batch.rows.len());
        for values in &batch.rows {
            let mut row: RowValues = batch
                .columns
                .iter()
                .cloned()
                .zip(values.iter().cloned())
                .collect();
            for column in &table.columns {
                if !table.generated.contains(&column.name) {
                    continue;
                }
                let value = match column.column_type.family() {
                    TypeFamily::Integer(_) if column.generated.is_none() => {
                        GeneratedValue::Int(self.next_value(&table.key, &column.name))
                    }
                    _ => GeneratedValue::Null,
                };
                row.insert(column.name.clone(), value);
            }
            inserted.push(row);
        }

        let keys = inserted
            .iter()
            .map(|row| {
                PoolKey::from_values(
                    table
                        .key_columns
                        .iter()
                        .map(|column| row.get(column).cloned().unwrap_or(GeneratedValue::Null))
                        .collect(),
                )
            })
            .collect();

        let rows_inserted = inserted.len() as u64;
        self.batch_sizes.push((table.key.clone(), inserted.len()));
        self.tables
            .entry(table.key.clone())
            .or_default()
            .extend(inserted);

        Ok(InsertOutcome {
            rows_inserted,
            keys,
        })
    }

    async fn checkpoint(&mut self) -> Result<(), PopulateError> {
        self.checkpoints += 1;
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), PopulateError> {
        self.finished = true;
        Ok(())
    }
}
