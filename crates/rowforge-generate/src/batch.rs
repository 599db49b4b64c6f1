use std::collections::BTreeSet;

use rowforge_core::TableKey;

use crate::value::GeneratedValue;

/// PostgreSQL caps a statement at 65535 bind parameters.
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Rows buffered for one multi-row insert, all sharing the same column list.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchBuffer {
    pub table: TableKey,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<GeneratedValue>>,
}

impl BatchBuffer {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Largest row count for `columns` that stays under the bind parameter limit.
pub fn effective_batch_size(batch_size: usize, columns: usize) -> usize {
    let cap = if columns == 0 {
        batch_size
    } else {
        MAX_BIND_PARAMS / columns
    };
    batch_size.min(cap).max(1)
}

/// Groups generated rows of one table into homogeneous batches.
#[derive(Debug)]
pub struct BatchAssembler {
    table: TableKey,
    generated: BTreeSet<String>,
    batch_size: usize,
    columns: Vec<String>,
    rows: Vec<Vec<GeneratedValue>>,
}

impl BatchAssembler {
    pub fn new(table: TableKey, generated: BTreeSet<String>, batch_size: usize) -> Self {
        Self {
            table,
            generated,
            batch_size,
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn pending(&self) -> usize {
        self.rows.len()
    }

    /// Buffer one row. Returns the batches that became ready: the previous buffer
    /// when the column list changed, and the current one once it is full.
    pub fn push(&mut self, row: Vec<(String, GeneratedValue)>) -> Vec<BatchBuffer> {
        let (columns, values): (Vec<String>, Vec<GeneratedValue>) = row
            .into_iter()
            .filter(|(column, _)| !self.generated.contains(column))
            .unzip();

        let mut ready = Vec::new();
        if !self.rows.is_empty() && columns != self.columns {
            ready.extend(self.take());
        }
        if self.rows.is_empty() {
            self.columns = columns;
        }
        self.rows.push(values);

        if self.rows.len() >= effective_batch_size(self.batch_size, self.columns.len()) {
            ready.extend(self.take());
        }
        ready
    }

    /// Flush whatever is buffered at end of table.
    pub fn finish(&mut self) -> Option<BatchBuffer> {
        self.take()
    }

    fn take(&mut self) -> Option<BatchBuffer> {
        if self.rows.is_empty() {
            return None;
        }
        Some(BatchBuffer {
            table: self.table.clone(),
            columns: self.columns.clone(),
            rows: std::mem::take(&mut self.rows),
        })
    }
}
