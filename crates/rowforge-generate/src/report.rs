use std::collections::BTreeMap;

use serde::Serialize;

/// Final state of one table in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Populated,
    /// A batch failed; rows from earlier batches stay inserted.
    Failed,
    Excluded,
    /// Not targeted by the plan, or zero rows requested.
    NotTargeted,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub table: String,
    pub status: TableStatus,
    pub rows_requested: u64,
    pub rows_inserted: u64,
    pub rows_skipped: u64,
    pub fallbacks: u64,
    pub batches: u64,
}

impl TableReport {
    pub fn new(table: String, status: TableStatus, rows_requested: u64) -> Self {
        Self {
            table,
            status,
            rows_requested,
            rows_inserted: 0,
            rows_skipped: 0,
            fallbacks: 0,
            batches: 0,
        }
    }
}

/// Summary returned by every completed run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PopulateReport {
    pub seed: u64,
    /// Processing order chosen by the dependency resolver.
    pub order: Vec<String>,
    pub rows_inserted: u64,
    pub rows_skipped: u64,
    pub fallbacks: u64,
    pub tables: Vec<TableReport>,
    /// Tables that were not populated, with the error text.
    pub failed_tables: BTreeMap<String, String>,
    pub cancelled: bool,
}

impl PopulateReport {
    pub fn rows_for(&self, table: &str) -> u64 {
        self.tables
            .iter()
            .find(|report| report.table == table)
            .map(|report| report.rows_inserted)
            .unwrap_or(0)
    }

    pub(crate) fn record_table(&mut self, table: TableReport) {
        self.rows_inserted += table.rows_inserted;
        self.rows_skipped += table.rows_skipped;
        self.fallbacks += table.fallbacks;
        self.tables.push(table);
    }

    pub(crate) fn record_failure(&mut self, table: &str, message: String) {
        self.failed_tables.insert(table.to_string(), message);
    }
}
