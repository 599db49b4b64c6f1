//! Destinations for assembled batches.

use async_trait::async_trait;

use rowforge_core::TableEntry;

use crate::batch::BatchBuffer;
use crate::errors::{BatchInsertError, PopulateError};
use crate::pool::PoolKey;

pub mod memory;
pub mod postgres;

pub use memory::MemorySink;
pub use postgres::PostgresSink;

/// Rows written by one batch and the key values read back from them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertOutcome {
    pub rows_inserted: u64,
    /// One entry per inserted row, aligned with `TableEntry::key_columns`.
    pub keys: Vec<PoolKey>,
}

#[async_trait]
pub trait BatchSink: Send {
    /// Insert one batch atomically. A failed batch leaves no rows behind.
    async fn insert_batch(
        &mut self,
        table: &TableEntry,
        batch: &BatchBuffer,
    ) -> Result<InsertOutcome, BatchInsertError>;

    /// Make everything inserted so far durable.
    async fn checkpoint(&mut self) -> Result<(), PopulateError>;

    /// Final commit at the end of a run.
    async fn finish(&mut self) -> Result<(), PopulateError>;
}
