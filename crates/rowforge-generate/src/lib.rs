//! Synthetic row population for rowforge.
//!
//! Walks the catalog in FK dependency order, builds rows column by column
//! (foreign keys from a pool of inserted keys, custom producers, then
//! type-driven generators) and writes them in multi-row batches through a
//! `BatchSink`.

pub mod batch;
pub mod content;
pub mod engine;
pub mod errors;
pub mod generators;
pub mod inserter;
pub mod policy;
pub mod pool;
pub mod report;
pub mod sink;
pub mod value;

pub use batch::{BatchAssembler, BatchBuffer};
pub use content::{ContentError, ContentExpander, ContentStore, ExpandError};
pub use engine::{CancelFlag, PopulateEngine, RowOutcome, populate};
pub use errors::{BatchInsertError, GenerationError, PopulateError};
pub use generators::{GeneratorMatcher, KeywordMatcher, NamedGenerator, ValueGenerators};
pub use policy::{
    ColumnPolicy, FnProducer, ProduceContext, ProduceError, Producer, RowValues, TablePlan,
};
pub use pool::{PoolKey, PrimaryKeyPool};
pub use report::{PopulateReport, TableReport, TableStatus};
pub use sink::{BatchSink, InsertOutcome, MemorySink, PostgresSink};
pub use value::GeneratedValue;
