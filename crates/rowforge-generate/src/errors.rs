use thiserror::Error;

use rowforge_core::TableKey;

/// Failure inside a value generator or producer. Always recovered at column level.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("unknown generator '{0}'")]
    UnknownGenerator(String),
    #[error("no enum labels for type '{0}'")]
    MissingEnumLabels(String),
    #[error("content list '{0}' is empty")]
    EmptyContent(String),
    #[error("no unused value left for unique column '{0}'")]
    UniqueExhausted(String),
    #[error("{0}")]
    Producer(String),
}

/// SQL failure for one batch; the batch is rolled back and its table marked failed.
#[derive(Debug, Error)]
#[error("insert into {table} failed: {message}")]
pub struct BatchInsertError {
    pub table: TableKey,
    pub message: String,
}

impl BatchInsertError {
    pub fn new(table: &TableKey, message: impl Into<String>) -> Self {
        Self {
            table: table.clone(),
            message: message.into(),
        }
    }
}

/// Engine-level errors that abort a run.
#[derive(Debug, Error)]
pub enum PopulateError {
    #[error(transparent)]
    Core(#[from] rowforge_core::Error),
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("sink error: {0}")]
    Sink(String),
}
