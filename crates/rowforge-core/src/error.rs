use thiserror::Error;

use crate::catalog::TableKey;

/// Core error type shared across rowforge crates.
#[derive(Debug, Error)]
pub enum Error {
    /// Catalog metadata could not be retrieved.
    #[error("catalog error: {0}")]
    Catalog(String),
    /// The FK dependency graph contains a cycle; `cycle` lists its tables in edge order.
    #[error("cyclic foreign key dependency: {}", format_cycle(.cycle))]
    CyclicDependency { cycle: Vec<TableKey> },
    /// The schema violates internal invariants.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// A table key could not be parsed.
    #[error("invalid table key '{0}'")]
    InvalidTableKey(String),
}

/// Convenience alias for results returned by rowforge crates.
pub type Result<T> = std::result::Result<T, Error>;

fn format_cycle(cycle: &[TableKey]) -> String {
    let mut names: Vec<String> = cycle.iter().map(ToString::to_string).collect();
    if let Some(first) = names.first().cloned() {
        names.push(first);
    }
    names.join(" -> ")
}
