use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

pub const DEFAULT_ROWS: u64 = 10;
pub const DEFAULT_BATCH_SIZE: usize = 500;
pub const DEFAULT_COMMIT_EVERY: usize = 10;

/// A population run: row counts, schema filter and per-column overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    /// Seed for the deterministic RNG; entropy-seeded when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Rows generated for tables without an explicit target.
    #[serde(default = "default_rows")]
    pub default_rows: u64,
    /// Maximum rows per multi-row insert (further clamped by the bind limit).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Completed tables between commit checkpoints.
    #[serde(default = "default_commit_every")]
    pub commit_every: usize,
    /// Populate only the listed targets instead of every catalog table.
    #[serde(default)]
    pub only_targets: bool,
    #[serde(default)]
    pub schemas: SchemaFilter,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<Target>,
    /// Exclusion rules, first match wins.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<ExcludeRule>,
    /// Custom generator rules, first match wins.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generators: Vec<GeneratorRule>,
}

impl Default for Plan {
    fn default() -> Self {
        Self {
            seed: None,
            default_rows: DEFAULT_ROWS,
            batch_size: DEFAULT_BATCH_SIZE,
            commit_every: DEFAULT_COMMIT_EVERY,
            only_targets: false,
            schemas: SchemaFilter::default(),
            targets: Vec::new(),
            exclude: Vec::new(),
            generators: Vec::new(),
        }
    }
}

impl Plan {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        Ok(toml::from_str(input)?)
    }

    pub fn from_json_str(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }

    /// Rows requested for `table` (`schema.table`).
    pub fn rows_for(&self, table: &str) -> Option<u64> {
        match self.targets.iter().find(|target| target.table == table) {
            Some(target) => Some(target.rows),
            None if self.only_targets => None,
            None => Some(self.default_rows),
        }
    }
}

fn default_rows() -> u64 {
    DEFAULT_ROWS
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_commit_every() -> usize {
    DEFAULT_COMMIT_EVERY
}

/// Schemas introspected for the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SchemaFilter {
    /// Only these schemas when non-empty; otherwise every non-system schema.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

/// Explicit row count for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Target {
    /// Table key as `schema.table`.
    pub table: String,
    pub rows: u64,
}

/// Excludes matching columns, or the whole table when `column` is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ExcludeRule {
    /// Regex matched against the table name.
    pub table: String,
    /// Regex matched against the column name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

/// Custom producer for matching columns: a named generator or a content list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct GeneratorRule {
    /// Regex matched against the table name.
    pub table: String,
    /// Regex matched against the column name.
    pub column: String,
    /// Named generator id (e.g. `company_name`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
    /// Literal values drawn without repetition until exhausted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
    /// Extra values to request from the content expander.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub expand: usize,
}

fn is_zero(value: &usize) -> bool {
    *value == 0
}
