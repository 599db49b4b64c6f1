use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Primary key definition preserving column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PrimaryKey {
    pub name: Option<String>,
    pub columns: Vec<String>,
}

/// Unique constraint definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UniqueConstraint {
    pub name: Option<String>,
    pub columns: Vec<String>,
}

/// Foreign key definition preserving column ordering.
///
/// `columns[i]` references `referenced_columns[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ForeignKey {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub referenced_schema: String,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    pub is_deferrable: bool,
}

/// Table-level constraint definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    PrimaryKey(PrimaryKey),
    ForeignKey(ForeignKey),
    Unique(UniqueConstraint),
}

impl Constraint {
    /// Short label used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Constraint::PrimaryKey(_) => "primary key",
            Constraint::ForeignKey(_) => "foreign key",
            Constraint::Unique(_) => "unique",
        }
    }

    /// Constrained columns of the owning table.
    pub fn columns(&self) -> &[String] {
        match self {
            Constraint::PrimaryKey(pk) => &pk.columns,
            Constraint::ForeignKey(fk) => &fk.columns,
            Constraint::Unique(unique) => &unique.columns,
        }
    }
}

impl ForeignKey {
    /// `(child column, parent column)` pairs in constraint order.
    pub fn column_pairs(&self) -> impl Iterator<Item = (&String, &String)> {
        self.columns.iter().zip(&self.referenced_columns)
    }
}
