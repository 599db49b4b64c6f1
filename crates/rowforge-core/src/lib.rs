//! Core contracts for rowforge.
//!
//! Schema snapshot types, the catalog maps built from them, FK dependency
//! resolution, and helpers shared by the adapters, the engine and the CLI.

pub mod catalog;
pub mod constraints;
pub mod error;
pub mod graph;
pub mod redaction;
pub mod schema;
pub mod types;
pub mod validation;

pub use catalog::{Catalog, ForeignKeyEdge, TableEntry, TableForeignKey, TableKey};
pub use constraints::{Constraint, ForeignKey, PrimaryKey, UniqueConstraint};
pub use error::{Error, Result};
pub use graph::{
    DependencyGraph, FkGraphReport, FkGraphSummary, build_fk_graph_report, resolve_order,
};
pub use redaction::{RedactedConnection, redact_connection_string};
pub use schema::{Column, DatabaseSchema, InboundForeignKey, Schema, Table};
pub use types::{
    ColumnType, EnumType, GeneratedExpression, IdentityGeneration, IntWidth, TypeFamily,
};
pub use validation::validate_schema;

/// Current contract version for schema snapshot artifacts.
pub const SCHEMA_VERSION: &str = "0.1";
