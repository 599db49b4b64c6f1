//! Run configuration for rowforge: plan contracts, JSON Schema emission and
//! validation.

pub mod errors;
pub mod model;
pub mod schema;
pub mod validate;

pub use errors::{IssueSeverity, PlanError, Result, ValidationIssue, ValidationReport};
pub use model::{ExcludeRule, GeneratorRule, Plan, SchemaFilter, Target};
pub use schema::plan_json_schema;
pub use validate::{
    ValidatedPlan, load_plan_document, validate_plan, validate_plan_json, validate_plan_model,
};
