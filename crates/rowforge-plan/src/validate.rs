use std::collections::HashSet;
use std::fs;
use std::path::Path;

use jsonschema::JSONSchema;
use regex::Regex;
use serde_json::Value;

use crate::errors::{PlanError, ValidationIssue, ValidationReport};
use crate::model::{ExcludeRule, GeneratorRule, Plan, Target};

/// Validated plan with accumulated warnings.
#[derive(Debug, Clone)]
pub struct ValidatedPlan {
    pub plan: Plan,
    pub warnings: Vec<ValidationIssue>,
}

/// Read a plan document from disk; `.toml` files are converted to the JSON model.
pub fn load_plan_document(path: &Path) -> Result<Value, PlanError> {
    let contents = fs::read_to_string(path)?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    if is_toml {
        let document: toml::Value = toml::from_str(&contents)?;
        Ok(serde_json::to_value(document)?)
    } else {
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Validate a plan JSON document against the plan JSON Schema.
pub fn validate_plan_json(
    plan_json: &Value,
    plan_schema: &Value,
) -> Result<ValidationReport, PlanError> {
    let compiled =
        JSONSchema::compile(plan_schema).map_err(|err| PlanError::Schema(err.to_string()))?;

    let mut report = ValidationReport::default();
    if let Err(errors) = compiled.validate(plan_json) {
        for error in errors {
            let path = normalized_json_pointer(&error.instance_path.to_string());
            report.push(ValidationIssue::error(
                "schema_violation",
                path,
                error.to_string(),
                None,
            ));
        }
    }

    Ok(report)
}

/// Validate the plan end-to-end: structure, then semantic checks on the parsed model.
///
/// `known_generators` lists the ids accepted in `generators[].generator`.
pub fn validate_plan(
    plan_json: &Value,
    plan_schema: &Value,
    known_generators: &[&str],
) -> Result<ValidatedPlan, ValidationReport> {
    let structural = validate_plan_json(plan_json, plan_schema)?;
    if !structural.is_ok() {
        return Err(structural);
    }

    let plan: Plan = serde_json::from_value(plan_json.clone())
        .map_err(|err| ValidationReport::from(PlanError::Json(err)))?;

    let report = validate_plan_model(&plan, known_generators);
    if !report.is_ok() {
        return Err(report);
    }

    Ok(ValidatedPlan {
        plan,
        warnings: report.warnings,
    })
}

/// Semantic checks that the JSON Schema cannot express.
pub fn validate_plan_model(plan: &Plan, known_generators: &[&str]) -> ValidationReport {
    let mut report = ValidationReport::default();

    if plan.batch_size == 0 {
        report.push(ValidationIssue::error(
            "batch_size_zero",
            "/batch_size",
            "batch_size must be greater than zero",
            Some("set batch_size to a positive integer".to_string()),
        ));
    }
    if plan.commit_every == 0 {
        report.push(ValidationIssue::error(
            "commit_every_zero",
            "/commit_every",
            "commit_every must be greater than zero",
            Some("set commit_every to a positive integer".to_string()),
        ));
    }

    for schema in &plan.schemas.include {
        if plan.schemas.exclude.contains(schema) {
            report.push(ValidationIssue::warning(
                "schema_included_and_excluded",
                "/schemas",
                format!("schema '{schema}' is both included and excluded"),
                Some("exclusion wins; remove it from one list".to_string()),
            ));
        }
    }

    validate_targets(&plan.targets, plan.only_targets, &mut report);
    validate_exclusions(&plan.exclude, &mut report);
    validate_generators(&plan.generators, known_generators, &mut report);

    report
}

fn validate_targets(targets: &[Target], only_targets: bool, report: &mut ValidationReport) {
    if only_targets && targets.is_empty() {
        report.push(ValidationIssue::error(
            "targets_empty",
            "/targets",
            "only_targets is set but no targets are listed",
            Some("add at least one target table".to_string()),
        ));
    }

    let mut seen = HashSet::new();
    for (idx, target) in targets.iter().enumerate() {
        let base_path = format!("/targets/{idx}");
        let well_formed = target
            .table
            .split_once('.')
            .is_some_and(|(schema, table)| {
                !schema.is_empty() && !table.is_empty() && !table.contains('.')
            });
        if !well_formed {
            report.push(ValidationIssue::error(
                "invalid_table_key",
                format!("{base_path}/table"),
                format!("target table '{}' is not of the form schema.table", target.table),
                None,
            ));
        }
        if target.rows == 0 {
            report.push(ValidationIssue::warning(
                "rows_zero",
                format!("{base_path}/rows"),
                "target requests zero rows; the table will be skipped",
                None,
            ));
        }
        if !seen.insert(target.table.as_str()) {
            report.push(ValidationIssue::error(
                "duplicate_target",
                base_path,
                "duplicate target for the same table",
                Some("merge duplicate targets into a single entry".to_string()),
            ));
        }
    }
}

fn validate_exclusions(rules: &[ExcludeRule], report: &mut ValidationReport) {
    for (idx, rule) in rules.iter().enumerate() {
        let base_path = format!("/exclude/{idx}");
        check_regex(&rule.table, &format!("{base_path}/table"), report);
        if let Some(column) = &rule.column {
            check_regex(column, &format!("{base_path}/column"), report);
        }
    }
}

fn validate_generators(
    rules: &[GeneratorRule],
    known_generators: &[&str],
    report: &mut ValidationReport,
) {
    for (idx, rule) in rules.iter().enumerate() {
        let base_path = format!("/generators/{idx}");
        check_regex(&rule.table, &format!("{base_path}/table"), report);
        check_regex(&rule.column, &format!("{base_path}/column"), report);

        match (&rule.generator, &rule.values) {
            (Some(_), Some(_)) => report.push(ValidationIssue::error(
                "generator_source_conflict",
                base_path.clone(),
                "set either generator or values, not both",
                None,
            )),
            (None, None) => report.push(ValidationIssue::error(
                "generator_source_missing",
                base_path.clone(),
                "a generator rule needs a generator id or a values list",
                None,
            )),
            (Some(id), None) => {
                if !known_generators.contains(&id.as_str()) {
                    report.push(ValidationIssue::error(
                        "unknown_generator",
                        format!("{base_path}/generator"),
                        format!("generator '{id}' is not registered"),
                        Some(format!("known generators: {}", known_generators.join(", "))),
                    ));
                }
                if rule.expand > 0 {
                    report.push(ValidationIssue::warning(
                        "expand_ignored",
                        format!("{base_path}/expand"),
                        "expand only applies to values lists",
                        None,
                    ));
                }
            }
            (None, Some(values)) => {
                if values.is_empty() && rule.expand == 0 {
                    report.push(ValidationIssue::error(
                        "values_empty",
                        format!("{base_path}/values"),
                        "values list is empty and nothing is expanded",
                        Some("add values or set expand".to_string()),
                    ));
                }
            }
        }
    }
}

fn check_regex(pattern: &str, path: &str, report: &mut ValidationReport) {
    if let Err(err) = Regex::new(pattern) {
        report.push(ValidationIssue::error(
            "invalid_regex",
            path,
            format!("invalid pattern '{pattern}': {err}"),
            None,
        ));
    }
}

fn normalized_json_pointer(pointer: &str) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SchemaFilter;

    const KNOWN: &[&str] = &["company_name", "safe_email"];

    fn codes(report: &ValidationReport) -> Vec<&str> {
        report
            .errors
            .iter()
            .chain(report.warnings.iter())
            .map(|issue| issue.code.as_str())
            .collect()
    }

    fn rule(generator: Option<&str>, values: Option<Vec<&str>>) -> GeneratorRule {
        GeneratorRule {
            table: ".*".to_string(),
            column: "^name$".to_string(),
            generator: generator.map(ToString::to_string),
            values: values.map(|list| list.into_iter().map(ToString::to_string).collect()),
            expand: 0,
        }
    }

    #[test]
    fn default_plan_is_valid() {
        let report = validate_plan_model(&Plan::default(), KNOWN);
        assert!(report.is_ok());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn reports_bad_regex_and_unknown_generator() {
        let plan = Plan {
            exclude: vec![ExcludeRule {
                table: "(".to_string(),
                column: None,
            }],
            generators: vec![rule(Some("starship_name"), None)],
            ..Plan::default()
        };
        let report = validate_plan_model(&plan, KNOWN);
        assert_eq!(codes(&report), vec!["invalid_regex", "unknown_generator"]);
        assert_eq!(report.errors[0].path, "/exclude/0/table");
    }

    #[test]
    fn generator_rule_needs_exactly_one_source() {
        let plan = Plan {
            generators: vec![
                rule(Some("company_name"), Some(vec!["a"])),
                rule(None, None),
                rule(None, Some(vec!["x", "y"])),
            ],
            ..Plan::default()
        };
        let report = validate_plan_model(&plan, KNOWN);
        assert_eq!(
            codes(&report),
            vec!["generator_source_conflict", "generator_source_missing"]
        );
    }

    #[test]
    fn zero_sizes_and_malformed_targets_are_errors() {
        let plan = Plan {
            batch_size: 0,
            commit_every: 0,
            schemas: SchemaFilter {
                include: vec!["public".to_string()],
                exclude: vec!["public".to_string()],
            },
            targets: vec![
                Target {
                    table: "parent".to_string(),
                    rows: 1,
                },
                Target {
                    table: "public.child".to_string(),
                    rows: 0,
                },
            ],
            ..Plan::default()
        };
        let report = validate_plan_model(&plan, KNOWN);
        assert_eq!(
            codes(&report),
            vec![
                "batch_size_zero",
                "commit_every_zero",
                "invalid_table_key",
                "schema_included_and_excluded",
                "rows_zero"
            ]
        );
    }
}
