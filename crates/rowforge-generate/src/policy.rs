//! Column resolution policy: exclusion rules, custom producers, and the
//! partition of a table's columns into FK, custom and standard groups.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use rand::RngCore;
use regex::Regex;
use thiserror::Error;

use rowforge_core::{TableEntry, TableForeignKey, TableKey};
use rowforge_plan::Plan;

use crate::content::{ContentExpander, ContentStore};
use crate::errors::{GenerationError, PopulateError};
use crate::generators::NamedGenerator;
use crate::value::GeneratedValue;

/// Values resolved so far for the row being built.
pub type RowValues = BTreeMap<String, GeneratedValue>;

/// Outcome of a producer call other than a value.
#[derive(Debug, Error)]
pub enum ProduceError {
    /// Veto the whole row.
    #[error("row skipped: {0}")]
    Skip(String),
    #[error(transparent)]
    Failed(#[from] GenerationError),
}

/// Everything a producer may look at or write while producing one column.
pub struct ProduceContext<'a> {
    pub table: &'a TableKey,
    pub column: &'a str,
    pub row: &'a RowValues,
    pub rng: &'a mut dyn RngCore,
    pub content: &'a mut ContentStore,
    writes: RowValues,
}

impl<'a> ProduceContext<'a> {
    pub fn new(
        table: &'a TableKey,
        column: &'a str,
        row: &'a RowValues,
        rng: &'a mut dyn RngCore,
        content: &'a mut ContentStore,
    ) -> Self {
        Self {
            table,
            column,
            row,
            rng,
            content,
            writes: RowValues::new(),
        }
    }

    /// Value already resolved for another column of this row.
    pub fn value(&self, column: &str) -> Option<&GeneratedValue> {
        self.row.get(column)
    }

    /// Set a value for another column of the row. Only columns listed in the
    /// producer's `fan_out` are kept.
    pub fn set(&mut self, column: impl Into<String>, value: GeneratedValue) {
        self.writes.insert(column.into(), value);
    }

    pub fn into_writes(self) -> RowValues {
        self.writes
    }
}

/// Caller-supplied value source for matching columns.
pub trait Producer: Send + Sync {
    fn produce(&self, ctx: &mut ProduceContext<'_>) -> Result<GeneratedValue, ProduceError>;

    /// Other columns this producer may set through `ProduceContext::set`.
    fn fan_out(&self) -> &[String] {
        &[]
    }

    fn name(&self) -> String {
        "custom".to_string()
    }
}

/// Closure adapter for `Producer`.
pub struct FnProducer<F> {
    func: F,
    fan_out: Vec<String>,
}

impl<F> FnProducer<F>
where
    F: Fn(&mut ProduceContext<'_>) -> Result<GeneratedValue, ProduceError> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self {
            func,
            fan_out: Vec::new(),
        }
    }

    pub fn with_fan_out<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fan_out = columns.into_iter().map(Into::into).collect();
        self
    }
}

impl<F> Producer for FnProducer<F>
where
    F: Fn(&mut ProduceContext<'_>) -> Result<GeneratedValue, ProduceError> + Send + Sync,
{
    fn produce(&self, ctx: &mut ProduceContext<'_>) -> Result<GeneratedValue, ProduceError> {
        (self.func)(ctx)
    }

    fn fan_out(&self) -> &[String] {
        &self.fan_out
    }
}

/// Named generator configured by id.
#[derive(Debug, Clone, Copy)]
pub struct NamedProducer(pub NamedGenerator);

impl Producer for NamedProducer {
    fn produce(&self, ctx: &mut ProduceContext<'_>) -> Result<GeneratedValue, ProduceError> {
        Ok(GeneratedValue::Text(self.0.generate(&mut *ctx.rng)))
    }

    fn name(&self) -> String {
        self.0.id().to_string()
    }
}

/// Draws from a content list, preferring values not handed out yet.
#[derive(Debug, Clone)]
pub struct ContentListProducer {
    list: String,
}

impl ContentListProducer {
    pub fn new(list: impl Into<String>) -> Self {
        Self { list: list.into() }
    }
}

impl Producer for ContentListProducer {
    fn produce(&self, ctx: &mut ProduceContext<'_>) -> Result<GeneratedValue, ProduceError> {
        let value = ctx
            .content
            .draw_unique(&self.list, &mut *ctx.rng)
            .ok_or_else(|| GenerationError::EmptyContent(self.list.clone()))?;
        Ok(parse_content_value(value))
    }

    fn name(&self) -> String {
        format!("content:{}", self.list)
    }
}

/// Content values that parse as a JSON object or array become JSON values.
fn parse_content_value(value: String) -> GeneratedValue {
    let trimmed = value.trim_start();
    if (trimmed.starts_with('{') || trimmed.starts_with('['))
        && let Ok(json) = serde_json::from_str::<serde_json::Value>(&value)
    {
        return GeneratedValue::Json(json);
    }
    GeneratedValue::Text(value)
}

struct ExclusionRule {
    table: Regex,
    column: Option<Regex>,
}

struct CustomGeneratorRule {
    table: Regex,
    column: Regex,
    producer: Arc<dyn Producer>,
}

/// Table patterns match either the bare table name or `schema.table`.
fn table_matches(pattern: &Regex, table: &TableKey) -> bool {
    pattern.is_match(&table.table) || pattern.is_match(&table.to_string())
}

/// Ordered exclusion and custom-generator rules, first match wins.
#[derive(Default)]
pub struct ColumnPolicy {
    exclusions: Vec<ExclusionRule>,
    generators: Vec<CustomGeneratorRule>,
}

impl fmt::Debug for ColumnPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnPolicy")
            .field("exclusions", &self.exclusions.len())
            .field("generators", &self.generators.len())
            .finish()
    }
}

impl ColumnPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclude matching columns, or the whole table when `column` is `None`.
    pub fn exclude(mut self, table: &str, column: Option<&str>) -> Result<Self, regex::Error> {
        self.exclusions.push(ExclusionRule {
            table: Regex::new(table)?,
            column: column.map(Regex::new).transpose()?,
        });
        Ok(self)
    }

    pub fn with_producer(
        mut self,
        table: &str,
        column: &str,
        producer: Arc<dyn Producer>,
    ) -> Result<Self, regex::Error> {
        self.generators.push(CustomGeneratorRule {
            table: Regex::new(table)?,
            column: Regex::new(column)?,
            producer,
        });
        Ok(self)
    }

    /// Compile the plan's rules. Content-list rules seed `content` with their
    /// values and ask `expander` for more when `expand` is set.
    pub fn from_plan(
        plan: &Plan,
        content: &mut ContentStore,
        expander: Option<&dyn ContentExpander>,
    ) -> Result<Self, PopulateError> {
        let mut policy = Self::new();
        for rule in &plan.exclude {
            policy = policy.exclude(&rule.table, rule.column.as_deref())?;
        }

        for rule in &plan.generators {
            let producer: Arc<dyn Producer> = match (&rule.generator, &rule.values) {
                (Some(id), None) => {
                    let named = NamedGenerator::from_id(id).ok_or_else(|| {
                        PopulateError::InvalidPlan(format!("unknown generator '{id}'"))
                    })?;
                    Arc::new(NamedProducer(named))
                }
                (None, Some(values)) => {
                    let list = format!("{}/{}", rule.table, rule.column);
                    content.insert_values(&list, values.iter().cloned());
                    if let Some(expander) = expander {
                        content.extend_with(expander, &list, rule.expand);
                    }
                    Arc::new(ContentListProducer::new(list))
                }
                _ => {
                    return Err(PopulateError::InvalidPlan(format!(
                        "generator rule {}/{} needs exactly one of generator or values",
                        rule.table, rule.column
                    )));
                }
            };
            policy = policy.with_producer(&rule.table, &rule.column, producer)?;
        }

        Ok(policy)
    }

    pub fn is_table_excluded(&self, table: &TableKey) -> bool {
        self.exclusions
            .iter()
            .any(|rule| rule.column.is_none() && table_matches(&rule.table, table))
    }

    pub fn is_column_excluded(&self, table: &TableKey, column: &str) -> bool {
        self.exclusions.iter().any(|rule| {
            table_matches(&rule.table, table)
                && rule
                    .column
                    .as_ref()
                    .is_none_or(|pattern| pattern.is_match(column))
        })
    }

    pub fn producer_for(&self, table: &TableKey, column: &str) -> Option<&Arc<dyn Producer>> {
        self.generators
            .iter()
            .find(|rule| table_matches(&rule.table, table) && rule.column.is_match(column))
            .map(|rule| &rule.producer)
    }

    /// Partition the table's writable columns into evaluation groups.
    pub fn plan_table(&self, entry: &TableEntry) -> TablePlan {
        let writable: Vec<String> = entry
            .writable_columns()
            .filter(|column| !self.is_column_excluded(&entry.key, &column.name))
            .map(|column| column.name.clone())
            .collect();
        let writable_set: BTreeSet<String> = writable.iter().cloned().collect();

        let mut fk_columns = BTreeSet::new();
        let mut foreign_keys = Vec::new();
        for fk in &entry.foreign_keys {
            let columns: Vec<String> = fk
                .columns
                .iter()
                .filter(|column| writable_set.contains(*column))
                .cloned()
                .collect();
            if columns.is_empty() {
                continue;
            }
            let custom = columns
                .iter()
                .filter_map(|column| {
                    self.producer_for(&entry.key, column)
                        .map(|producer| (column.clone(), producer.clone()))
                })
                .collect();
            fk_columns.extend(columns.iter().cloned());
            foreign_keys.push(ForeignKeyGroup {
                foreign_key: fk.clone(),
                columns,
                custom,
            });
        }

        let mut custom = Vec::new();
        let mut standard = Vec::new();
        for column in &writable {
            if fk_columns.contains(column) {
                continue;
            }
            match self.producer_for(&entry.key, column) {
                Some(producer) => custom.push((column.clone(), producer.clone())),
                None => standard.push(column.clone()),
            }
        }

        TablePlan {
            columns: writable,
            writable: writable_set,
            foreign_keys,
            custom,
            standard,
        }
    }
}

/// Writable columns of one FK constraint plus any custom producers that win
/// over pool resolution for them.
#[derive(Clone)]
pub struct ForeignKeyGroup {
    pub foreign_key: TableForeignKey,
    pub columns: Vec<String>,
    pub custom: Vec<(String, Arc<dyn Producer>)>,
}

/// Evaluation order for one table's columns.
#[derive(Clone)]
pub struct TablePlan {
    /// Writable columns in declaration order.
    pub columns: Vec<String>,
    pub writable: BTreeSet<String>,
    pub foreign_keys: Vec<ForeignKeyGroup>,
    pub custom: Vec<(String, Arc<dyn Producer>)>,
    pub standard: Vec<String>,
}
