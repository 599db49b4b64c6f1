use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use rowforge_core::{Catalog, DependencyGraph, TableEntry, TableKey, resolve_order};
use rowforge_plan::Plan;

use crate::batch::BatchAssembler;
use crate::content::{ContentExpander, ContentStore};
use crate::errors::PopulateError;
use crate::generators::{ColumnContext, GeneratorMatcher, ValueGenerators, fallback_value};
use crate::inserter::flush_batch;
use crate::policy::{ColumnPolicy, ProduceContext, ProduceError, Producer, RowValues, TablePlan};
use crate::pool::PrimaryKeyPool;
use crate::report::{PopulateReport, TableReport, TableStatus};
use crate::sink::BatchSink;
use crate::value::GeneratedValue;

/// Run-level cancellation, checked between rows and between tables.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of building one row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// Column values in declaration order.
    Row(Vec<(String, GeneratedValue)>),
    Skip { reason: String },
}

/// Populates every targeted table of a catalog in dependency order.
pub struct PopulateEngine<'a> {
    catalog: &'a Catalog,
    plan: &'a Plan,
    policy: ColumnPolicy,
    generators: ValueGenerators,
    pool: PrimaryKeyPool,
    cancel: CancelFlag,
}

impl<'a> PopulateEngine<'a> {
    pub fn new(catalog: &'a Catalog, plan: &'a Plan, policy: ColumnPolicy) -> Self {
        Self {
            catalog,
            plan,
            policy,
            generators: ValueGenerators::default(),
            pool: PrimaryKeyPool::new(),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_matcher(mut self, matcher: Box<dyn GeneratorMatcher>) -> Self {
        self.generators = ValueGenerators::new(matcher);
        self
    }

    pub fn with_generators(mut self, generators: ValueGenerators) -> Self {
        self.generators = generators;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn pool(&self) -> &PrimaryKeyPool {
        &self.pool
    }

    /// Resolve the processing order, then generate and insert every targeted
    /// table. Only catalog, cycle and sink-commit errors abort the run; failed
    /// batches are recorded in the report.
    pub async fn run<S: BatchSink + ?Sized>(
        &mut self,
        sink: &mut S,
        content: &mut ContentStore,
    ) -> Result<PopulateReport, PopulateError> {
        let catalog = self.catalog;
        let order: Vec<TableKey> = resolve_order(&DependencyGraph::from_catalog(catalog))?
            .into_iter()
            .filter(|key| catalog.contains(key))
            .collect();
        let seed = self.plan.seed.unwrap_or_else(|| rand::rng().random());
        let commit_every = self.plan.commit_every.max(1);

        let mut report = PopulateReport {
            seed,
            order: order.iter().map(ToString::to_string).collect(),
            ..PopulateReport::default()
        };
        info!(seed, tables = order.len(), "population started");

        let mut completed = 0_usize;
        for key in &order {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let Some(entry) = catalog.table(key) else {
                continue;
            };
            let table_name = key.to_string();

            if self.policy.is_table_excluded(key) {
                report.record_table(TableReport::new(table_name, TableStatus::Excluded, 0));
                continue;
            }
            let rows = match self.plan.rows_for(&table_name) {
                Some(rows) if rows > 0 && schema_selected(self.plan, &key.schema) => rows,
                _ => {
                    report.record_table(TableReport::new(
                        table_name,
                        TableStatus::NotTargeted,
                        0,
                    ));
                    continue;
                }
            };

            let (table_report, failure) =
                self.populate_table(&mut *sink, content, entry, rows, seed).await;
            if let Some(message) = failure {
                report.record_failure(&table_name, message);
            }
            let cancelled = table_report.status == TableStatus::Cancelled;
            report.record_table(table_report);
            if cancelled {
                report.cancelled = true;
                break;
            }

            completed += 1;
            if completed % commit_every == 0 {
                sink.checkpoint().await?;
            }
        }

        sink.finish().await?;
        info!(
            rows_inserted = report.rows_inserted,
            rows_skipped = report.rows_skipped,
            fallbacks = report.fallbacks,
            failed_tables = report.failed_tables.len(),
            cancelled = report.cancelled,
            "population finished"
        );
        Ok(report)
    }

    async fn populate_table<S: BatchSink + ?Sized>(
        &mut self,
        sink: &mut S,
        content: &mut ContentStore,
        entry: &TableEntry,
        rows: u64,
        seed: u64,
    ) -> (TableReport, Option<String>) {
        let key = &entry.key;
        let table_plan = self.policy.plan_table(entry);
        let mut rng = ChaCha8Rng::seed_from_u64(hash_seed(seed, &key.to_string()));
        let mut assembler =
            BatchAssembler::new(key.clone(), entry.generated.clone(), self.plan.batch_size);
        let mut report = TableReport::new(key.to_string(), TableStatus::Populated, rows);
        let mut failure = None;

        info!(table = %key, rows, columns = table_plan.columns.len(), "populating table");

        'rows: for _ in 0..rows {
            if self.cancel.is_cancelled() {
                report.status = TableStatus::Cancelled;
                break;
            }
            let outcome =
                self.generate_row(entry, &table_plan, &mut rng, content, &mut report.fallbacks);
            let values = match outcome {
                RowOutcome::Row(values) => values,
                RowOutcome::Skip { reason } => {
                    warn!(table = %key, reason = %reason, "row skipped");
                    report.rows_skipped += 1;
                    continue;
                }
            };
            for batch in assembler.push(values) {
                match flush_batch(&mut *sink, &mut self.pool, entry, &batch).await {
                    Ok(inserted) => {
                        report.rows_inserted += inserted;
                        report.batches += 1;
                    }
                    Err(err) => {
                        failure = Some(err.to_string());
                        break 'rows;
                    }
                }
            }
        }

        if failure.is_none()
            && let Some(batch) = assembler.finish()
        {
            match flush_batch(&mut *sink, &mut self.pool, entry, &batch).await {
                Ok(inserted) => {
                    report.rows_inserted += inserted;
                    report.batches += 1;
                }
                Err(err) => failure = Some(err.to_string()),
            }
        }

        if let Some(message) = &failure {
            report.status = TableStatus::Failed;
            warn!(
                table = %key,
                rows_inserted = report.rows_inserted,
                error = %message,
                "batch insert failed; table not populated"
            );
        }
        info!(
            table = %key,
            status = ?report.status,
            rows_inserted = report.rows_inserted,
            rows_skipped = report.rows_skipped,
            fallbacks = report.fallbacks,
            "table finished"
        );
        (report, failure)
    }

    /// Build one row: FK groups first, then custom producers, then the
    /// type-driven generators. Later groups see earlier values.
    pub fn generate_row(
        &mut self,
        entry: &TableEntry,
        table_plan: &TablePlan,
        rng: &mut dyn RngCore,
        content: &mut ContentStore,
        fallbacks: &mut u64,
    ) -> RowOutcome {
        let key = &entry.key;
        let mut row = RowValues::new();

        for group in &table_plan.foreign_keys {
            for (column, producer) in &group.custom {
                if row.contains_key(column) {
                    continue;
                }
                let (result, writes) =
                    call_producer(producer.as_ref(), key, column, &row, &mut *rng, content);
                match result {
                    Ok(value) => {
                        let value = match entry.column(column) {
                            Some(col_def) => value.truncated_for(col_def),
                            None => value,
                        };
                        row.insert(column.clone(), value);
                    }
                    Err(ProduceError::Skip(reason)) => return RowOutcome::Skip { reason },
                    Err(ProduceError::Failed(err)) => {
                        warn!(
                            table = %key,
                            column = %column,
                            producer = %producer.name(),
                            error = %err,
                            "producer failed; resolving from parent keys"
                        );
                        *fallbacks += 1;
                    }
                }
                fold_writes(key, producer.as_ref(), writes, table_plan, &mut row);
            }

            let fk = &group.foreign_key;
            let unresolved: Vec<&String> = group
                .columns
                .iter()
                .filter(|column| !row.contains_key(*column))
                .collect();
            if unresolved.is_empty() {
                continue;
            }

            let parent_keys = self.catalog.key_columns(&fk.parent);
            match self.pool.pick(&fk.parent, &mut *rng) {
                Some(picked) => {
                    for column in unresolved {
                        let value = fk
                            .columns
                            .iter()
                            .position(|name| name == column)
                            .and_then(|idx| fk.parent_columns.get(idx))
                            .and_then(|parent_column| {
                                parent_keys.iter().position(|name| name == parent_column)
                            })
                            .and_then(|idx| picked.get(idx))
                            .cloned()
                            .unwrap_or(GeneratedValue::Null);
                        row.insert(column.clone(), value);
                    }
                }
                None => {
                    let required = unresolved.iter().any(|column| {
                        entry
                            .column(column)
                            .is_some_and(|col_def| !col_def.is_nullable)
                    });
                    if required {
                        return RowOutcome::Skip {
                            reason: format!(
                                "no rows in {} for non-nullable {}",
                                fk.parent,
                                fk.columns.join(", ")
                            ),
                        };
                    }
                    for column in unresolved {
                        row.insert(column.clone(), GeneratedValue::Null);
                    }
                }
            }
        }

        for (column, producer) in &table_plan.custom {
            if row.contains_key(column) {
                continue;
            }
            let Some(col_def) = entry.column(column) else {
                continue;
            };
            let (result, writes) =
                call_producer(producer.as_ref(), key, column, &row, &mut *rng, content);
            let value = match result {
                Ok(value) => value.truncated_for(col_def),
                Err(ProduceError::Skip(reason)) => return RowOutcome::Skip { reason },
                Err(ProduceError::Failed(err)) => {
                    warn!(
                        table = %key,
                        column = %column,
                        producer = %producer.name(),
                        error = %err,
                        "producer failed; using fallback value"
                    );
                    *fallbacks += 1;
                    fallback_value(col_def, self.catalog.enum_labels(col_def))
                }
            };
            row.insert(column.clone(), value);
            fold_writes(key, producer.as_ref(), writes, table_plan, &mut row);
        }

        for column in &table_plan.standard {
            if row.contains_key(column) {
                continue;
            }
            let Some(col_def) = entry.column(column) else {
                continue;
            };
            let enum_labels = self.catalog.enum_labels(col_def);
            let ctx = ColumnContext {
                table: key,
                column: col_def,
                enum_labels,
                unique: entry.unique_columns.contains(column),
            };
            let value = match self.generators.generate(ctx, &mut *rng) {
                Ok(value) => value.truncated_for(col_def),
                Err(err) => {
                    warn!(
                        table = %key,
                        column = %column,
                        error = %err,
                        "generator failed; using fallback value"
                    );
                    *fallbacks += 1;
                    fallback_value(col_def, enum_labels)
                }
            };
            row.insert(column.clone(), value);
        }

        RowOutcome::Row(
            table_plan
                .columns
                .iter()
                .filter_map(|column| row.remove(column).map(|value| (column.clone(), value)))
                .collect(),
        )
    }
}

/// Compile the plan's policy and run the engine with default generators.
pub async fn populate<S: BatchSink + ?Sized>(
    catalog: &Catalog,
    plan: &Plan,
    sink: &mut S,
    content: &mut ContentStore,
    expander: Option<&dyn ContentExpander>,
) -> Result<PopulateReport, PopulateError> {
    let policy = ColumnPolicy::from_plan(plan, content, expander)?;
    PopulateEngine::new(catalog, plan, policy)
        .run(sink, content)
        .await
}

fn call_producer(
    producer: &dyn Producer,
    table: &TableKey,
    column: &str,
    row: &RowValues,
    rng: &mut dyn RngCore,
    content: &mut ContentStore,
) -> (Result<GeneratedValue, ProduceError>, RowValues) {
    let mut ctx = ProduceContext::new(table, column, row, rng, content);
    let result = producer.produce(&mut ctx);
    (result, ctx.into_writes())
}

/// Keep producer writes to declared, writable columns that are still unset.
fn fold_writes(
    table: &TableKey,
    producer: &dyn Producer,
    writes: RowValues,
    table_plan: &TablePlan,
    row: &mut RowValues,
) {
    for (column, value) in writes {
        if !producer.fan_out().contains(&column) {
            warn!(
                table = %table,
                column = %column,
                producer = %producer.name(),
                "dropping write to undeclared column"
            );
            continue;
        }
        if !table_plan.writable.contains(&column) {
            warn!(
                table = %table,
                column = %column,
                producer = %producer.name(),
                "dropping write to generated or excluded column"
            );
            continue;
        }
        row.entry(column).or_insert(value);
    }
}

fn schema_selected(plan: &Plan, schema: &str) -> bool {
    let filter = &plan.schemas;
    (filter.include.is_empty() || filter.include.iter().any(|name| name == schema))
        && !filter.exclude.iter().any(|name| name == schema)
}

fn hash_seed(seed: u64, key: &str) -> u64 {
    let mut hash = seed ^ 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
