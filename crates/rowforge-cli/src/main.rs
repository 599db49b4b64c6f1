mod registry;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use rowforge_core::{
    Catalog, DatabaseSchema, Error as CoreError, TableKey, build_fk_graph_report,
    redact_connection_string, validate_schema,
};
use rowforge_generate::{
    BatchSink, ColumnPolicy, ContentError, ContentStore, MemorySink, NamedGenerator,
    PopulateEngine, PopulateError, PopulateReport, PostgresSink, TableStatus,
};
use rowforge_introspect::{IntrospectOptions, introspect_postgres_with_options};
use rowforge_plan::{
    Plan, PlanError, ValidationReport, load_plan_document, plan_json_schema, validate_plan,
};
use registry::{
    RunConfig, RunContext, collect_git_info, init_run_logging, init_stderr_logging, start_run,
    write_json,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("plan error: {0}")]
    Plan(#[from] PlanError),
    #[error("invalid plan:\n{0}")]
    InvalidPlan(String),
    #[error("population error: {0}")]
    Populate(#[from] PopulateError),
    #[error("content store error: {0}")]
    Content(#[from] ContentError),
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unsupported engine: {0}")]
    UnsupportedEngine(String),
}

#[derive(Parser, Debug)]
#[command(name = "rowforge", version, about = "FK-aware synthetic data population")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the schema snapshot as JSON.
    Introspect(IntrospectArgs),
    /// Print the FK dependency order, or the cycle preventing one.
    Order(OrderArgs),
    /// Generate and insert rows in dependency order.
    Populate(PopulateArgs),
}

#[derive(Args, Debug)]
struct ConnArgs {
    /// Database connection string (flag form).
    #[arg(long, value_name = "CONNECTION_STRING", conflicts_with = "conn_pos")]
    conn: Option<String>,
    /// Database connection string (positional form).
    #[arg(value_name = "CONNECTION_STRING", required_unless_present = "conn")]
    conn_pos: Option<String>,
}

impl ConnArgs {
    fn resolve(self) -> Result<String, CliError> {
        match (self.conn, self.conn_pos) {
            (Some(value), None) | (None, Some(value)) => Ok(value),
            (Some(_), Some(_)) => Err(CliError::InvalidConfig(
                "use either --conn or positional connection string".to_string(),
            )),
            (None, None) => Err(CliError::InvalidConfig(
                "connection string is required".to_string(),
            )),
        }
    }
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Schema name(s) to include.
    #[arg(long, value_name = "SCHEMA")]
    schema: Vec<String>,
    /// Schema name(s) to leave out.
    #[arg(long, value_name = "SCHEMA")]
    exclude_schema: Vec<String>,
    /// Include system schemas such as pg_catalog.
    #[arg(long, default_value_t = false)]
    include_system_schemas: bool,
}

impl SchemaArgs {
    fn options(&self) -> IntrospectOptions {
        IntrospectOptions {
            include_system_schemas: self.include_system_schemas,
            ..IntrospectOptions::with_schemas(self.schema.clone(), self.exclude_schema.clone())
        }
    }
}

#[derive(Args, Debug)]
struct IntrospectArgs {
    #[command(flatten)]
    conn: ConnArgs,
    #[command(flatten)]
    schemas: SchemaArgs,
    /// Output path for the snapshot; stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct OrderArgs {
    #[command(flatten)]
    conn: ConnArgs,
    #[command(flatten)]
    schemas: SchemaArgs,
    /// Print the full graph report as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Args, Debug)]
struct PopulateArgs {
    #[command(flatten)]
    conn: ConnArgs,
    /// Plan file (.json or .toml).
    #[arg(long)]
    plan: Option<PathBuf>,
    /// Content store loaded at start and saved at the end.
    #[arg(long)]
    content: Option<PathBuf>,
    /// Generate against the live catalog but keep rows in memory.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
    /// Output directory for runs.
    #[arg(long, default_value = "runs")]
    run_dir: PathBuf,
    /// Override the plan's batch size.
    #[arg(long)]
    batch_size: Option<usize>,
    /// Override the plan's default row count.
    #[arg(long)]
    rows: Option<u64>,
    /// Override the plan's seed.
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Introspect(args) => run_introspect(args).await,
        Command::Order(args) => run_order(args).await,
        Command::Populate(args) => run_populate(args).await,
    }
}

async fn run_introspect(args: IntrospectArgs) -> Result<(), CliError> {
    init_stderr_logging()?;
    let conn = args.conn.resolve()?;
    let engine = detect_engine(&conn)?;
    tracing::info!(event = "engine_detected", engine = %engine);

    let pool = connect(&conn).await?;
    let schema = load_schema(&pool, args.schemas.options()).await?;

    match args.out {
        Some(path) => {
            write_json(&path, &schema)?;
            tracing::info!(event = "schema_written", path = %path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&schema)?),
    }
    Ok(())
}

async fn run_order(args: OrderArgs) -> Result<(), CliError> {
    init_stderr_logging()?;
    let conn = args.conn.resolve()?;
    detect_engine(&conn)?;

    let pool = connect(&conn).await?;
    let schema = load_schema(&pool, args.schemas.options()).await?;
    let report = build_fk_graph_report(&Catalog::from_schema(&schema));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if let Some(order) = &report.topo_order {
        for (idx, table) in order.iter().enumerate() {
            println!("{:>4}  {table}", idx + 1);
        }
    }

    match report.cycle {
        Some(cycle) => {
            let cycle = cycle
                .iter()
                .map(|table| table.parse::<TableKey>())
                .collect::<Result<Vec<_>, _>>()?;
            Err(CliError::Core(CoreError::CyclicDependency { cycle }))
        }
        None => Ok(()),
    }
}

async fn run_populate(args: PopulateArgs) -> Result<(), CliError> {
    let PopulateArgs {
        conn,
        plan,
        content,
        dry_run,
        run_dir,
        batch_size,
        rows,
        seed,
    } = args;
    let conn = conn.resolve()?;
    let engine = detect_engine(&conn)?;

    let mut plan = match plan {
        Some(path) => load_plan(&path)?,
        None => Plan::default(),
    };
    if let Some(batch_size) = batch_size {
        if batch_size == 0 {
            return Err(CliError::InvalidConfig("--batch-size must be > 0".to_string()));
        }
        plan.batch_size = batch_size;
    }
    if let Some(rows) = rows {
        plan.default_rows = rows;
    }
    if seed.is_some() {
        plan.seed = seed;
    }

    let run_ctx = RunContext {
        run_id: Uuid::new_v4().to_string(),
        started_at: chrono::Utc::now(),
        run_dir,
    };
    let run_paths = start_run(&run_ctx)?;
    init_run_logging(&run_paths.logs_path)?;
    tracing::info!(event = "run_started", run_id = %run_ctx.run_id, engine = %engine, dry_run);

    let timer = Instant::now();
    let pool = connect(&conn).await?;
    let options = IntrospectOptions::with_schemas(
        plan.schemas.include.clone(),
        plan.schemas.exclude.clone(),
    );
    let schema = load_schema(&pool, options).await?;
    let catalog = Catalog::from_schema(&schema);

    write_json(
        &run_paths.config_path,
        &RunConfig {
            run_id: run_ctx.run_id.clone(),
            started_at: run_ctx.started_at.to_rfc3339(),
            engine: engine.to_string(),
            dry_run,
            connection: redact_connection_string(&conn),
            catalog_fingerprint: catalog.fingerprint().to_string(),
            tables: catalog.table_keys().len(),
            plan: plan.clone(),
            git: collect_git_info(),
        },
    )?;

    let mut store = match &content {
        Some(path) => ContentStore::load(path)?,
        None => ContentStore::new(),
    };
    let policy = ColumnPolicy::from_plan(&plan, &mut store, None)?;
    let mut populator = PopulateEngine::new(&catalog, &plan, policy);

    let cancel = populator.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!(event = "cancel_requested");
            cancel.cancel();
        }
    });

    let mut sink: Box<dyn BatchSink> = if dry_run {
        Box::new(MemorySink::new())
    } else {
        Box::new(PostgresSink::begin(pool.clone()).await?)
    };
    let report = populator.run(sink.as_mut(), &mut store).await?;

    write_json(&run_paths.report_path, &report)?;
    if let Some(path) = &content {
        store.save(path)?;
    }

    tracing::info!(
        event = "run_finished",
        rows_inserted = report.rows_inserted,
        failed_tables = report.failed_tables.len(),
        duration_ms = timer.elapsed().as_millis() as u64
    );
    print_summary(&report, &run_paths.root);
    Ok(())
}

fn load_plan(path: &Path) -> Result<Plan, CliError> {
    let document = load_plan_document(path)?;
    let schema = serde_json::to_value(plan_json_schema())?;
    let known = NamedGenerator::known_ids();
    match validate_plan(&document, &schema, &known) {
        Ok(validated) => {
            for warning in &validated.warnings {
                eprintln!("warning: {} at {}: {}", warning.code, warning.path, warning.message);
            }
            Ok(validated.plan)
        }
        Err(report) => Err(CliError::InvalidPlan(format_issues(&report))),
    }
}

fn format_issues(report: &ValidationReport) -> String {
    report
        .errors
        .iter()
        .map(|issue| {
            let hint = issue
                .hint
                .as_deref()
                .map(|hint| format!(" ({hint})"))
                .unwrap_or_default();
            format!("  {} at {}: {}{hint}", issue.code, issue.path, issue.message)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

async fn connect(conn: &str) -> Result<PgPool, CliError> {
    Ok(PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect(conn)
        .await?)
}

async fn load_schema(
    pool: &PgPool,
    options: IntrospectOptions,
) -> Result<DatabaseSchema, CliError> {
    tracing::info!(event = "introspection_started");
    let schema = introspect_postgres_with_options(pool, options).await?;
    validate_schema(&schema)?;
    tracing::info!(event = "introspection_finished", schemas = schema.schemas.len());
    Ok(schema)
}

fn print_summary(report: &PopulateReport, run_root: &Path) {
    println!("seed: {}", report.seed);
    for table in &report.tables {
        let status = match table.status {
            TableStatus::Populated => "populated",
            TableStatus::Failed => "FAILED",
            TableStatus::Excluded => "excluded",
            TableStatus::NotTargeted => "not targeted",
            TableStatus::Cancelled => "cancelled",
        };
        println!(
            "{:<40} {:>8} rows  {:>6} skipped  {:>6} fallbacks  {status}",
            table.table, table.rows_inserted, table.rows_skipped, table.fallbacks
        );
    }
    for (table, message) in &report.failed_tables {
        println!("not populated: {table}: {message}");
    }
    println!(
        "total: {} rows inserted, {} skipped, {} fallbacks{}",
        report.rows_inserted,
        report.rows_skipped,
        report.fallbacks,
        if report.cancelled { " (cancelled)" } else { "" }
    );
    println!("run: {}", run_root.display());
}

fn detect_engine(conn: &str) -> Result<&'static str, CliError> {
    if conn.starts_with("postgres://") || conn.starts_with("postgresql://") {
        Ok("postgres")
    } else {
        Err(CliError::UnsupportedEngine(
            redact_connection_string(conn).redacted,
        ))
    }
}
