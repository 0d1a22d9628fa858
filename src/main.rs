//! CLI entry point for `sqlranger`.

use std::io::Read;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use sqlranger::classifier::checker::PartitionChecker;
use sqlranger::classifier::config::CheckerConfig;
use sqlranger::classifier::partition_spec::PartitionSpec;
use sqlranger::classifier::patterns::AliasPolicy;
use sqlranger::output::formatter::{self, OutputFormat, QueryResult};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "sqlranger",
    about = "Check SQL queries for partition filters and finite date ranges"
)]
struct Cli {
    /// Input SQL files, one query text each (stdin when omitted)
    input: Vec<PathBuf>,

    /// JSON checker configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Partitioned table as TABLE:COLUMN (repeatable)
    #[arg(long = "table", value_name = "TABLE:COLUMN")]
    tables: Vec<String>,

    /// Date pattern applied to --table entries (e.g. YYYY-mm-dd)
    #[arg(long)]
    date_pattern: Option<String>,

    /// Maximum date range in days for --table entries
    #[arg(long, requires = "date_pattern")]
    max_days: Option<u32>,

    /// SQL dialect name
    #[arg(long)]
    dialect: Option<String>,

    /// How several occurrences of one table are combined
    #[arg(long)]
    alias_policy: Option<AliasPolicy>,

    /// Treat > and < as finite bounds
    #[arg(long)]
    strict_bounds: bool,

    /// Report unparseable SQL as an error
    #[arg(long)]
    strict: bool,

    /// Output format: text, json or markdown
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    /// Write output to a file instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print verbose diagnostics
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(2);
        }
    };
    let strict = config.strict;

    let checker = match PartitionChecker::from_config(config) {
        Ok(checker) => checker,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(2);
        }
    };
    debug!(
        tables = checker.specs().len(),
        dialect = %checker.options().dialect,
        alias_policy = %checker.options().alias_policy,
        "checker ready"
    );

    let inputs = match read_inputs(&cli.input) {
        Ok(inputs) => inputs,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(2);
        }
    };

    let results: Vec<QueryResult> = inputs
        .into_iter()
        .map(|(source, sql)| check_source(&checker, source, &sql, strict))
        .collect();

    let rendered = match formatter::render(&results, cli.format) {
        Ok(rendered) => rendered,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(2);
        }
    };
    match &cli.output {
        Some(path) => {
            if let Err(e) = formatter::write_output(path, &rendered) {
                eprintln!("Error writing output: {e}");
                process::exit(2);
            }
        }
        None => print!("{rendered}"),
    }

    if formatter::has_errors(&results) {
        process::exit(2);
    }
    if formatter::has_violations(&results) {
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Merge the config file with command-line overrides.
fn build_config(cli: &Cli) -> Result<CheckerConfig, String> {
    let mut specs = cli
        .tables
        .iter()
        .map(|entry| parse_table_arg(entry, cli.date_pattern.as_deref(), cli.max_days))
        .collect::<Result<Vec<_>, _>>()?;

    let mut config = match &cli.config {
        Some(path) => CheckerConfig::from_path(path).map_err(|e| e.to_string())?,
        None if specs.is_empty() => {
            return Err("No partitioned tables configured: use --config or --table".to_string())
        }
        None => CheckerConfig::new(Vec::new()),
    };
    config.tables.append(&mut specs);

    if let Some(dialect) = &cli.dialect {
        config.dialect = dialect.clone();
    }
    if let Some(policy) = cli.alias_policy {
        config.alias_policy = policy;
    }
    config.strict_bounds_are_finite |= cli.strict_bounds;
    config.strict |= cli.strict;
    Ok(config)
}

fn parse_table_arg(
    entry: &str,
    date_pattern: Option<&str>,
    max_days: Option<u32>,
) -> Result<PartitionSpec, String> {
    let Some((table, column)) = entry.rsplit_once(':') else {
        return Err(format!("Invalid --table '{entry}': expected TABLE:COLUMN"));
    };
    let spec = match date_pattern {
        Some(pattern) => PartitionSpec::with_dates(table, column, pattern, max_days),
        None => PartitionSpec::new(table, column),
    };
    spec.map_err(|e| format!("Invalid --table '{entry}': {e}"))
}

fn read_inputs(paths: &[PathBuf]) -> Result<Vec<(String, String)>, String> {
    if paths.is_empty() {
        let mut sql = String::new();
        std::io::stdin()
            .read_to_string(&mut sql)
            .map_err(|e| format!("Failed to read stdin: {e}"))?;
        return Ok(vec![("<stdin>".to_string(), sql)]);
    }
    paths
        .iter()
        .map(|path| {
            std::fs::read_to_string(path)
                .map(|sql| (path.display().to_string(), sql))
                .map_err(|e| format!("Failed to read {}: {e}", path.display()))
        })
        .collect()
}

fn check_source(checker: &PartitionChecker, source: String, sql: &str, strict: bool) -> QueryResult {
    if !strict {
        // Fail open: parse errors read as a clean result.
        let tables = checker.check_tables(sql).unwrap_or_else(|e| {
            debug!(%source, error = %e, "skipping unparseable query");
            Vec::new()
        });
        return QueryResult {
            source,
            tables,
            error: None,
        };
    }
    match checker.check_tables(sql) {
        Ok(tables) => QueryResult {
            source,
            tables,
            error: None,
        },
        Err(e) => QueryResult {
            source,
            tables: Vec::new(),
            error: Some(e.to_string()),
        },
    }
}
