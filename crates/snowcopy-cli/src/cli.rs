//! snowcopy - copy Snowflake tables into a local SQLite or DuckDB file

mod config;
mod logging;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use snowcopy_drivers::snowflake::SnowflakeSource;
use snowcopy_drivers::{Connection, SinkFlavor, WarehouseSource, open_sink};
use snowcopy_sync::{ConnectionScope, TableSyncer};

use crate::config::FileConfig;
use crate::logging::LoggingConfig;

/// Exit status for failures before any table was attempted
const EXIT_STARTUP_FAILURE: u8 = 2;

#[derive(Parser)]
#[command(name = "snowcopy")]
#[command(about = "Copy Snowflake tables into a local SQLite or DuckDB database")]
#[command(version)]
struct Cli {
    /// Path to TOML configuration file [default: ./snowcopy.toml if present]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON on stdout
    #[arg(long, global = true)]
    output_json: bool,

    /// Log verbosity: trace, debug, info, warn, error
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Also write JSON logs, rolled daily
    #[arg(long, global = true)]
    log_json: bool,

    /// Directory for JSON logs [default: platform data dir]
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Warehouse connection overrides, usually supplied through the environment
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Snowflake account identifier
    #[arg(long, env = "SNOW_ACCOUNT")]
    pub account: Option<String>,

    /// Bearer token for the SQL API
    #[arg(long, env = "SNOW_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// oauth, keypair_jwt or programmatic_access_token
    #[arg(long, env = "SNOW_TOKEN_TYPE")]
    pub token_type: Option<String>,

    #[arg(long, env = "SNOW_ROLE")]
    pub role: Option<String>,

    #[arg(long, env = "SNOW_WAREHOUSE")]
    pub warehouse: Option<String>,

    #[arg(long, env = "SNOW_DATABASE")]
    pub database: Option<String>,

    #[arg(long, env = "SNOW_SCHEMA")]
    pub schema: Option<String>,
}

/// Local store overrides
#[derive(Args, Debug, Clone)]
pub struct SinkArgs {
    /// Local store: sqlite or duckdb
    #[arg(long, value_parser = parse_flavor)]
    pub sink: Option<SinkFlavor>,

    /// Local database file
    #[arg(long)]
    pub path: Option<String>,
}

fn parse_flavor(value: &str) -> Result<SinkFlavor, String> {
    value.parse::<SinkFlavor>().map_err(|e| e.to_string())
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ScopeArg {
    /// Open and close the local database around each table
    #[value(alias = "per_table")]
    PerTable,
    /// Keep one local connection for the whole run
    Shared,
}

impl From<ScopeArg> for ConnectionScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::PerTable => ConnectionScope::PerTable,
            ScopeArg::Shared => ConnectionScope::Shared,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Copy the configured tables into the local database
    Sync {
        /// Table to copy; repeat to copy several (replaces the configured list)
        #[arg(short, long = "table")]
        tables: Vec<String>,

        /// Local connection lifetime
        #[arg(long, value_enum)]
        scope: Option<ScopeArg>,

        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        sink: SinkArgs,
    },

    /// Show a remote table's columns and the local types they map to
    Describe {
        /// Remote table name, optionally qualified
        table: String,

        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        sink: SinkArgs,
    },

    /// Run a SQL statement against the local database
    Query {
        /// Statement to run
        sql: String,

        #[command(flatten)]
        sink: SinkArgs,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut log_config = LoggingConfig::with_level(&cli.log_level);
    if cli.log_json {
        let log_dir = cli.log_dir.clone().unwrap_or_else(logging::log_directory);
        log_config = log_config.with_log_dir(Some(log_dir));
    }
    // dropped after `run` so the file writer drains
    let _log_guard = match logging::init(log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: failed to initialize logging: {:#}", e);
            return ExitCode::from(EXIT_STARTUP_FAILURE);
        }
    };

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(EXIT_STARTUP_FAILURE)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut file = FileConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Sync {
            tables,
            scope,
            source,
            sink,
        } => {
            file.apply_sink(&sink);
            if !tables.is_empty() {
                file.sync = file.sync.with_tables(tables);
            }
            if let Some(scope) = scope {
                file.sync = file.sync.with_connection_scope(scope.into());
            }
            file.sync.validate()?;

            let warehouse = connect_source(&file, &source)?;
            let syncer = TableSyncer::new(file.sync, warehouse)?;
            let report = syncer.run()?;

            if cli.output_json {
                println!("{}", report.to_json()?);
            } else {
                println!("{}", output::report_table(&report));
                println!(
                    "{} of {} tables loaded, {} rows into {}",
                    report.succeeded().len(),
                    report.tables.len(),
                    report.total_rows(),
                    syncer.config().sink.path
                );
            }
            Ok(ExitCode::from(report.exit_code()))
        }

        Commands::Describe {
            table,
            source,
            sink,
        } => {
            file.apply_sink(&sink);
            let warehouse = connect_source(&file, &source)?;
            let columns = warehouse
                .describe_table(&table)
                .with_context(|| format!("failed to describe {}", table))?;
            let mapper = file.sync.type_mapper();

            if cli.output_json {
                let json = output::describe_json(&table, &columns, &mapper);
                println!("{}", serde_json::to_string_pretty(&json)?);
            } else {
                println!("{}", output::describe_table(&columns, &mapper));
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Query { sql, sink } => {
            file.apply_sink(&sink);
            let target = &file.sync.sink;
            let connection = open_sink(target.flavor, &target.path)
                .with_context(|| format!("failed to open {} database {}", target.flavor, target.path))?;

            let result = connection.query(&sql, &[]);
            if let Err(e) = connection.close() {
                tracing::warn!(error = %e, "failed to close local database");
            }
            let result = result.context("query failed")?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&output::query_json(&result))?);
            } else {
                println!("{}", output::query_table(&result));
                println!("{} rows", result.row_count());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn connect_source(file: &FileConfig, args: &SourceArgs) -> anyhow::Result<Arc<dyn WarehouseSource>> {
    let config = file.resolve_source(args)?;
    let source = SnowflakeSource::connect(config).context("failed to connect to Snowflake")?;
    Ok(Arc::new(source))
}
