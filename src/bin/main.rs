//! chartsql CLI - Compile chart requests to BigQuery SQL
//!
//! Usage:
//!   chartsql compile <request.json> [--settings <file>] [--output <format>]
//!   chartsql sanitize <key>...
//!   chartsql tables [--settings <file>]
//!
//! Examples:
//!   chartsql compile chart.json
//!   chartsql compile chart.json --output json
//!   chartsql sanitize "1.kjøp" "skjema.steg"

use clap::{Parser, Subcommand, ValueEnum};
use chartsql::compile::{ChartRequest, CompileOptions};
use chartsql::config::{Settings, TableKind};
use chartsql::planner::columns::sanitize_identifier;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chartsql")]
#[command(about = "chartsql - Compile chart configurations to BigQuery SQL")]
#[command(version)]
struct Cli {
    /// Log compilation decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a chart request to SQL
    Compile {
        /// Path to the request JSON: { "config", "filters", "parameters" }
        file: PathBuf,

        /// Settings file (defaults to the standard search path)
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "sql")]
        output: OutputFormat,
    },

    /// Print the sanitized identifier for each key
    Sanitize {
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Print the fully-qualified table names in use
    Tables {
        /// Settings file (defaults to the standard search path)
        #[arg(short, long)]
        settings: Option<PathBuf>,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Output SQL only
    Sql,
    /// Output SQL with comments
    Verbose,
    /// Output the query request body: {"query": "<sql>"}
    Json,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Compile {
            file,
            settings,
            output,
        } => cmd_compile(file, settings, output),
        Commands::Sanitize { keys } => cmd_sanitize(keys),
        Commands::Tables { settings } => cmd_tables(settings),
    }
}

fn load_settings(path: Option<PathBuf>) -> Result<Settings, ExitCode> {
    let result = match &path {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    result.map_err(|e| {
        eprintln!("Error loading settings: {}", e);
        ExitCode::FAILURE
    })
}

fn cmd_compile(file: PathBuf, settings: Option<PathBuf>, output: OutputFormat) -> ExitCode {
    let settings = match load_settings(settings) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let request = match ChartRequest::from_file(&file) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error reading '{}': {}", file.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let compiled = request.compile(&CompileOptions::from_settings(&settings));

    match output {
        OutputFormat::Sql => {
            println!("{}", compiled.sql);
        }
        OutputFormat::Verbose => {
            println!("-- chartsql compiled SQL");
            println!("-- Source: {}", file.display());
            println!(
                "-- Mode: {}",
                if compiled.interactive { "interactive" } else { "literal" }
            );
            for gap in &compiled.diagnostics {
                println!("-- {:?}: {}", gap.level(), gap);
            }
            println!();
            println!("{}", compiled.sql);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "query": compiled.sql }));
        }
    }
    ExitCode::SUCCESS
}

fn cmd_sanitize(keys: Vec<String>) -> ExitCode {
    for key in keys {
        println!("{}\t{}", key, sanitize_identifier(&key));
    }
    ExitCode::SUCCESS
}

fn cmd_tables(settings: Option<PathBuf>) -> ExitCode {
    let settings = match load_settings(settings) {
        Ok(s) => s,
        Err(code) => return code,
    };

    for (label, kind) in [
        ("events", TableKind::Events),
        ("sessions", TableKind::Sessions),
        ("event_data", TableKind::EventData),
    ] {
        println!("{:<12}{}", label, settings.tables.qualified(kind));
    }
    ExitCode::SUCCESS
}
