//! StrataDB Command-Line Interface
//!
//! Inspects a StrataDB database file without modifying it.
//!
//! # Usage
//!
//! ```bash
//! # List tables
//! strata --db app.db tables
//!
//! # Show a schema
//! strata --db app.db schema users
//!
//! # Dump the first 20 rows as JSON
//! strata --db app.db -o json dump users --limit 20
//!
//! # Page and free-list statistics
//! strata --db app.db stats
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use strata_common::config::{DbConfig, StorageConfig};
use strata_table::Db;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;
mod formatter;

use commands::Command;
use formatter::OutputFormat;

/// StrataDB command-line interface
#[derive(Parser, Debug)]
#[command(
    name = "strata",
    version,
    about = "Inspect StrataDB database files",
    long_about = "Inspect StrataDB database files.\n\n\
                  Lists tables and schemas, dumps rows and reports page and\n\
                  free-list statistics. The database is opened read-only in\n\
                  practice: no command writes to it."
)]
struct Args {
    /// Database file
    #[arg(long, value_name = "FILE", env = "STRATA_DB")]
    db: PathBuf,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "table")]
    output: OutputFormatArg,

    /// Enable verbose output
    #[arg(short = 'v', long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Output format argument
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormatArg {
    /// Display results in a formatted table
    Table,
    /// Display results as JSON
    Json,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Table => OutputFormat::Table,
            OutputFormatArg::Json => OutputFormat::Json,
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose);

    let config = DbConfig::new(&args.db)
        .with_storage(StorageConfig::default().with_create_if_missing(false));
    let mut db = Db::open(config)
        .with_context(|| format!("cannot open {}", args.db.display()))?;
    info!(command = ?args.command, "running command");

    let output = args.command.execute(&mut db, args.output.into())?;
    println!("{}", output);
    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("strata_cli=debug,strata_table=debug,strata_storage=debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_dump() {
        let args =
            Args::try_parse_from(["strata", "--db", "x.db", "-o", "json", "dump", "users", "--limit", "5"])
                .unwrap();
        assert_eq!(args.db, PathBuf::from("x.db"));
        assert!(matches!(args.output, OutputFormatArg::Json));
        assert!(matches!(
            args.command,
            Command::Dump { ref table, limit: Some(5) } if table == "users"
        ));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Args::try_parse_from(["strata", "--db", "x.db"]).is_err());
    }
}
