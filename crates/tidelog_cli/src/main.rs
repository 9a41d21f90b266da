//! tidelog CLI
//!
//! Command-line tools for tidelog journal directories.
//!
//! # Commands
//!
//! - `inspect` - List journal files, sizes and the lock holder
//! - `verify` - Check that every journal file ends on a complete record
//! - `dump` - Print the records of a journal file
//! - `truncate-tail` - Cut a torn tail off a journal file

mod commands;
mod error;

use clap::{Parser, Subcommand, ValueEnum};
use error::{CliError, CliResult};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// tidelog command-line journal tools.
#[derive(Parser)]
#[command(name = "tidelog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the journal directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List journal files, sizes and the lock holder
    Inspect {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Check that every journal file ends on a complete record
    Verify {
        /// Only check this file number (hex)
        #[arg(short, long, value_parser = parse_hex)]
        file: Option<u32>,
    },

    /// Print the records of a journal file
    Dump {
        /// File number (hex); defaults to the newest file
        #[arg(short, long, value_parser = parse_hex)]
        file: Option<u32>,

        /// Maximum number of records to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print from the newest record backwards
        #[arg(short, long)]
        reverse: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Cut a torn tail off a journal file
    TruncateTail {
        /// File number (hex); defaults to the newest file
        #[arg(short, long, value_parser = parse_hex)]
        file: Option<u32>,

        /// Report what would be removed without changing the file
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
}

fn parse_hex(s: &str) -> Result<u32, String> {
    let digits = s.trim_start_matches("0x");
    u32::from_str_radix(digits, 16).map_err(|e| format!("invalid file number {s:?}: {e}"))
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or(CliError::PathRequired("inspect"))?;
            commands::inspect::run(&path, format)?;
        }
        Commands::Verify { file } => {
            let path = cli.path.ok_or(CliError::PathRequired("verify"))?;
            commands::verify::run(&path, file)?;
        }
        Commands::Dump {
            file,
            limit,
            reverse,
            format,
        } => {
            let path = cli.path.ok_or(CliError::PathRequired("dump"))?;
            commands::dump::run(&path, file, limit, reverse, format)?;
        }
        Commands::TruncateTail { file, dry_run } => {
            let path = cli.path.ok_or(CliError::PathRequired("truncate-tail"))?;
            commands::truncate_tail::run(&path, file, dry_run)?;
        }
        Commands::Version => {
            println!("tidelog CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("tidelog Core v{}", tidelog_core::VERSION);
        }
    }

    Ok(())
}
