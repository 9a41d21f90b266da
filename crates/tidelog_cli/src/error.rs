//! CLI error type.

use std::path::PathBuf;
use thiserror::Error;
use tidelog_core::JournalError;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// A command needs `--path`.
    #[error("journal directory required for {0} (use --path)")]
    PathRequired(&'static str),

    /// The directory holds no journal files.
    #[error("no journal files found in {}", .0.display())]
    NoJournal(PathBuf),

    /// A requested journal file does not exist.
    #[error("journal file {0:#x} not found")]
    FileNotFound(u32),

    /// One or more files failed verification.
    #[error("{0} journal file(s) failed verification")]
    VerifyFailed(usize),

    /// Journal error.
    #[error(transparent)]
    Journal(#[from] JournalError),

    /// JSON output error.
    #[error("failed to write JSON: {0}")]
    Json(#[from] serde_json::Error),
}
