//! Inspect command implementation.

use super::format_size;
use crate::error::{CliError, CliResult};
use crate::Format;
use serde::Serialize;
use std::path::Path;
use tidelog_core::wal::naming::list_backup_files;
use tidelog_core::{file_name_for, list_journal_files, DirLock, JournalReader};

/// Journal directory inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Journal directory.
    pub path: String,
    /// Journal files, oldest first.
    pub files: Vec<FileInfo>,
    /// Rotation backups awaiting removal.
    pub backups: Vec<String>,
    /// Highest file number present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highest_file: Option<u32>,
    /// Total size of the journal files in bytes.
    pub total_size: u64,
    /// Lock holder, if the lock file names one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock: Option<LockSummary>,
}

/// Statistics for a single journal file.
#[derive(Debug, Serialize)]
pub struct FileInfo {
    /// File number.
    pub number: u32,
    /// File name.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Number of complete records.
    pub records: usize,
    /// Number of checkpoint records.
    pub checkpoints: usize,
    /// Bytes after the last complete record.
    pub torn_bytes: u64,
}

/// Lock file contents.
#[derive(Debug, Serialize)]
pub struct LockSummary {
    /// Holder process id.
    pub pid: u32,
    /// Last heartbeat in unix milliseconds.
    pub heartbeat_ms: u64,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: Format) -> CliResult<()> {
    let result = collect(path)?;
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        Format::Text => print_text_output(&result),
    }
    Ok(())
}

/// Gathers the inspection result for `path`.
pub fn collect(path: &Path) -> CliResult<InspectResult> {
    let numbers = list_journal_files(path)?;
    let backups = list_backup_files(path)?;
    if numbers.is_empty() && backups.is_empty() {
        return Err(CliError::NoJournal(path.to_path_buf()));
    }

    let mut files = Vec::with_capacity(numbers.len());
    for &number in &numbers {
        let reader = JournalReader::open(path, number)?;
        let size = reader.size()?;
        let mut records = 0;
        let mut checkpoints = 0;
        for record in reader.records()? {
            let record = record?;
            records += 1;
            if record.is_checkpoint() {
                checkpoints += 1;
            }
        }
        files.push(FileInfo {
            number,
            name: file_name_for(number),
            size,
            records,
            checkpoints,
            torn_bytes: size - reader.valid_end()?,
        });
    }

    Ok(InspectResult {
        path: path.display().to_string(),
        total_size: files.iter().map(|f| f.size).sum(),
        highest_file: numbers.last().copied(),
        files,
        backups: backups
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect(),
        lock: DirLock::peek(path).map(|info| LockSummary {
            pid: info.pid,
            heartbeat_ms: info.heartbeat_ms,
        }),
    })
}

fn print_text_output(result: &InspectResult) {
    println!("tidelog Journal Inspection");
    println!("==========================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Files:");
    for file in &result.files {
        let torn = if file.torn_bytes > 0 {
            format!(", {} torn bytes", file.torn_bytes)
        } else {
            String::new()
        };
        println!(
            "  {}  {:>10}  {} records, {} checkpoints{}",
            file.name,
            format_size(file.size),
            file.records,
            file.checkpoints,
            torn
        );
    }
    for backup in &result.backups {
        println!("  {backup}  (backup)");
    }
    println!();
    println!("Total size: {}", format_size(result.total_size));
    match result.highest_file {
        Some(n) => println!("Newest file: {n:#x}"),
        None => println!("Newest file: none"),
    }
    match &result.lock {
        Some(lock) => println!("Lock: pid {} (heartbeat {} ms)", lock.pid, lock.heartbeat_ms),
        None => println!("Lock: not held"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tidelog_core::{
        EntryType, FlushMode, JournalConfig, JournalManager, LogRecord, TransactionId,
    };

    #[test]
    fn collects_file_statistics() {
        let dir = tempdir().unwrap();
        {
            let journal = JournalManager::open(JournalConfig::new(dir.path())).unwrap();
            for i in 0..3 {
                let mut record =
                    LogRecord::new(EntryType::new(1), TransactionId::new(i), vec![0u8; 7]);
                journal.append(&mut record).unwrap();
            }
            journal.flush(FlushMode::FlushOnly).unwrap();
            journal.shutdown(TransactionId::NONE, true).unwrap();
        }

        let result = collect(dir.path()).unwrap();
        assert_eq!(result.highest_file, Some(0));
        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].records, 4);
        assert_eq!(result.files[0].checkpoints, 1);
        assert_eq!(result.files[0].torn_bytes, 0);
        assert_eq!(result.total_size, 3 * 20 + 29);
        assert!(result.lock.is_none());
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(collect(dir.path()), Err(CliError::NoJournal(_))));
    }
}
