//! Verify command implementation.

use crate::error::{CliError, CliResult};
use std::path::Path;
use tidelog_core::{list_journal_files, JournalError, JournalReader};

/// Verification result for one journal file.
#[derive(Debug)]
pub struct VerifyResult {
    /// File number.
    pub number: u32,
    /// Number of complete records.
    pub records: usize,
    /// File size in bytes.
    pub size: u64,
    /// Offset just past the last complete record.
    pub valid_end: u64,
    /// Read error, if the file could not be scanned.
    pub error: Option<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.error.is_none() && self.valid_end == self.size
    }
}

/// Runs the verify command.
pub fn run(path: &Path, only: Option<u32>) -> CliResult<()> {
    println!("Verifying journal at {}", path.display());
    println!();

    let results = verify_dir(path, only)?;
    let failed = results.iter().filter(|r| !r.is_ok()).count();
    for result in &results {
        print_result(result);
    }

    println!();
    if failed == 0 {
        println!("All {} file(s) passed verification.", results.len());
        Ok(())
    } else {
        Err(CliError::VerifyFailed(failed))
    }
}

/// Verifies every journal file in `path`, or only `only`.
pub fn verify_dir(path: &Path, only: Option<u32>) -> CliResult<Vec<VerifyResult>> {
    let numbers: Vec<u32> = match only {
        Some(n) => vec![super::select_file(path, Some(n))?],
        None => list_journal_files(path)?,
    };
    if numbers.is_empty() {
        return Err(CliError::NoJournal(path.to_path_buf()));
    }
    Ok(numbers.into_iter().map(|n| verify_file(path, n)).collect())
}

fn verify_file(path: &Path, number: u32) -> VerifyResult {
    let mut result = VerifyResult {
        number,
        records: 0,
        size: 0,
        valid_end: 0,
        error: None,
    };
    if let Err(e) = scan(path, &mut result) {
        result.error = Some(e.to_string());
    }
    result
}

fn scan(path: &Path, result: &mut VerifyResult) -> Result<(), JournalError> {
    let reader = JournalReader::open(path, result.number)?;
    result.size = reader.size()?;
    let mut records = reader.records()?;
    for record in records.by_ref() {
        record?;
        result.records += 1;
    }
    result.valid_end = records.position();
    Ok(())
}

fn print_result(result: &VerifyResult) {
    let status = if result.is_ok() { "OK" } else { "FAILED" };
    println!(
        "  {:#012x}: {} ({} records, {} bytes)",
        result.number, status, result.records, result.size
    );
    if let Some(error) = &result.error {
        println!("    error: {error}");
    } else if result.valid_end < result.size {
        println!(
            "    {} bytes after the last complete record at offset {}",
            result.size - result.valid_end,
            result.valid_end
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use tidelog_core::{file_name_for, EntryType, LogRecord, TransactionId};

    fn write_file(dir: &Path, number: u32, records: usize, tail: &[u8]) {
        let mut file = std::fs::File::create(dir.join(file_name_for(number))).unwrap();
        for i in 0..records {
            let record = LogRecord::new(EntryType::new(1), TransactionId::new(i as u64), vec![1, 2]);
            file.write_all(&record.encode().unwrap()).unwrap();
        }
        file.write_all(tail).unwrap();
    }

    #[test]
    fn reports_torn_files() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), 0, 3, &[]);
        write_file(dir.path(), 1, 2, &[0x10, 0, 0]);

        let results = verify_dir(dir.path(), None).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert_eq!(results[0].records, 3);
        assert!(!results[1].is_ok());
        assert_eq!(results[1].records, 2);
        assert_eq!(results[1].size - results[1].valid_end, 3);
    }

    #[test]
    fn single_file() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), 0, 1, &[]);
        write_file(dir.path(), 1, 1, &[]);

        let results = verify_dir(dir.path(), Some(1)).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].number, 1);
        assert!(verify_dir(dir.path(), Some(5)).is_err());
    }
}
