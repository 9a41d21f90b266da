//! Dump command implementation.

use super::select_file;
use crate::error::CliResult;
use crate::Format;
use serde::Serialize;
use std::path::Path;
use tidelog_core::{CheckpointInfo, JournalReader, LogRecord};

/// Journal record representation for output.
#[derive(Debug, Serialize)]
pub struct RecordInfo {
    /// LSN of the record.
    pub lsn: String,
    /// Byte offset of the record in its file.
    pub offset: u64,
    /// Record type.
    pub entry_type: String,
    /// Owning transaction, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txn_id: Option<u64>,
    /// Payload size in bytes.
    pub payload_size: usize,
    /// LSN preceding a checkpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_previous_lsn: Option<String>,
    /// Time a checkpoint was taken, unix milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_timestamp_ms: Option<u64>,
}

impl From<&LogRecord> for RecordInfo {
    fn from(record: &LogRecord) -> Self {
        let checkpoint = record
            .is_checkpoint()
            .then(|| CheckpointInfo::decode(&record.payload).ok())
            .flatten();
        Self {
            lsn: record.lsn.to_string(),
            offset: record.lsn.offset().saturating_sub(1),
            entry_type: record.entry_type.to_string(),
            txn_id: (!record.txn_id.is_none()).then_some(record.txn_id.as_u64()),
            payload_size: record.payload.len(),
            checkpoint_previous_lsn: checkpoint.map(|c| c.previous_lsn.to_string()),
            checkpoint_timestamp_ms: checkpoint.map(|c| c.timestamp_ms),
        }
    }
}

/// Runs the dump command.
pub fn run(
    path: &Path,
    file: Option<u32>,
    limit: Option<usize>,
    reverse: bool,
    format: Format,
) -> CliResult<()> {
    let number = select_file(path, file)?;
    let records = read_records(path, number, limit, reverse)?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        Format::Text => print_text_output(number, &records),
    }
    Ok(())
}

/// Reads up to `limit` records of file `number`, newest first if `reverse`.
pub fn read_records(
    path: &Path,
    number: u32,
    limit: Option<usize>,
    reverse: bool,
) -> CliResult<Vec<RecordInfo>> {
    let reader = JournalReader::open(path, number)?;
    let max_records = limit.unwrap_or(usize::MAX);
    let mut records = Vec::new();

    if reverse {
        for record in reader.records_backward()?.take(max_records) {
            records.push(RecordInfo::from(&record?));
        }
    } else {
        for record in reader.records()?.take(max_records) {
            records.push(RecordInfo::from(&record?));
        }
    }
    Ok(records)
}

fn print_text_output(number: u32, records: &[RecordInfo]) {
    println!("Journal file {number:#x}: {} record(s)", records.len());
    println!();
    for record in records {
        let txn = record
            .txn_id
            .map_or_else(|| "-".to_string(), |id| id.to_string());
        print!(
            "{:>16}  {:<12} txn={:<8} len={}",
            record.lsn, record.entry_type, txn, record.payload_size
        );
        if let Some(previous) = &record.checkpoint_previous_lsn {
            print!("  previous={previous}");
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tidelog_core::{EntryType, FlushMode, JournalConfig, JournalManager, TransactionId};

    #[test]
    fn dumps_records_both_ways() {
        let dir = tempdir().unwrap();
        let journal = JournalManager::open(JournalConfig::new(dir.path())).unwrap();
        let mut first = LogRecord::new(EntryType::new(0x21), TransactionId::new(8), b"abc".to_vec());
        let first_lsn = journal.append(&mut first).unwrap();
        journal.checkpoint(TransactionId::NONE, false).unwrap();
        journal.flush(FlushMode::FlushOnly).unwrap();
        let number = journal.current_file_number();

        let forward = read_records(dir.path(), number, None, false).unwrap();
        assert_eq!(forward.len(), 2);
        assert_eq!(forward[0].offset, 0);
        assert_eq!(forward[0].txn_id, Some(8));
        assert_eq!(forward[0].entry_type, "type:0x21");
        assert_eq!(forward[1].entry_type, "CHECKPOINT");
        assert_eq!(forward[1].txn_id, None);
        assert_eq!(
            forward[1].checkpoint_previous_lsn.as_deref(),
            Some(first_lsn.to_string().as_str())
        );

        let newest = read_records(dir.path(), number, Some(1), true).unwrap();
        assert_eq!(newest.len(), 1);
        assert_eq!(newest[0].entry_type, "CHECKPOINT");
    }
}
