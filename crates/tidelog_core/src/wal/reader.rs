//! Read side of the journal, used by recovery and maintenance tools.
//!
//! ## Torn tails
//!
//! A crash in the middle of a flush can leave a partial record at the end
//! of the newest file. The reader treats a truncated header, a truncated
//! frame or a backlink that does not match its header as the end of the
//! log: every complete record before it is returned and nothing fails.
//! Storage errors are still reported.

use crate::error::{JournalError, JournalResult};
use crate::lsn::Lsn;
use crate::wal::naming::file_name_for;
use crate::wal::record::{FrameHeader, LogRecord, BACKLINK_SIZE, HEADER_SIZE};
use std::path::Path;
use std::sync::Arc;
use tidelog_storage::{FileBackend, StorageBackend};
use tracing::warn;

/// Reads the records of one journal file.
#[derive(Debug, Clone)]
pub struct JournalReader {
    backend: Arc<dyn StorageBackend>,
    file_number: u32,
}

impl JournalReader {
    /// Creates a reader over an already opened backend.
    pub fn new(backend: Arc<dyn StorageBackend>, file_number: u32) -> Self {
        Self {
            backend,
            file_number,
        }
    }

    /// Opens journal file `file_number` in `dir` for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be opened.
    pub fn open(dir: &Path, file_number: u32) -> JournalResult<Self> {
        let backend = FileBackend::open_read_only(&dir.join(file_name_for(file_number)))?;
        Ok(Self::new(Arc::new(backend), file_number))
    }

    /// Opens journal file `file_number` in `dir` for reading and repair.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened for writing.
    pub fn open_for_repair(dir: &Path, file_number: u32) -> JournalResult<Self> {
        let path = dir.join(file_name_for(file_number));
        if !path.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("journal file {} not found", path.display()),
            )
            .into());
        }
        let backend = FileBackend::open(&path)?;
        Ok(Self::new(Arc::new(backend), file_number))
    }

    /// Number of the file being read.
    #[must_use]
    pub fn file_number(&self) -> u32 {
        self.file_number
    }

    /// Current size of the file in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    pub fn size(&self) -> JournalResult<u64> {
        Ok(self.backend.size()?)
    }

    /// Iterates over the records from the start of the file.
    ///
    /// Each record carries the LSN it was assigned when appended.
    ///
    /// # Errors
    ///
    /// Returns an error if the file size cannot be determined.
    pub fn records(&self) -> JournalResult<RecordIter<'_>> {
        Ok(RecordIter {
            reader: self,
            offset: 0,
            end: self.size()?,
            done: false,
        })
    }

    /// Byte offset just past the last complete record.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn valid_end(&self) -> JournalResult<u64> {
        let mut iter = self.records()?;
        for record in iter.by_ref() {
            record?;
        }
        Ok(iter.offset)
    }

    /// Iterates over the records from the last complete one back to the
    /// first, following backlinks.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn records_backward(&self) -> JournalResult<BackwardIter<'_>> {
        Ok(BackwardIter {
            reader: self,
            end: self.valid_end()?,
        })
    }

    /// The last complete record, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn last_record(&self) -> JournalResult<Option<LogRecord>> {
        self.records_backward()?.next().transpose()
    }

    /// Cuts any torn tail off the file and returns how many bytes were
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or truncated.
    pub fn truncate_torn_tail(&self) -> JournalResult<u64> {
        let end = self.valid_end()?;
        let size = self.size()?;
        if end >= size {
            return Ok(0);
        }
        self.backend.truncate(end)?;
        self.backend.sync()?;
        let removed = size - end;
        warn!(
            file = self.file_number,
            valid_end = end,
            removed,
            "truncated torn journal tail"
        );
        Ok(removed)
    }

    fn lsn_at(&self, offset: u64) -> JournalResult<Lsn> {
        Lsn::pack(self.file_number, offset + 1)
    }

    /// Reads the record starting at `offset`, or `None` for a torn tail.
    fn read_frame(&self, offset: u64, end: u64) -> JournalResult<Option<LogRecord>> {
        let available = end - offset;
        if available < HEADER_SIZE as u64 {
            return Ok(None);
        }
        let header = FrameHeader::parse(&self.backend.read_at(offset, HEADER_SIZE)?)?;
        let frame_len = header.frame_len();
        if available < frame_len as u64 {
            return Ok(None);
        }
        let frame = self.backend.read_at(offset, frame_len)?;
        match LogRecord::decode(&frame) {
            Ok((mut record, _)) => {
                record.lsn = self.lsn_at(offset)?;
                Ok(Some(record))
            }
            Err(JournalError::Corruption { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Forward iterator returned by [`JournalReader::records`].
#[derive(Debug)]
pub struct RecordIter<'a> {
    reader: &'a JournalReader,
    offset: u64,
    end: u64,
    done: bool,
}

impl RecordIter<'_> {
    /// Offset of the next record to be read.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.offset
    }
}

impl Iterator for RecordIter<'_> {
    type Item = JournalResult<LogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.end {
            return None;
        }
        match self.reader.read_frame(self.offset, self.end) {
            Ok(Some(record)) => {
                self.offset += record.encoded_len() as u64;
                Some(Ok(record))
            }
            Ok(None) => {
                self.done = true;
                warn!(
                    file = self.reader.file_number,
                    offset = self.offset,
                    size = self.end,
                    "torn record at end of journal file"
                );
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Backward iterator returned by [`JournalReader::records_backward`].
#[derive(Debug)]
pub struct BackwardIter<'a> {
    reader: &'a JournalReader,
    end: u64,
}

impl BackwardIter<'_> {
    fn step(&mut self) -> JournalResult<LogRecord> {
        let trailer = self
            .reader
            .backend
            .read_at(self.end - BACKLINK_SIZE as u64, BACKLINK_SIZE)?;
        let backlink = u64::from(u16::from_be_bytes([trailer[0], trailer[1]]));
        let start = (self.end - BACKLINK_SIZE as u64)
            .checked_sub(backlink)
            .ok_or_else(|| {
                JournalError::corruption(format!(
                    "backlink {backlink} at offset {} points before the file start",
                    self.end
                ))
            })?;
        let record = self
            .reader
            .read_frame(start, self.end)?
            .filter(|r| start + r.encoded_len() as u64 == self.end)
            .ok_or_else(|| {
                JournalError::corruption(format!(
                    "no record ends at offset {} in file {:#x}",
                    self.end, self.reader.file_number
                ))
            })?;
        self.end = start;
        Ok(record)
    }
}

impl Iterator for BackwardIter<'_> {
    type Item = JournalResult<LogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.end < (HEADER_SIZE + BACKLINK_SIZE) as u64 {
            return None;
        }
        let result = self.step();
        if result.is_err() {
            self.end = 0;
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntryType, TransactionId};
    use tidelog_storage::InMemoryBackend;

    fn record(tag: u8, txn: u64, payload: &[u8]) -> LogRecord {
        LogRecord::new(EntryType::new(tag), TransactionId::new(txn), payload.to_vec())
    }

    fn file_with(records: &[LogRecord]) -> Vec<u8> {
        let mut data = Vec::new();
        for r in records {
            data.extend_from_slice(&r.encode().unwrap());
        }
        data
    }

    fn reader(data: Vec<u8>) -> JournalReader {
        JournalReader::new(Arc::new(InMemoryBackend::with_data(data)), 7)
    }

    #[test]
    fn forward_assigns_positions() {
        let records = [record(1, 1, b"a"), record(2, 1, b"bcd"), record(3, 2, b"")];
        let reader = reader(file_with(&records));

        let read: Vec<_> = reader.records().unwrap().map(Result::unwrap).collect();
        assert_eq!(read.len(), 3);
        assert_eq!(read[0].lsn, Lsn::pack(7, 1).unwrap());
        assert_eq!(read[1].lsn, Lsn::pack(7, 15).unwrap());
        assert_eq!(read[2].lsn, Lsn::pack(7, 31).unwrap());
        assert_eq!(read[1].payload.as_ref(), b"bcd");
    }

    #[test]
    fn empty_file() {
        let reader = reader(Vec::new());
        assert_eq!(reader.records().unwrap().count(), 0);
        assert_eq!(reader.valid_end().unwrap(), 0);
        assert!(reader.last_record().unwrap().is_none());
    }

    #[test]
    fn torn_tail_is_end_of_log() {
        let records = [record(1, 1, b"first"), record(1, 2, b"second")];
        let mut data = file_with(&records);
        let complete = data.len() as u64;
        let third = record(1, 3, b"third").encode().unwrap();
        data.extend_from_slice(&third[..third.len() - 3]);

        let reader = reader(data);
        let read: Vec<_> = reader.records().unwrap().map(Result::unwrap).collect();
        assert_eq!(read.len(), 2);
        assert_eq!(reader.valid_end().unwrap(), complete);

        let backward: Vec<_> = reader
            .records_backward()
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(backward.len(), 2);
        assert_eq!(backward[0].txn_id, TransactionId::new(2));
        assert_eq!(backward[1].txn_id, TransactionId::new(1));
    }

    #[test]
    fn backward_matches_forward() {
        let records: Vec<_> = (0..20u8).map(|i| record(i, u64::from(i), &vec![i; usize::from(i)])).collect();
        let reader = reader(file_with(&records));

        let forward: Vec<_> = reader.records().unwrap().map(Result::unwrap).collect();
        let mut backward: Vec<_> = reader
            .records_backward()
            .unwrap()
            .map(Result::unwrap)
            .collect();
        backward.reverse();
        assert_eq!(forward, backward);
    }

    #[test]
    fn truncate_removes_partial_record() {
        let mut data = file_with(&[record(1, 1, b"keep")]);
        let complete = data.len() as u64;
        data.extend_from_slice(&[0x01, 0x00, 0x00]);

        let backend = Arc::new(InMemoryBackend::with_data(data));
        let reader = JournalReader::new(backend.clone(), 0);
        assert_eq!(reader.truncate_torn_tail().unwrap(), 3);
        assert_eq!(backend.size().unwrap(), complete);
        assert_eq!(reader.truncate_torn_tail().unwrap(), 0);
        assert_eq!(
            reader.last_record().unwrap().unwrap().payload.as_ref(),
            b"keep"
        );
    }
}
