//! Fixed-capacity staging buffer for encoded records.

use crate::error::JournalResult;
use crate::wal::record::LogRecord;
use bytes::{Bytes, BytesMut};

/// In-memory staging area that accumulates encoded records between flushes.
///
/// The buffer never grows past its capacity and never holds part of a
/// record: a record is either staged whole or rejected.
#[derive(Debug)]
pub struct WriteBuffer {
    buf: BytesMut,
    capacity: usize,
}

impl WriteBuffer {
    /// Creates an empty buffer holding at most `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Copies already-encoded frame bytes in if they fit the remaining
    /// capacity. Records go through [`WriteBuffer::stage`], which encodes
    /// in place; this is the entry point for raw bytes.
    ///
    /// Returns false and leaves the buffer untouched otherwise.
    pub fn try_append(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() > self.remaining() {
            return false;
        }
        self.buf.extend_from_slice(bytes);
        true
    }

    /// Encodes `record` directly into the buffer.
    ///
    /// # Errors
    ///
    /// Returns [`crate::JournalError::EncodingOverflow`] if the record does
    /// not fit the remaining capacity, or
    /// [`crate::JournalError::PayloadTooLarge`] for an oversized payload.
    pub fn stage(&mut self, record: &LogRecord) -> JournalResult<()> {
        record.encode_into(&mut self.buf, self.capacity)
    }

    /// Takes everything staged since the last clear and resets the cursor.
    pub fn snapshot_and_clear(&mut self) -> Bytes {
        let bytes = self.buf.split().freeze();
        self.buf.reserve(self.capacity);
        bytes
    }

    /// Puts back a snapshot whose write failed, ahead of anything staged
    /// since.
    pub fn restore(&mut self, snapshot: Bytes) {
        if snapshot.is_empty() {
            return;
        }
        let staged = self.buf.split();
        self.buf.extend_from_slice(&snapshot);
        self.buf.extend_from_slice(&staged);
    }

    /// Write cursor: bytes currently staged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Configured capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes still free.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.buf.len())
    }
}
