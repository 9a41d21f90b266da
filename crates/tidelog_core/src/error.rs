//! Error types for the tidelog journal.

use std::io;
use thiserror::Error;
use tidelog_storage::StorageError;

/// Result type for journal operations.
pub type JournalResult<T> = Result<T, JournalError>;

/// Errors that can occur in journal operations.
///
/// Appending while the journal is in recovery mode is not represented here:
/// it is an invariant violation and panics.
#[derive(Debug, Error)]
pub enum JournalError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An encoded record does not fit the space left in the write buffer.
    #[error("record of {needed} bytes does not fit in {available} bytes of buffer space")]
    EncodingOverflow {
        /// Encoded size of the record.
        needed: usize,
        /// Space that was available.
        available: usize,
    },

    /// A record payload exceeds what the 16-bit length fields can describe.
    #[error("payload of {len} bytes exceeds the maximum of {max} bytes")]
    PayloadTooLarge {
        /// Payload length.
        len: usize,
        /// Maximum payload length.
        max: usize,
    },

    /// The journal has been shut down.
    #[error("journal is closed")]
    JournalClosed,

    /// Writing buffered records to the current file failed.
    #[error("journal flush failed: {source}")]
    FlushFailed {
        /// Underlying storage failure.
        source: StorageError,
    },

    /// A new journal file could not be created.
    #[error("failed to rotate to journal file {file_number:#x}: {source}")]
    RotationFailed {
        /// Number of the file that could not be created.
        file_number: u32,
        /// Underlying storage failure.
        source: StorageError,
    },

    /// Another process holds the journal directory lock.
    #[error(
        "journal directory is locked by another process (pid {pid:?}, last heartbeat {last_heartbeat_ms:?} ms)"
    )]
    LockHeld {
        /// Process id recorded in the lock file, if readable.
        pid: Option<u32>,
        /// Last heartbeat (unix millis) recorded in the lock file, if readable.
        last_heartbeat_ms: Option<u64>,
    },

    /// A position cannot be represented as an LSN.
    #[error("position {offset} in file {file_number:#x} does not fit in an LSN")]
    LsnOverflow {
        /// File number of the position.
        file_number: u32,
        /// Offset of the position.
        offset: u64,
    },

    /// Journal bytes do not form a valid record.
    #[error("journal corruption: {message}")]
    Corruption {
        /// Description of the corruption.
        message: String,
    },

    /// The configuration cannot be used.
    #[error("invalid journal configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },
}

impl JournalError {
    /// Creates a corruption error.
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates a flush failure error.
    pub fn flush_failed(source: impl Into<StorageError>) -> Self {
        Self::FlushFailed {
            source: source.into(),
        }
    }

    /// Creates a rotation failure error.
    pub fn rotation_failed(file_number: u32, source: impl Into<StorageError>) -> Self {
        Self::RotationFailed {
            file_number,
            source: source.into(),
        }
    }
}
