//! # tidelog Core
//!
//! Single-writer, append-only write-ahead journal for a transactional
//! storage engine.
//!
//! This crate provides:
//! - Binary record framing with backlinks for reverse scans
//! - Log sequence numbers packing file number and offset
//! - A buffered journal manager with checkpoints and file rotation
//! - Background workers for fsync and retired file removal
//! - An exclusive, heartbeat-refreshed directory lock
//! - A reader for recovery: forward iteration, backward scans, torn tails
//!
//! The journal does not interpret payloads and does not replay them; the
//! engine drives both through [`JournalManager`] and [`JournalReader`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod lock;
mod lsn;
mod types;
pub mod wal;
pub mod worker;

pub use config::JournalConfig;
pub use error::{JournalError, JournalResult};
pub use lock::{DirLock, LockInfo, LOCK_FILE};
pub use lsn::{Lsn, MAX_OFFSET, OFFSET_BITS};
pub use types::{EntryType, TransactionId};
pub use wal::{
    file_name_for, find_highest_file_number, list_journal_files, CheckpointInfo,
    CheckpointRequest, FlushMode, JournalManager, JournalReader, LogRecord, WriteBuffer,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
