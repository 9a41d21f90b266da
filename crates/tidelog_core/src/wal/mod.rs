//! Write-ahead journal.
//!
//! The journal is a directory of numbered files written strictly in order.
//! Records are framed by [`record`], staged in a [`WriteBuffer`] and written
//! by the [`JournalManager`]. Recovery reads files back with a
//! [`JournalReader`].
//!
//! ## Directory layout
//!
//! ```text
//! <dir>/
//! ├─ 0000000000.log       # journal files, ten hex digits
//! ├─ 0000000001.log
//! ├─ 0000000002.log.bak   # a file moved aside by rotation
//! └─ journal.lck          # exclusive access lock
//! ```
//!
//! ## Record format
//!
//! ```text
//! | type (1) | txn id (8) | length (2) | payload (N) | backlink (2) |
//! ```
//!
//! ## Invariants
//!
//! - LSNs strictly increase in append order
//! - A record is never split across flushes
//! - No record reaches the file before every record with a smaller LSN
//! - Flush failures leave counters unchanged and records buffered
//! - File numbers are never reused

mod buffer;
mod manager;
pub mod naming;
mod reader;
mod record;

pub use buffer::WriteBuffer;
pub use manager::{CheckpointRequest, FlushMode, JournalManager};
pub use naming::{
    backup_name_for, file_name_for, find_highest_file_number, list_backup_files,
    list_journal_files, parse_file_number,
};
pub use reader::{BackwardIter, JournalReader, RecordIter};
pub use record::{
    CheckpointInfo, FrameHeader, LogRecord, BACKLINK_SIZE, FRAME_OVERHEAD, HEADER_SIZE,
    MAX_PAYLOAD_SIZE,
};
