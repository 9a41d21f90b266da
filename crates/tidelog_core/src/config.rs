//! Journal configuration.

use crate::error::{JournalError, JournalResult};
use crate::lsn::MAX_OFFSET;
use crate::wal::FRAME_OVERHEAD;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for opening a journal.
#[derive(Debug, Clone)]
pub struct JournalConfig {
    /// Directory holding the journal files and lock file.
    pub dir: PathBuf,

    /// Capacity of the in-memory write buffer in bytes.
    pub buffer_capacity: usize,

    /// File size past which the journal asks the engine for a checkpoint.
    pub size_limit: u64,

    /// A rotating checkpoint only retires the current file once it is
    /// larger than this.
    pub min_rotation_size: u64,

    /// Whether `FlushMode::FlushAndSyncIfPolicy` syncs.
    pub sync_on_commit: bool,

    /// How often the lock heartbeat is refreshed.
    pub lock_heartbeat_interval: Duration,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("journal"),
            buffer_capacity: 1024 * 1024,     // 1 MiB
            size_limit: 64 * 1024 * 1024,     // 64 MiB
            min_rotation_size: 1024 * 1024,   // 1 MiB
            sync_on_commit: true,
            lock_heartbeat_interval: Duration::from_secs(10),
        }
    }
}

impl JournalConfig {
    /// Creates a configuration for the given directory with default values.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    /// Sets the write buffer capacity.
    #[must_use]
    pub const fn buffer_capacity(mut self, bytes: usize) -> Self {
        self.buffer_capacity = bytes;
        self
    }

    /// Sets the size limit that triggers checkpoint requests.
    #[must_use]
    pub const fn size_limit(mut self, bytes: u64) -> Self {
        self.size_limit = bytes;
        self
    }

    /// Sets the minimum file size for rotation at checkpoint.
    #[must_use]
    pub const fn min_rotation_size(mut self, bytes: u64) -> Self {
        self.min_rotation_size = bytes;
        self
    }

    /// Sets whether commit-style flushes sync.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the lock heartbeat interval.
    #[must_use]
    pub const fn lock_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.lock_heartbeat_interval = interval;
        self
    }

    /// Liveness window: a heartbeat older than this marks a dead holder.
    #[must_use]
    pub fn lock_liveness_window(&self) -> Duration {
        crate::lock::liveness_window(self.lock_heartbeat_interval)
    }

    /// Checks the configuration for values the journal cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidConfig`] if the buffer cannot hold an
    /// empty record, if the buffer is larger than an LSN offset can address,
    /// or if the heartbeat interval is zero.
    pub fn validate(&self) -> JournalResult<()> {
        if self.buffer_capacity < FRAME_OVERHEAD {
            return Err(JournalError::invalid_config(format!(
                "buffer capacity {} is smaller than the {FRAME_OVERHEAD}-byte record frame",
                self.buffer_capacity
            )));
        }
        if self.buffer_capacity as u64 > MAX_OFFSET {
            return Err(JournalError::invalid_config(format!(
                "buffer capacity {} exceeds the addressable offset range",
                self.buffer_capacity
            )));
        }
        if self.lock_heartbeat_interval.is_zero() {
            return Err(JournalError::invalid_config(
                "lock heartbeat interval must be non-zero",
            ));
        }
        Ok(())
    }
}
