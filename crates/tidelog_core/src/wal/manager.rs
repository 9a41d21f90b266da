//! The journal manager: append, flush, checkpoint, rotation and shutdown.
//!
//! Every public operation runs under one mutex, so records reach the file
//! in LSN order and a flush never overlaps another. The sync and remover
//! workers only ever receive a file handle or path; they never take the
//! manager's lock.

use crate::config::JournalConfig;
use crate::error::{JournalError, JournalResult};
use crate::lock::{now_millis, DirLock};
use crate::lsn::Lsn;
use crate::types::TransactionId;
use crate::wal::buffer::WriteBuffer;
use crate::wal::naming::{
    backup_name_for, file_name_for, list_backup_files, list_journal_files, sync_directory,
};
use crate::wal::record::{CheckpointInfo, LogRecord};
use crate::worker::{RemoveTask, RemoverWorker, SyncTask, SyncWorker};
use parking_lot::Mutex;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use tidelog_storage::{BackendOpener, FileOpener, StorageBackend};
use tracing::{debug, error, info, warn};

/// How far a flush goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushMode {
    /// Do nothing.
    None,
    /// Write buffered records to the current file.
    FlushOnly,
    /// Write, then sync if `sync_on_commit` is set.
    FlushAndSyncIfPolicy,
    /// Write, then sync regardless of policy.
    FlushAndForceSync,
}

/// Emitted once when the current file grows past the configured size limit.
///
/// The journal never checkpoints on its own; the engine is expected to
/// react by calling [`JournalManager::checkpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointRequest {
    /// File that crossed the limit.
    pub file_number: u32,
    /// Bytes written to that file.
    pub file_size: u64,
    /// The configured limit.
    pub size_limit: u64,
}

struct JournalInner {
    /// `None` once the journal is shut down.
    buffer: Option<WriteBuffer>,
    file: Option<Arc<dyn StorageBackend>>,
    file_number: u32,
    /// Bytes written to the current file, excluding anything still buffered.
    position: u64,
    last_assigned: Lsn,
    last_flushed: Lsn,
    last_synced: Lsn,
    last_checkpoint: Lsn,
    /// Checkpoint record buffered but not yet written.
    pending_checkpoint: Lsn,
    recovery_mode: bool,
    checkpoint_requested: bool,
    sync_worker: Option<SyncWorker>,
    lock: Option<DirLock>,
}

impl JournalInner {
    fn ensure_open(&self) -> JournalResult<()> {
        if self.buffer.is_none() {
            return Err(JournalError::JournalClosed);
        }
        Ok(())
    }

    /// Encodes `record` into the buffer and assigns its LSN.
    fn stage(&mut self, record: &mut LogRecord) -> JournalResult<Lsn> {
        let buffer = self.buffer.as_mut().ok_or(JournalError::JournalClosed)?;
        let lsn = Lsn::pack(self.file_number, self.position + buffer.len() as u64 + 1)?;
        buffer.stage(record)?;
        record.lsn = lsn;
        self.last_assigned = lsn;
        Ok(lsn)
    }

    fn buffered(&self) -> usize {
        self.buffer.as_ref().map_or(0, WriteBuffer::len)
    }
}

/// Single-writer write-ahead journal over a directory of numbered files.
///
/// # Example
///
/// ```rust,ignore
/// use tidelog_core::{EntryType, FlushMode, JournalConfig, JournalManager, LogRecord, TransactionId};
///
/// let journal = JournalManager::open(JournalConfig::new("journal"))?;
/// let mut record = LogRecord::new(EntryType::new(0x10), TransactionId::new(1), b"insert".to_vec());
/// let lsn = journal.append(&mut record)?;
/// journal.flush(FlushMode::FlushAndSyncIfPolicy)?;
/// assert_eq!(journal.last_written_lsn(), lsn);
/// journal.shutdown(TransactionId::NONE, true)?;
/// ```
pub struct JournalManager {
    config: JournalConfig,
    opener: Arc<dyn BackendOpener>,
    inner: Mutex<JournalInner>,
    remover: RemoverWorker,
    checkpoint_subscribers: Mutex<Vec<Sender<CheckpointRequest>>>,
    recovery_start_file: Option<u32>,
}

impl fmt::Debug for JournalManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("JournalManager")
            .field("dir", &self.config.dir)
            .field("file_number", &inner.file_number)
            .field("position", &inner.position)
            .field("last_assigned", &inner.last_assigned)
            .field("closed", &inner.buffer.is_none())
            .finish()
    }
}

impl JournalManager {
    /// Opens a journal in `config.dir` on the local file system.
    ///
    /// # Errors
    ///
    /// See [`JournalManager::with_opener`].
    pub fn open(config: JournalConfig) -> JournalResult<Self> {
        Self::with_opener(config, Arc::new(FileOpener))
    }

    /// Opens a journal whose files are opened through `opener`.
    ///
    /// Takes the directory lock, finds the highest existing journal file and
    /// starts writing to the file after it. Existing files are left for
    /// recovery to read.
    ///
    /// # Errors
    ///
    /// - [`JournalError::InvalidConfig`] for an unusable configuration
    /// - [`JournalError::LockHeld`] if another process owns the directory
    /// - [`JournalError::RotationFailed`] if the first file cannot be created
    pub fn with_opener(config: JournalConfig, opener: Arc<dyn BackendOpener>) -> JournalResult<Self> {
        config.validate()?;
        fs::create_dir_all(&config.dir)?;
        let lock = DirLock::acquire(&config.dir, config.lock_heartbeat_interval)?;

        let existing = list_journal_files(&config.dir)?;
        let recovery_start_file = existing.last().copied();
        let first = match recovery_start_file {
            Some(n) => n.checked_add(1).ok_or_else(|| exhausted(n))?,
            None => 0,
        };

        let manager = Self {
            inner: Mutex::new(JournalInner {
                buffer: Some(WriteBuffer::new(config.buffer_capacity)),
                file: None,
                file_number: first,
                position: 0,
                last_assigned: Lsn::INVALID,
                last_flushed: Lsn::INVALID,
                last_synced: Lsn::INVALID,
                last_checkpoint: Lsn::INVALID,
                pending_checkpoint: Lsn::INVALID,
                recovery_mode: false,
                checkpoint_requested: false,
                sync_worker: Some(SyncWorker::spawn()?),
                lock: Some(lock),
            }),
            remover: RemoverWorker::spawn()?,
            checkpoint_subscribers: Mutex::new(Vec::new()),
            recovery_start_file,
            config,
            opener,
        };

        manager.install_file(&mut manager.inner.lock(), first)?;
        info!(
            dir = %manager.config.dir.display(),
            file = first,
            existing = existing.len(),
            "opened journal"
        );
        Ok(manager)
    }

    /// Appends a record to the buffer and returns its LSN.
    ///
    /// The LSN is also stored in `record.lsn`. If the record does not fit
    /// the space left in the buffer, the buffer is flushed (without sync)
    /// and the append retried once.
    ///
    /// # Errors
    ///
    /// - [`JournalError::JournalClosed`] after shutdown
    /// - [`JournalError::EncodingOverflow`] if the record cannot fit even an
    ///   empty buffer
    /// - [`JournalError::FlushFailed`] if the flush that makes room fails
    ///
    /// # Panics
    ///
    /// Panics if the journal is in recovery mode.
    pub fn append(&self, record: &mut LogRecord) -> JournalResult<Lsn> {
        let mut inner = self.inner.lock();
        self.append_locked(&mut inner, record)
    }

    fn append_locked(&self, inner: &mut JournalInner, record: &mut LogRecord) -> JournalResult<Lsn> {
        inner.ensure_open()?;
        assert!(
            !inner.recovery_mode,
            "journal append attempted while in recovery mode"
        );

        match inner.stage(record) {
            Err(JournalError::EncodingOverflow { .. }) if inner.buffered() > 0 => {
                self.flush_locked(inner, FlushMode::FlushOnly)?;
                inner.stage(record)
            }
            result => result,
        }
    }

    /// Writes buffered records to the current file, syncing as `mode` asks.
    ///
    /// Does nothing in recovery mode. A sync is handed to the background
    /// sync worker; [`JournalManager::last_synced_lsn`] records what was
    /// requested and [`JournalManager::durable_lsn`] what has completed.
    ///
    /// # Errors
    ///
    /// - [`JournalError::JournalClosed`] after shutdown
    /// - [`JournalError::FlushFailed`] if the write fails; the records stay
    ///   buffered and a later flush rewrites the same region
    pub fn flush(&self, mode: FlushMode) -> JournalResult<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        self.flush_locked(&mut inner, mode)
    }

    fn flush_locked(&self, inner: &mut JournalInner, mode: FlushMode) -> JournalResult<()> {
        if mode == FlushMode::None || inner.recovery_mode {
            return Ok(());
        }
        let file = inner.file.clone().ok_or(JournalError::JournalClosed)?;
        let buffer = inner.buffer.as_mut().ok_or(JournalError::JournalClosed)?;

        if !buffer.is_empty() {
            let snapshot = buffer.snapshot_and_clear();
            if let Err(e) = file.write_all_at(inner.position, &snapshot) {
                error!(
                    file = inner.file_number,
                    position = inner.position,
                    len = snapshot.len(),
                    error = %e,
                    "journal flush failed"
                );
                buffer.restore(snapshot);
                return Err(JournalError::flush_failed(e));
            }
            inner.position += snapshot.len() as u64;
            debug!(
                file = inner.file_number,
                bytes = snapshot.len(),
                position = inner.position,
                "flushed journal buffer"
            );
        }
        inner.last_flushed = inner.last_assigned;
        if inner.pending_checkpoint.is_valid() && inner.pending_checkpoint <= inner.last_flushed {
            inner.last_checkpoint = inner.pending_checkpoint;
            inner.pending_checkpoint = Lsn::INVALID;
            inner.checkpoint_requested = false;
        }

        let wants_sync = match mode {
            FlushMode::FlushAndForceSync => true,
            FlushMode::FlushAndSyncIfPolicy => self.config.sync_on_commit,
            FlushMode::None | FlushMode::FlushOnly => false,
        };
        if wants_sync && inner.last_synced < inner.last_flushed {
            let task = SyncTask {
                file,
                file_number: inner.file_number,
                lsn: inner.last_flushed,
            };
            let queued = inner
                .sync_worker
                .as_ref()
                .is_some_and(|worker| worker.request(task));
            if queued {
                inner.last_synced = inner.last_flushed;
            } else {
                warn!(file = inner.file_number, "sync worker unavailable, sync skipped");
            }
        }

        self.check_size_limit(inner);
        Ok(())
    }

    fn check_size_limit(&self, inner: &mut JournalInner) {
        if inner.checkpoint_requested || inner.position <= self.config.size_limit {
            return;
        }
        inner.checkpoint_requested = true;
        let request = CheckpointRequest {
            file_number: inner.file_number,
            file_size: inner.position,
            size_limit: self.config.size_limit,
        };
        info!(
            file = request.file_number,
            size = request.file_size,
            limit = request.size_limit,
            "journal file over size limit, requesting checkpoint"
        );
        self.checkpoint_subscribers
            .lock()
            .retain(|tx| tx.send(request).is_ok());
    }

    /// Writes a checkpoint record for `txn_id` and returns its LSN.
    ///
    /// Without `switch_files` the checkpoint is flushed and synced. With
    /// `switch_files` it is flushed, and if the current file is larger than
    /// `min_rotation_size` the journal moves to a new file and the old one
    /// is deleted in the background. A failed rotation is logged and the
    /// journal stays on the current file. Stale rotation backups are swept
    /// either way.
    ///
    /// # Errors
    ///
    /// - [`JournalError::JournalClosed`] after shutdown
    /// - [`JournalError::FlushFailed`] if the checkpoint cannot be written
    ///
    /// # Panics
    ///
    /// Panics if the journal is in recovery mode.
    pub fn checkpoint(&self, txn_id: TransactionId, switch_files: bool) -> JournalResult<Lsn> {
        let mut inner = self.inner.lock();
        let lsn = self.append_checkpoint(&mut inner, txn_id)?;

        if switch_files {
            self.flush_locked(&mut inner, FlushMode::FlushOnly)?;
            if inner.position > self.config.min_rotation_size {
                self.rotate(&mut inner);
            } else {
                debug!(
                    file = inner.file_number,
                    size = inner.position,
                    min = self.config.min_rotation_size,
                    "journal file below rotation threshold"
                );
            }
        } else {
            self.flush_locked(&mut inner, FlushMode::FlushAndForceSync)?;
        }

        self.sweep_backups();
        Ok(lsn)
    }

    fn append_checkpoint(&self, inner: &mut JournalInner, txn_id: TransactionId) -> JournalResult<Lsn> {
        let info = CheckpointInfo {
            previous_lsn: inner.last_assigned,
            timestamp_ms: now_millis(),
        };
        let lsn = self.append_locked(inner, &mut LogRecord::checkpoint(txn_id, info))?;
        // Counts as the checkpoint watermark once a flush writes it.
        inner.pending_checkpoint = lsn;
        debug!(%lsn, %txn_id, "appended checkpoint");
        Ok(lsn)
    }

    fn rotate(&self, inner: &mut JournalInner) {
        let old_number = inner.file_number;
        let old_file = inner.file.clone();
        let result = old_number
            .checked_add(1)
            .ok_or_else(|| exhausted(old_number))
            .and_then(|next| self.install_file(inner, next));

        match result {
            Ok(()) => {
                info!(from = old_number, to = inner.file_number, "rotated journal file");
                if let Some(file) = old_file {
                    self.remover.submit(RemoveTask::Retire {
                        file,
                        path: self.config.dir.join(file_name_for(old_number)),
                    });
                }
            }
            Err(e) => {
                warn!(file = old_number, error = %e, "journal rotation failed, staying on current file");
            }
        }
    }

    /// Makes file `number` the current file, moving aside any file already
    /// using its name.
    fn install_file(&self, inner: &mut JournalInner, number: u32) -> JournalResult<()> {
        let dir = &self.config.dir;
        let path = dir.join(file_name_for(number));
        if path.exists() {
            let backup = dir.join(backup_name_for(number));
            fs::rename(&path, &backup).map_err(|e| JournalError::rotation_failed(number, e))?;
            warn!(
                path = %path.display(),
                backup = %backup.display(),
                "journal file already existed, moved to backup"
            );
        }
        let file = self
            .opener
            .open(&path)
            .map_err(|e| JournalError::rotation_failed(number, e))?;
        sync_directory(dir).map_err(|e| JournalError::rotation_failed(number, e))?;

        inner.file = Some(file);
        inner.file_number = number;
        inner.position = 0;
        Ok(())
    }

    fn sweep_backups(&self) {
        match list_backup_files(&self.config.dir) {
            Ok(paths) => {
                for path in paths {
                    self.remover.submit(RemoveTask::Path(path));
                }
            }
            Err(e) => warn!(error = %e, "failed to list journal backups"),
        }
    }

    /// Enables or disables recovery mode. While enabled, appends panic and
    /// flushes do nothing.
    pub fn set_recovery_mode(&self, enabled: bool) {
        self.inner.lock().recovery_mode = enabled;
        debug!(enabled, "journal recovery mode");
    }

    /// Returns true while in recovery mode.
    #[must_use]
    pub fn is_recovery_mode(&self) -> bool {
        self.inner.lock().recovery_mode
    }

    /// Shuts the journal down. Later appends fail with
    /// [`JournalError::JournalClosed`]; calling this again does nothing.
    ///
    /// Optionally appends a final checkpoint for `txn_id`, then flushes with
    /// a forced sync, waits for the sync worker to finish and releases the
    /// directory lock. Resources are released even if the final flush fails.
    ///
    /// # Errors
    ///
    /// Returns the error of the final checkpoint or flush.
    pub fn shutdown(&self, txn_id: TransactionId, write_final_checkpoint: bool) -> JournalResult<()> {
        let mut inner = self.inner.lock();
        if inner.buffer.is_none() {
            return Ok(());
        }

        let mut result = Ok(());
        if write_final_checkpoint && !inner.recovery_mode {
            result = self.append_checkpoint(&mut inner, txn_id).map(|_| ());
        }
        if result.is_ok() {
            result = self.flush_locked(&mut inner, FlushMode::FlushAndForceSync);
        }

        close(&mut inner);
        info!(
            dir = %self.config.dir.display(),
            last_written = %inner.last_flushed,
            "journal shut down"
        );
        result
    }

    /// Subscribes to checkpoint requests raised when the current file grows
    /// past the size limit.
    pub fn subscribe_checkpoint_requests(&self) -> Receiver<CheckpointRequest> {
        let (tx, rx) = mpsc::channel();
        self.checkpoint_subscribers.lock().push(tx);
        rx
    }

    /// LSN of the last record written to the file.
    #[must_use]
    pub fn last_written_lsn(&self) -> Lsn {
        self.inner.lock().last_flushed
    }

    /// LSN of the last appended record.
    #[must_use]
    pub fn last_assigned_lsn(&self) -> Lsn {
        self.inner.lock().last_assigned
    }

    /// LSN covered by the last sync handed to the sync worker.
    #[must_use]
    pub fn last_synced_lsn(&self) -> Lsn {
        self.inner.lock().last_synced
    }

    /// LSN covered by the last completed sync.
    #[must_use]
    pub fn durable_lsn(&self) -> Lsn {
        let inner = self.inner.lock();
        inner
            .sync_worker
            .as_ref()
            .map_or(inner.last_synced, SyncWorker::durable_lsn)
    }

    /// LSN of the last checkpoint record.
    #[must_use]
    pub fn last_checkpoint_lsn(&self) -> Lsn {
        self.inner.lock().last_checkpoint
    }

    /// Number of the file being written.
    #[must_use]
    pub fn current_file_number(&self) -> u32 {
        self.inner.lock().file_number
    }

    /// Bytes written to the current file.
    #[must_use]
    pub fn in_file_position(&self) -> u64 {
        self.inner.lock().position
    }

    /// Bytes appended but not yet flushed.
    #[must_use]
    pub fn buffered_bytes(&self) -> usize {
        self.inner.lock().buffered()
    }

    /// Highest journal file that existed when the journal was opened.
    /// Recovery reads up to and including this file.
    #[must_use]
    pub fn recovery_start_file(&self) -> Option<u32> {
        self.recovery_start_file
    }

    /// Returns true after shutdown.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().buffer.is_none()
    }

    /// The journal directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    /// The configuration the journal was opened with.
    #[must_use]
    pub fn config(&self) -> &JournalConfig {
        &self.config
    }
}

impl Drop for JournalManager {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.buffer.is_none() {
            return;
        }
        if !inner.recovery_mode {
            if let (Some(file), Some(buffer)) = (inner.file.as_ref(), inner.buffer.as_mut()) {
                let snapshot = buffer.snapshot_and_clear();
                if let Err(e) = file.write_all_at(inner.position, &snapshot) {
                    error!(error = %e, "failed to flush journal on drop");
                }
            }
        }
        close(inner);
    }
}

/// Stops the sync worker, releases the lock and drops the buffer and file.
fn close(inner: &mut JournalInner) {
    if let Some(mut worker) = inner.sync_worker.take() {
        worker.stop();
    }
    if let Some(mut lock) = inner.lock.take() {
        lock.release();
    }
    inner.buffer = None;
    inner.file = None;
}

fn exhausted(number: u32) -> JournalError {
    JournalError::rotation_failed(
        number,
        io::Error::new(io::ErrorKind::Other, "journal file numbers exhausted"),
    )
}
