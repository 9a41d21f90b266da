//! Exclusive access lock for a journal directory.
//!
//! The lock file `journal.lck` is held with an OS advisory lock for as long
//! as a journal is open. It also records the holder's process id and a
//! heartbeat timestamp that a background thread refreshes, so tools can
//! tell who holds a directory and whether that holder is still alive:
//!
//! ```text
//! <pid, 10 digits> <heartbeat unix millis, 20 digits>\n
//! ```
//!
//! The lock is released when the [`DirLock`] is dropped.

use crate::error::{JournalError, JournalResult};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Name of the lock file inside a journal directory.
pub const LOCK_FILE: &str = "journal.lck";

/// Contents of a lock file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockInfo {
    /// Process id of the holder.
    pub pid: u32,
    /// Last heartbeat in unix milliseconds.
    pub heartbeat_ms: u64,
}

impl LockInfo {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            heartbeat_ms: now_millis(),
        }
    }

    fn encode(&self) -> String {
        format!("{:010} {:020}\n", self.pid, self.heartbeat_ms)
    }

    fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split_whitespace();
        let pid = parts.next()?.parse().ok()?;
        let heartbeat_ms = parts.next()?.parse().ok()?;
        Some(Self { pid, heartbeat_ms })
    }

    /// Returns true if the heartbeat is younger than `window`.
    #[must_use]
    pub fn is_fresh(&self, window: Duration) -> bool {
        now_millis().saturating_sub(self.heartbeat_ms) < window.as_millis() as u64
    }
}

/// Current wall-clock time in unix milliseconds.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn write_info(file: &File, info: LockInfo) -> std::io::Result<()> {
    let mut file = file;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(info.encode().as_bytes())?;
    file.flush()
}

fn read_info(file: &mut File) -> Option<LockInfo> {
    let mut text = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut text).ok()?;
    LockInfo::parse(&text)
}

struct Heartbeat {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

/// A held journal directory lock.
pub struct DirLock {
    path: PathBuf,
    file: Option<Arc<File>>,
    heartbeat: Option<Heartbeat>,
}

impl std::fmt::Debug for DirLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirLock")
            .field("path", &self.path)
            .field("held", &self.is_held())
            .finish()
    }
}

/// Age past which a heartbeat no longer proves its holder alive.
#[must_use]
pub fn liveness_window(heartbeat_interval: Duration) -> Duration {
    heartbeat_interval.saturating_mul(2)
}

impl DirLock {
    /// Acquires the lock for `dir`, refreshing its heartbeat every
    /// `heartbeat_interval`.
    ///
    /// A holder is considered live if it has the OS lock, or if the file
    /// names another process whose heartbeat is younger than twice the
    /// interval.
    ///
    /// # Errors
    ///
    /// - [`JournalError::LockHeld`] if another live process holds the lock
    /// - I/O errors from creating or writing the lock file
    pub fn acquire(dir: &Path, heartbeat_interval: Duration) -> JournalResult<Self> {
        let path = dir.join(LOCK_FILE);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if file.try_lock_exclusive().is_err() {
            let info = read_info(&mut file);
            return Err(JournalError::LockHeld {
                pid: info.map(|i| i.pid),
                last_heartbeat_ms: info.map(|i| i.heartbeat_ms),
            });
        }

        if let Some(info) = read_info(&mut file) {
            let live = info.is_fresh(liveness_window(heartbeat_interval));
            if info.pid != std::process::id() && live {
                let _ = FileExt::unlock(&file);
                return Err(JournalError::LockHeld {
                    pid: Some(info.pid),
                    last_heartbeat_ms: Some(info.heartbeat_ms),
                });
            }
            debug!(pid = info.pid, "taking over stale journal lock");
        }

        file.set_len(0)?;
        write_info(&file, LockInfo::current())?;
        file.sync_all()?;

        let file = Arc::new(file);
        let heartbeat = spawn_heartbeat(Arc::clone(&file), heartbeat_interval)?;
        info!(path = %path.display(), "acquired journal lock");

        Ok(Self {
            path,
            file: Some(file),
            heartbeat: Some(heartbeat),
        })
    }

    /// Reads the lock file of `dir` without acquiring it.
    ///
    /// Returns `None` if there is no lock file or it holds no valid record.
    #[must_use]
    pub fn peek(dir: &Path) -> Option<LockInfo> {
        let mut file = File::open(dir.join(LOCK_FILE)).ok()?;
        read_info(&mut file)
    }

    /// Returns true until the lock is released.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stops the heartbeat, clears the lock file and releases the lock.
    ///
    /// Calling this more than once has no further effect.
    pub fn release(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            let _ = heartbeat.stop.send(());
            if heartbeat.handle.join().is_err() {
                warn!("journal lock heartbeat thread panicked");
            }
        }
        if let Some(file) = self.file.take() {
            if let Err(e) = file.set_len(0) {
                warn!(error = %e, "failed to clear journal lock file");
            }
            if let Err(e) = FileExt::unlock(file.as_ref()) {
                warn!(error = %e, "failed to unlock journal lock file");
            }
            info!(path = %self.path.display(), "released journal lock");
        }
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        self.release();
    }
}

fn spawn_heartbeat(file: Arc<File>, interval: Duration) -> JournalResult<Heartbeat> {
    let (stop, stopped) = mpsc::channel::<()>();
    let handle = thread::Builder::new()
        .name("tidelog-lock-heartbeat".into())
        .spawn(move || loop {
            match stopped.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if let Err(e) = write_info(&file, LockInfo::current()) {
                        warn!(error = %e, "failed to refresh journal lock heartbeat");
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        })?;
    Ok(Heartbeat { stop, handle })
}
