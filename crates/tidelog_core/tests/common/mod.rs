//! Shared fixtures for journal integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tidelog_core::{EntryType, JournalConfig, LogRecord, TransactionId};
use tidelog_storage::{
    BackendOpener, FileBackend, InMemoryBackend, StorageBackend, StorageError, StorageResult,
};

fn simulated(message: &str) -> StorageError {
    StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, message.to_string()))
}

/// A backend wrapper that can shorten writes, fail them, and counts calls.
#[derive(Debug)]
pub struct FaultyBackend {
    inner: Arc<dyn StorageBackend>,
    max_write: AtomicUsize,
    fail_after: AtomicUsize,
    writes: AtomicUsize,
    syncs: AtomicUsize,
}

impl FaultyBackend {
    /// Wraps `inner` with no faults armed.
    pub fn new(inner: Arc<dyn StorageBackend>) -> Self {
        Self {
            inner,
            max_write: AtomicUsize::new(usize::MAX),
            fail_after: AtomicUsize::new(usize::MAX),
            writes: AtomicUsize::new(0),
            syncs: AtomicUsize::new(0),
        }
    }

    /// Caps every `write_at` call at `bytes`, producing partial writes.
    pub fn limit_writes(&self, bytes: usize) {
        self.max_write.store(bytes, Ordering::SeqCst);
    }

    /// Makes the next write store at most `bytes` bytes and then fail, and
    /// every later write fail until [`FaultyBackend::heal`].
    pub fn fail_after(&self, bytes: usize) {
        self.fail_after.store(bytes, Ordering::SeqCst);
    }

    /// Disarms all faults.
    pub fn heal(&self) {
        self.max_write.store(usize::MAX, Ordering::SeqCst);
        self.fail_after.store(usize::MAX, Ordering::SeqCst);
    }

    /// Number of `write_at` calls seen.
    pub fn write_calls(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of successful syncs.
    pub fn sync_calls(&self) -> usize {
        self.syncs.load(Ordering::SeqCst)
    }

    /// Full contents of the underlying store.
    pub fn contents(&self) -> Vec<u8> {
        let size = self.inner.size().unwrap();
        self.inner.read_at(0, size as usize).unwrap()
    }
}

impl StorageBackend for FaultyBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn write_at(&self, offset: u64, data: &[u8]) -> StorageResult<usize> {
        self.writes.fetch_add(1, Ordering::SeqCst);

        let budget = self.fail_after.load(Ordering::SeqCst);
        if budget != usize::MAX {
            self.fail_after.store(0, Ordering::SeqCst);
            let partial = budget.min(data.len());
            if partial > 0 {
                self.inner.write_all_at(offset, &data[..partial])?;
            }
            return Err(simulated("simulated crash during write"));
        }

        let len = data.len().min(self.max_write.load(Ordering::SeqCst));
        self.inner.write_at(offset, &data[..len])
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn sync(&self) -> StorageResult<()> {
        self.inner.sync()?;
        self.syncs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn truncate(&self, new_size: u64) -> StorageResult<()> {
        self.inner.truncate(new_size)
    }
}

/// Opens [`FaultyBackend`]s and keeps a handle to each one.
#[derive(Debug)]
pub struct RecordingOpener {
    on_disk: bool,
    fail_opens: AtomicBool,
    opened: Mutex<Vec<(PathBuf, Arc<FaultyBackend>)>>,
}

impl RecordingOpener {
    /// Backends live in memory; nothing is written to the journal directory.
    pub fn in_memory() -> Arc<Self> {
        Arc::new(Self {
            on_disk: false,
            fail_opens: AtomicBool::new(false),
            opened: Mutex::new(Vec::new()),
        })
    }

    /// Backends are real files in the journal directory.
    pub fn on_disk() -> Arc<Self> {
        Arc::new(Self {
            on_disk: true,
            fail_opens: AtomicBool::new(false),
            opened: Mutex::new(Vec::new()),
        })
    }

    /// Makes later opens fail.
    pub fn set_fail_opens(&self, fail: bool) {
        self.fail_opens.store(fail, Ordering::SeqCst);
    }

    /// Number of backends opened so far.
    pub fn opened_count(&self) -> usize {
        self.opened.lock().len()
    }

    /// The backend opened for `path`.
    pub fn backend_for(&self, path: &Path) -> Arc<FaultyBackend> {
        self.opened
            .lock()
            .iter()
            .rev()
            .find(|(p, _)| p == path)
            .map(|(_, b)| Arc::clone(b))
            .unwrap_or_else(|| panic!("{} was never opened", path.display()))
    }

    /// The most recently opened backend.
    pub fn latest(&self) -> Arc<FaultyBackend> {
        Arc::clone(&self.opened.lock().last().expect("nothing opened").1)
    }
}

impl BackendOpener for RecordingOpener {
    fn open(&self, path: &Path) -> StorageResult<Arc<dyn StorageBackend>> {
        if self.fail_opens.load(Ordering::SeqCst) {
            return Err(simulated("simulated open failure"));
        }
        let inner: Arc<dyn StorageBackend> = if self.on_disk {
            Arc::new(FileBackend::open(path)?)
        } else {
            Arc::new(InMemoryBackend::new())
        };
        let backend = Arc::new(FaultyBackend::new(inner));
        self.opened
            .lock()
            .push((path.to_path_buf(), Arc::clone(&backend)));
        Ok(backend)
    }
}

/// A record with tag 0x10.
pub fn record(txn: u64, payload: &[u8]) -> LogRecord {
    LogRecord::new(EntryType::new(0x10), TransactionId::new(txn), payload.to_vec())
}

/// A configuration with a small buffer and a short heartbeat.
pub fn small_config(dir: &Path) -> JournalConfig {
    JournalConfig::new(dir)
        .buffer_capacity(4096)
        .lock_heartbeat_interval(Duration::from_millis(50))
}

/// Polls `condition` until it holds, failing the test after five seconds.
pub fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(2));
    }
}
