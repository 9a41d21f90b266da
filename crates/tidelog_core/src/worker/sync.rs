//! File sync worker.

use crate::error::JournalResult;
use crate::lsn::Lsn;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tidelog_storage::StorageBackend;
use tracing::{debug, error, warn};

/// A request to make a journal file durable up to `lsn`.
///
/// The task owns a handle to the file, so the file stays open until the
/// sync has run even if the journal has rotated away from it.
#[derive(Debug, Clone)]
pub struct SyncTask {
    /// File to sync.
    pub file: Arc<dyn StorageBackend>,
    /// Number of the file, for diagnostics.
    pub file_number: u32,
    /// Last LSN written to the file before the request.
    pub lsn: Lsn,
}

enum SyncCommand {
    Sync(SyncTask),
    Stop,
}

/// Background worker performing fsyncs.
///
/// Requests that arrive while the worker is busy are coalesced: each file
/// is synced once per batch, covering the highest LSN requested for it.
/// On stop, the worker finishes every request already queued and exits.
#[derive(Debug)]
pub struct SyncWorker {
    sender: Sender<SyncCommand>,
    handle: Option<JoinHandle<()>>,
    completed: Arc<AtomicU64>,
    durable: Arc<AtomicU64>,
}

impl SyncWorker {
    /// Starts the worker thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn() -> JournalResult<Self> {
        let (sender, receiver) = mpsc::channel();
        let completed = Arc::new(AtomicU64::new(0));
        let durable = Arc::new(AtomicU64::new(Lsn::INVALID.as_u64()));
        let handle = {
            let completed = Arc::clone(&completed);
            let durable = Arc::clone(&durable);
            thread::Builder::new()
                .name("tidelog-sync".into())
                .spawn(move || run(&receiver, &completed, &durable))?
        };
        Ok(Self {
            sender,
            handle: Some(handle),
            completed,
            durable,
        })
    }

    /// Queues a sync. Returns false if the worker has stopped.
    pub fn request(&self, task: SyncTask) -> bool {
        self.handle.is_some() && self.sender.send(SyncCommand::Sync(task)).is_ok()
    }

    /// Number of fsyncs that completed successfully.
    #[must_use]
    pub fn completed_syncs(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    /// Highest LSN a completed fsync covers.
    #[must_use]
    pub fn durable_lsn(&self) -> Lsn {
        Lsn::from_raw(self.durable.load(Ordering::Acquire))
    }

    /// Returns true until [`SyncWorker::stop`] has run.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stops the worker after it drains queued requests, and waits for it.
    ///
    /// Calling this more than once has no further effect.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.sender.send(SyncCommand::Stop);
        if handle.join().is_err() {
            error!("sync worker panicked");
        }
    }
}

impl Drop for SyncWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(receiver: &Receiver<SyncCommand>, completed: &AtomicU64, durable: &AtomicU64) {
    while let Ok(first) = receiver.recv() {
        let mut batch: Vec<SyncTask> = Vec::new();
        let mut stop = false;

        for command in std::iter::once(first).chain(receiver.try_iter()) {
            match command {
                SyncCommand::Sync(task) => coalesce(&mut batch, task),
                SyncCommand::Stop => stop = true,
            }
        }

        for task in batch {
            match task.file.sync() {
                Ok(()) => {
                    completed.fetch_add(1, Ordering::AcqRel);
                    durable.fetch_max(task.lsn.as_u64(), Ordering::AcqRel);
                    debug!(file = task.file_number, lsn = %task.lsn, "synced journal file");
                }
                Err(e) => {
                    error!(file = task.file_number, lsn = %task.lsn, error = %e, "journal sync failed");
                }
            }
        }

        if stop {
            return;
        }
    }
    warn!("sync worker channel closed without stop");
}

fn coalesce(batch: &mut Vec<SyncTask>, task: SyncTask) {
    let key = Arc::as_ptr(&task.file).cast::<()>();
    match batch
        .iter_mut()
        .find(|queued| Arc::as_ptr(&queued.file).cast::<()>() == key)
    {
        Some(queued) => queued.lsn = queued.lsn.max(task.lsn),
        None => batch.push(task),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};
    use tidelog_storage::{InMemoryBackend, StorageResult};

    #[derive(Debug, Default)]
    struct CountingBackend {
        inner: InMemoryBackend,
        syncs: AtomicUsize,
    }

    impl StorageBackend for CountingBackend {
        fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
            self.inner.read_at(offset, len)
        }
        fn write_at(&self, offset: u64, data: &[u8]) -> StorageResult<usize> {
            self.inner.write_at(offset, data)
        }
        fn size(&self) -> StorageResult<u64> {
            self.inner.size()
        }
        fn sync(&self) -> StorageResult<()> {
            thread::sleep(Duration::from_millis(5));
            self.syncs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn truncate(&self, new_size: u64) -> StorageResult<()> {
            self.inner.truncate(new_size)
        }
    }

    fn task(file: &Arc<CountingBackend>, offset: u64) -> SyncTask {
        SyncTask {
            file: Arc::clone(file) as Arc<dyn StorageBackend>,
            file_number: 1,
            lsn: Lsn::pack(1, offset).unwrap(),
        }
    }

    #[test]
    fn stop_drains_queue() {
        let file = Arc::new(CountingBackend::default());
        let mut worker = SyncWorker::spawn().unwrap();
        for i in 1..=50 {
            assert!(worker.request(task(&file, i)));
        }
        worker.stop();

        let syncs = file.syncs.load(Ordering::SeqCst);
        assert!(syncs >= 1);
        assert!(syncs < 50, "bursts should coalesce, got {syncs} syncs");
        assert_eq!(worker.durable_lsn(), Lsn::pack(1, 50).unwrap());
        assert!(!worker.request(task(&file, 51)));
    }

    #[test]
    fn syncs_each_file_in_batch() {
        let a = Arc::new(CountingBackend::default());
        let b = Arc::new(CountingBackend::default());
        let mut worker = SyncWorker::spawn().unwrap();
        worker.request(task(&a, 1));
        worker.request(task(&b, 2));
        worker.stop();

        assert_eq!(a.syncs.load(Ordering::SeqCst), 1);
        assert_eq!(b.syncs.load(Ordering::SeqCst), 1);
        assert_eq!(worker.completed_syncs(), 2);
    }

    #[test]
    fn runs_in_background() {
        let file = Arc::new(CountingBackend::default());
        let worker = SyncWorker::spawn().unwrap();
        worker.request(task(&file, 9));

        let deadline = Instant::now() + Duration::from_secs(5);
        while worker.completed_syncs() == 0 {
            assert!(Instant::now() < deadline, "sync never ran");
            thread::sleep(Duration::from_millis(1));
        }
        assert!(worker.is_running());
    }
}
