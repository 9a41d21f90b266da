//! Retired file remover.

use crate::error::JournalResult;
use crate::wal::naming::sync_directory;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use tidelog_storage::StorageBackend;
use tracing::{debug, info, warn};

/// A file to delete.
#[derive(Debug)]
pub enum RemoveTask {
    /// A journal file superseded by rotation. The handle is closed before
    /// the file is deleted.
    Retire {
        /// Handle the journal wrote through.
        file: Arc<dyn StorageBackend>,
        /// Path of the file.
        path: PathBuf,
    },
    /// A stale file with no open handle, such as a rotation backup.
    Path(PathBuf),
}

/// Background worker deleting retired journal files.
///
/// The worker is fire-and-forget: nothing waits for a removal, and the
/// thread exits once the worker is dropped and its queue is empty.
#[derive(Debug)]
pub struct RemoverWorker {
    sender: Sender<RemoveTask>,
    removed: Arc<AtomicU64>,
}

impl RemoverWorker {
    /// Starts the worker thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn() -> JournalResult<Self> {
        let (sender, receiver) = mpsc::channel();
        let removed = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&removed);
        thread::Builder::new()
            .name("tidelog-remover".into())
            .spawn(move || run(&receiver, &counter))?;
        Ok(Self { sender, removed })
    }

    /// Queues a removal. Returns false if the worker thread is gone.
    pub fn submit(&self, task: RemoveTask) -> bool {
        self.sender.send(task).is_ok()
    }

    /// Number of files deleted so far.
    #[must_use]
    pub fn removed_files(&self) -> u64 {
        self.removed.load(Ordering::Acquire)
    }
}

fn run(receiver: &Receiver<RemoveTask>, removed: &AtomicU64) {
    for task in receiver {
        let path = match task {
            RemoveTask::Retire { file, path } => {
                drop(file);
                path
            }
            RemoveTask::Path(path) => path,
        };
        match remove(&path) {
            Ok(()) => {
                removed.fetch_add(1, Ordering::AcqRel);
                info!(path = %path.display(), "removed journal file");
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "journal file already removed");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to remove journal file");
            }
        }
    }
}

fn remove(path: &Path) -> io::Result<()> {
    std::fs::remove_file(path)?;
    if let Some(dir) = path.parent() {
        sync_directory(dir)?;
    }
    Ok(())
}
