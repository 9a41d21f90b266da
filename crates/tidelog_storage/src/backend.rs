//! Storage backend trait definitions.

use crate::error::{StorageError, StorageResult};
use std::path::Path;
use std::sync::Arc;

/// A low-level byte store holding one journal file.
///
/// Backends are **opaque byte stores**. The journal decides what goes where;
/// a backend only reads, writes, syncs and truncates bytes.
///
/// # Invariants
///
/// - `write_at` returns how many bytes of `data` were written, which may be
///   fewer than requested
/// - `read_at` returns exactly the bytes previously written at that offset
/// - `sync` makes every byte written so far survive power loss
/// - Backends must be `Send + Sync`; a handle is shared between the journal
///   and its sync worker
///
/// # Implementors
///
/// - [`super::FileBackend`] - For persistent storage
/// - [`super::InMemoryBackend`] - For testing
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The read would extend beyond the current size
    /// - An I/O error occurs
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Writes a prefix of `data` at `offset`.
    ///
    /// Returns the number of bytes written. Writing at an offset beyond the
    /// current size extends the store.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn write_at(&self, offset: u64, data: &[u8]) -> StorageResult<usize>;

    /// Returns the current size of the storage in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Syncs all written data and metadata to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&self) -> StorageResult<()>;

    /// Truncates the storage to the given size.
    ///
    /// Used by recovery to cut a torn tail off a journal file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The truncation fails
    /// - `new_size` is greater than current size
    fn truncate(&self, new_size: u64) -> StorageResult<()>;

    /// Writes all of `data` at `offset`, retrying partial writes.
    ///
    /// # Errors
    ///
    /// Returns the first error from `write_at`, or
    /// [`StorageError::WriteZero`] if a write makes no progress.
    fn write_all_at(&self, offset: u64, data: &[u8]) -> StorageResult<()> {
        let mut written = 0usize;
        while written < data.len() {
            let at = offset + written as u64;
            let n = self.write_at(at, &data[written..])?;
            if n == 0 {
                return Err(StorageError::WriteZero {
                    offset: at,
                    remaining: data.len() - written,
                });
            }
            written += n;
        }
        Ok(())
    }
}

/// Opens storage backends by path.
///
/// The journal opens every file through an opener so tests can substitute
/// instrumented or fault-injecting backends.
pub trait BackendOpener: Send + Sync {
    /// Opens or creates the backend for `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be opened or created.
    fn open(&self, path: &Path) -> StorageResult<Arc<dyn StorageBackend>>;
}
