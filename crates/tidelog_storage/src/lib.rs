//! # tidelog Storage
//!
//! Byte-store backends underneath the tidelog journal.
//!
//! Backends are **opaque byte stores**: they know nothing about journal
//! records, LSNs or file numbering. The journal owns all format
//! interpretation and decides which offsets to write.
//!
//! ## Design Principles
//!
//! - Positional writes (`write_at`) so a retried flush overwrites the same
//!   region instead of appending a second copy
//! - A single `write_at` call may be partial; callers loop
//! - All methods take `&self` so a handle can be shared with a background
//!   sync worker through an `Arc`
//! - Backends are opened through a [`BackendOpener`], which lets tests inject
//!   faulty or instrumented backends
//!
//! ## Available Backends
//!
//! - [`FileBackend`] - OS files, opened by [`FileOpener`]
//! - [`InMemoryBackend`] - tests and scanning fixtures
//!
//! ## Example
//!
//! ```rust
//! use tidelog_storage::{StorageBackend, InMemoryBackend};
//!
//! let backend = InMemoryBackend::new();
//! backend.write_all_at(0, b"hello world").unwrap();
//! let data = backend.read_at(6, 5).unwrap();
//! assert_eq!(&data, b"world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::{BackendOpener, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use file::{FileBackend, FileOpener};
pub use memory::InMemoryBackend;
