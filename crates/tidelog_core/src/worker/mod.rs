//! Background workers that keep slow file operations off the append path.
//!
//! Both workers are plain threads fed immutable task descriptors over
//! `std::sync::mpsc` channels. Neither touches the journal's counters.
//!
//! - [`SyncWorker`]: fsyncs journal files on request, coalescing bursts
//! - [`RemoverWorker`]: closes and deletes retired journal files

mod remover;
mod sync;

pub use remover::{RemoveTask, RemoverWorker};
pub use sync::{SyncTask, SyncWorker};
