//! Truncate-tail command implementation.

use super::select_file;
use crate::error::{CliError, CliResult};
use std::path::Path;
use tidelog_core::{DirLock, JournalConfig, JournalError, JournalReader, LockInfo};

/// Runs the truncate-tail command.
///
/// Refuses to touch a directory whose lock holder is still heartbeating.
pub fn run(path: &Path, file: Option<u32>, dry_run: bool) -> CliResult<()> {
    if let Some(holder) = DirLock::peek(path).filter(live_holder) {
        return Err(JournalError::LockHeld {
            pid: Some(holder.pid),
            last_heartbeat_ms: Some(holder.heartbeat_ms),
        }
        .into());
    }

    let number = select_file(path, file)?;
    let removed = truncate(path, number, dry_run)?;
    match (removed, dry_run) {
        (0, _) => println!("File {number:#x} ends on a complete record; nothing to do."),
        (n, true) => println!("File {number:#x}: would remove {n} torn byte(s)."),
        (n, false) => println!("File {number:#x}: removed {n} torn byte(s)."),
    }
    Ok(())
}

/// Removes the torn tail of file `number`, or only measures it for a dry
/// run. Returns the number of torn bytes.
pub fn truncate(path: &Path, number: u32, dry_run: bool) -> CliResult<u64> {
    if dry_run {
        let reader = JournalReader::open(path, number)?;
        return Ok(reader.size()? - reader.valid_end()?);
    }
    let reader = JournalReader::open_for_repair(path, number).map_err(|e| match e {
        JournalError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
            CliError::FileNotFound(number)
        }
        other => other.into(),
    })?;
    Ok(reader.truncate_torn_tail()?)
}

fn live_holder(info: &LockInfo) -> bool {
    // Without the holder's configuration, assume the default heartbeat.
    info.is_fresh(JournalConfig::default().lock_liveness_window())
}
