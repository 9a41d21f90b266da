//! CLI command implementations.

pub mod dump;
pub mod inspect;
pub mod truncate_tail;
pub mod verify;

use crate::error::{CliError, CliResult};
use std::path::Path;
use tidelog_core::list_journal_files;

/// Picks the journal file a command works on: `requested` if given and
/// present, otherwise the newest file in `dir`.
pub(crate) fn select_file(dir: &Path, requested: Option<u32>) -> CliResult<u32> {
    let files = list_journal_files(dir)?;
    match requested {
        Some(n) if files.contains(&n) => Ok(n),
        Some(n) => Err(CliError::FileNotFound(n)),
        None => files
            .last()
            .copied()
            .ok_or_else(|| CliError::NoJournal(dir.to_path_buf())),
    }
}

/// Formats a byte count for humans.
pub(crate) fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tidelog_core::file_name_for;

    #[test]
    fn select_newest_by_default() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            select_file(dir.path(), None),
            Err(CliError::NoJournal(_))
        ));

        for n in [1u32, 0x1f] {
            std::fs::write(dir.path().join(file_name_for(n)), b"").unwrap();
        }
        assert_eq!(select_file(dir.path(), None).unwrap(), 0x1f);
        assert_eq!(select_file(dir.path(), Some(1)).unwrap(), 1);
        assert!(matches!(
            select_file(dir.path(), Some(2)),
            Err(CliError::FileNotFound(2))
        ));
    }

    #[test]
    fn sizes() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
